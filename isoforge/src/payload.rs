//! Auxiliary payload files (first-boot workload manifests and the like).
//!
//! Payload bytes are opaque. Each file is recorded with its SHA-256 at
//! collection time so the composer can prove that what gets embedded is
//! exactly what was collected.

use isoforge_shared::{ForgeError, ForgeResult};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One payload file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadFile {
    /// Path relative to the payload directory, `/`-separated.
    pub name: String,
    /// Absolute location on the build host.
    pub source: PathBuf,
    /// Destination path on the installed host.
    pub target: String,
    pub size: u64,
    /// Hex-encoded SHA-256 of the contents.
    pub sha256: String,
}

/// Ordered set of payload files rooted at one directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadSet {
    root: Option<PathBuf>,
    files: Vec<PayloadFile>,
}

impl PayloadSet {
    /// A run without payload.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Collect every regular file below `dir`, sorted by relative path.
    ///
    /// Symlinks are not followed.
    pub fn collect(dir: &Path, target_root: &str) -> ForgeResult<Self> {
        if !dir.is_dir() {
            return Err(ForgeError::InvalidInput(format!(
                "payload directory does not exist: {}",
                dir.display()
            )));
        }
        let root = dir
            .canonicalize()
            .map_err(|e| ForgeError::io(format!("resolving {}", dir.display()), e))?;
        let target_root = target_root.trim_end_matches('/');

        let mut files = Vec::new();
        for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                ForgeError::io(
                    format!("walking payload directory {}", root.display()),
                    e.into(),
                )
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
            let name = relative_name(relative)?;
            let (size, sha256) = digest_file(entry.path())?;

            files.push(PayloadFile {
                target: format!("{}/{}", target_root, name),
                name,
                source: entry.path().to_path_buf(),
                size,
                sha256,
            });
        }

        tracing::info!(
            dir = %root.display(),
            files = files.len(),
            "Collected payload files"
        );

        Ok(Self {
            root: Some(root),
            files,
        })
    }

    /// Payload directory, if any. Template `local:` references resolve here.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn files(&self) -> &[PayloadFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Re-hash every file and fail if any changed since collection.
    pub fn verify(&self) -> ForgeResult<()> {
        for file in &self.files {
            let (_, sha256) = digest_file(&file.source).map_err(|e| {
                ForgeError::Composition(format!("payload '{}' is no longer readable: {}", file.name, e))
            })?;
            if sha256 != file.sha256 {
                return Err(ForgeError::Composition(format!(
                    "payload '{}' changed after it was collected (expected sha256 {}, found {})",
                    file.name, file.sha256, sha256
                )));
            }
        }
        Ok(())
    }
}

fn relative_name(relative: &Path) -> ForgeResult<String> {
    let parts = relative
        .components()
        .map(|c| {
            c.as_os_str().to_str().ok_or_else(|| {
                ForgeError::InvalidInput(format!(
                    "payload file name is not valid UTF-8: {}",
                    relative.display()
                ))
            })
        })
        .collect::<ForgeResult<Vec<_>>>()?;
    Ok(parts.join("/"))
}

fn digest_file(path: &Path) -> ForgeResult<(u64, String)> {
    let mut file =
        File::open(path).map_err(|e| ForgeError::io(format!("opening {}", path.display()), e))?;
    let mut hasher = Sha256::new();
    let size = std::io::copy(&mut file, &mut hasher)
        .map_err(|e| ForgeError::io(format!("reading {}", path.display()), e))?;
    Ok((size, hex::encode(hasher.finalize())))
}
