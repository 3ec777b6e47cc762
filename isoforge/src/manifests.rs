//! Workload manifest bundling.
//!
//! Produces a single multi-document YAML file from a pinned version of a git
//! repository, suitable for dropping into the payload directory.

use crate::tools::ToolCommand;
use crate::util::find_binary;
use isoforge_shared::constants::manifests::{
    DEFAULT_PATHS, DEFAULT_REPO, DEFAULT_VERSION, DOCUMENT_SEPARATOR,
};
use isoforge_shared::{ForgeError, ForgeResult};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// What to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSource {
    pub repo: String,
    /// Tag, branch or commit to check out.
    pub version: String,
    /// Directories inside the checkout to collect from, in order.
    pub paths: Vec<String>,
}

impl Default for ManifestSource {
    fn default() -> Self {
        Self {
            repo: DEFAULT_REPO.to_string(),
            version: DEFAULT_VERSION.to_string(),
            paths: DEFAULT_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Combined manifests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestBundle {
    pub documents: usize,
    pub text: String,
}

/// Clone `source.repo` into a temporary directory, check out the version and
/// combine the manifests. The clone is removed afterwards.
pub async fn fetch(git: &Path, source: &ManifestSource) -> ForgeResult<ManifestBundle> {
    for path in &source.paths {
        check_subpath(path)?;
    }
    let git = find_binary(git)?;

    let checkout = tempfile::Builder::new()
        .prefix("isoforge-manifests-")
        .tempdir()
        .map_err(|e| ForgeError::io("creating checkout directory", e))?;

    tracing::info!(repo = %source.repo, "Cloning manifest repository");
    run_git(
        ToolCommand::new(&git)
            .arg("clone")
            .arg("--quiet")
            .arg("--")
            .arg(&source.repo)
            .arg(checkout.path()),
        "clone",
    )
    .await?;

    tracing::info!(version = %source.version, "Checking out manifest version");
    run_git(
        ToolCommand::new(&git)
            .arg("checkout")
            .arg("--quiet")
            .arg(&source.version)
            .current_dir(checkout.path()),
        "checkout",
    )
    .await?;

    combine(checkout.path(), &source.paths)
}

async fn run_git(command: ToolCommand, action: &str) -> ForgeResult<()> {
    let output = command
        .run()
        .await
        .map_err(|e| ForgeError::Manifests(format!("git {} could not run: {}", action, e)))?;
    if !output.success() {
        return Err(ForgeError::Manifests(format!(
            "git {} failed ({}):\n{}",
            action,
            output.describe_status(),
            output.diagnostic()
        )));
    }
    Ok(())
}

/// Collect `.yaml`/`.yml` files below each of `paths` (relative to `root`),
/// sorted by path, and join their stripped contents as YAML documents.
///
/// Missing subpaths are skipped with a warning; empty files are dropped.
pub fn combine(root: &Path, paths: &[String]) -> ForgeResult<ManifestBundle> {
    let mut documents = Vec::new();

    for subpath in paths {
        check_subpath(subpath)?;
        let dir = root.join(subpath);
        if !dir.exists() {
            tracing::warn!(path = %subpath, "Manifest path not present in checkout, skipping");
            continue;
        }

        tracing::info!(path = %subpath, "Processing manifests");
        for entry in WalkDir::new(&dir).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                ForgeError::Manifests(format!("cannot walk {}: {}", dir.display(), e))
            })?;
            if !entry.file_type().is_file() || !is_yaml(entry.path()) {
                continue;
            }

            let content = std::fs::read_to_string(entry.path()).map_err(|e| {
                ForgeError::Manifests(format!("cannot read {}: {}", entry.path().display(), e))
            })?;
            let content = content.trim();
            if !content.is_empty() {
                documents.push(content.to_string());
            }
        }
    }

    tracing::info!(documents = documents.len(), "Combined manifests");
    Ok(ManifestBundle {
        documents: documents.len(),
        text: documents.join(DOCUMENT_SEPARATOR),
    })
}

/// Write the bundle to `output`, replacing any previous file atomically.
pub fn write_bundle(bundle: &ManifestBundle, output: &Path) -> ForgeResult<PathBuf> {
    let parent = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut staged = tempfile::Builder::new()
        .prefix(".isoforge-manifests-")
        .tempfile_in(&parent)
        .map_err(|e| ForgeError::io(format!("staging output in {}", parent.display()), e))?;
    staged
        .write_all(bundle.text.as_bytes())
        .map_err(|e| ForgeError::io("writing manifest bundle", e))?;
    staged
        .persist(output)
        .map_err(|e| ForgeError::io(format!("writing {}", output.display()), e.error))?;

    Ok(output.to_path_buf())
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn check_subpath(path: &str) -> ForgeResult<()> {
    let escapes = Path::new(path)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if path.is_empty() || escapes {
        return Err(ForgeError::InvalidInput(format!(
            "manifest path must be relative to the repository root: '{}'",
            path
        )));
    }
    Ok(())
}
