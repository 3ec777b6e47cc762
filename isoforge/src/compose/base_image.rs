//! Base installer image selection.
//!
//! An explicitly configured image is used as-is. Otherwise images are cached
//! per stream and architecture and downloaded on first use.

use crate::tools::{DownloadRequest, ImageTool};
use isoforge_shared::{ForgeError, ForgeResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// CPU architecture of the installer image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    X86_64,
    Aarch64,
    S390x,
    Ppc64le,
}

impl Architecture {
    /// Architecture of the build host.
    pub fn host() -> ForgeResult<Self> {
        match std::env::consts::ARCH {
            "x86_64" => Ok(Architecture::X86_64),
            "aarch64" => Ok(Architecture::Aarch64),
            "s390x" => Ok(Architecture::S390x),
            "powerpc64" if cfg!(target_endian = "little") => Ok(Architecture::Ppc64le),
            other => Err(ForgeError::Config(format!(
                "no installer images exist for host architecture '{}'; pass an architecture explicitly",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::X86_64 => "x86_64",
            Architecture::Aarch64 => "aarch64",
            Architecture::S390x => "s390x",
            Architecture::Ppc64le => "ppc64le",
        }
    }
}

impl FromStr for Architecture {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x86_64" | "amd64" => Ok(Architecture::X86_64),
            "aarch64" | "arm64" => Ok(Architecture::Aarch64),
            "s390x" => Ok(Architecture::S390x),
            "ppc64le" => Ok(Architecture::Ppc64le),
            other => Err(ForgeError::Config(format!(
                "unsupported architecture '{}' (expected x86_64, aarch64, s390x or ppc64le)",
                other
            ))),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the base installer image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseImageSource {
    /// Use this file; it must already exist.
    Path(PathBuf),
    /// Use (or fill) the cache.
    Cached {
        cache_dir: PathBuf,
        stream: String,
        architecture: Architecture,
    },
}

impl BaseImageSource {
    /// Reject stream names that are empty or could leave the cache directory.
    pub fn check_stream(stream: &str) -> ForgeResult<()> {
        if stream.trim().is_empty() {
            return Err(ForgeError::Config("image stream must not be empty".to_string()));
        }
        if stream.contains('/') || stream.contains('\\') || stream.contains("..") {
            return Err(ForgeError::Config(format!(
                "image stream '{}' must be a plain name",
                stream
            )));
        }
        Ok(())
    }

    /// Cache file name for a stream/architecture pair.
    pub fn cached_file_name(stream: &str, architecture: Architecture) -> String {
        format!("fedora-coreos-{}-{}.iso", stream, architecture)
    }

    /// Return a local path to the base image, downloading it if needed.
    pub async fn resolve(&self, tool: &dyn ImageTool) -> ForgeResult<PathBuf> {
        match self {
            BaseImageSource::Path(path) => {
                if !path.is_file() {
                    return Err(ForgeError::Composition(format!(
                        "base image not found: {}",
                        path.display()
                    )));
                }
                Ok(path.clone())
            }
            BaseImageSource::Cached {
                cache_dir,
                stream,
                architecture,
            } => fetch_cached(tool, cache_dir, stream, *architecture).await,
        }
    }
}

async fn fetch_cached(
    tool: &dyn ImageTool,
    cache_dir: &Path,
    stream: &str,
    architecture: Architecture,
) -> ForgeResult<PathBuf> {
    BaseImageSource::check_stream(stream)?;
    let cached = cache_dir.join(BaseImageSource::cached_file_name(stream, architecture));
    if is_non_empty_file(&cached) {
        tracing::info!(image = %cached.display(), "Using cached base image");
        return Ok(cached);
    }

    std::fs::create_dir_all(cache_dir).map_err(|e| {
        ForgeError::Composition(format!(
            "cannot create cache directory {}: {}",
            cache_dir.display(),
            e
        ))
    })?;

    tracing::info!(
        stream,
        architecture = %architecture,
        "Downloading base installer image (first time only)..."
    );

    let download_dir = tempfile::Builder::new()
        .prefix(".download-")
        .tempdir_in(cache_dir)
        .map_err(|e| ForgeError::Composition(format!("cannot create download directory: {}", e)))?;

    tool.download_base_image(DownloadRequest {
        stream,
        architecture,
        dest_dir: download_dir.path(),
    })
    .await?;

    let downloaded = find_downloaded_image(download_dir.path())?;
    std::fs::rename(&downloaded, &cached).map_err(|e| {
        ForgeError::Composition(format!(
            "cannot move {} into the cache: {}",
            downloaded.display(),
            e
        ))
    })?;

    tracing::info!(image = %cached.display(), "Base image cached");
    Ok(cached)
}

fn find_downloaded_image(dir: &Path) -> ForgeResult<PathBuf> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        ForgeError::Composition(format!("cannot list {}: {}", dir.display(), e))
    })?;

    let mut images: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "iso") && is_non_empty_file(path))
        .collect();
    images.sort();

    images.into_iter().next().ok_or_else(|| {
        ForgeError::Composition("download finished but no .iso file was produced".to_string())
    })
}

fn is_non_empty_file(path: &Path) -> bool {
    path.metadata()
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}
