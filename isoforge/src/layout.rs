use isoforge_shared::constants::image::CACHE_DIR_NAME;
use isoforge_shared::{ForgeError, ForgeResult};
use std::path::{Path, PathBuf};

/// On-disk locations used between runs.
///
/// ```text
/// <cache_dir>/
/// ├── fedora-coreos-<stream>-<arch>.iso   cached base images
/// └── .download-XXXXXX/                   in-flight download, removed after
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForgeLayout {
    cache_dir: PathBuf,
}

impl ForgeLayout {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Layout under the user cache directory (`~/.cache/isoforge` on Linux).
    pub fn user_default() -> ForgeResult<Self> {
        let base = dirs::cache_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
            .ok_or_else(|| {
                ForgeError::Config(
                    "cannot determine a cache directory; set image.cache_dir".to_string(),
                )
            })?;
        Ok(Self::new(base.join(CACHE_DIR_NAME)))
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}
