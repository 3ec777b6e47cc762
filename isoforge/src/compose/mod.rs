//! Installer image composition.
//!
//! The only stage with a destructive downstream effect: the artifact, once
//! booted, installs onto the target device. The device is passed through
//! literally and never inspected here.
//!
//! ```text
//! output_dir/
//! ├── .isoforge-XXXXXX/        staging, removed on every exit path
//! │   ├── config.ign
//! │   └── coreos-install.iso   written by the image tool
//! └── coreos-install.iso       renamed into place on success only
//! ```

mod base_image;

pub use base_image::{Architecture, BaseImageSource};

use crate::payload::PayloadSet;
use crate::target::InstallTarget;
use crate::tools::{EmbedRequest, ImageTool, TranspiledConfig};
use isoforge_shared::constants::image::STAGING_PREFIX;
use isoforge_shared::{ForgeError, ForgeResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const STAGED_CONFIG_NAME: &str = "config.ign";

/// Inputs for one composition.
#[derive(Debug, Clone, Copy)]
pub struct ComposeRequest<'a> {
    pub target: &'a InstallTarget,
    pub config: &'a TranspiledConfig,
    pub payload: &'a PayloadSet,
    pub output_dir: &'a Path,
    pub artifact_name: &'a str,
}

/// The final bootable image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerArtifact {
    pub path: PathBuf,
    pub size: u64,
    pub base_image: PathBuf,
}

pub struct ImageComposer {
    tool: Arc<dyn ImageTool>,
    base_image: BaseImageSource,
}

impl ImageComposer {
    pub fn new(tool: Arc<dyn ImageTool>, base_image: BaseImageSource) -> Self {
        Self { tool, base_image }
    }

    pub fn base_image(&self) -> &BaseImageSource {
        &self.base_image
    }

    /// Compose the artifact at `<output_dir>/<artifact_name>`.
    ///
    /// Nothing appears at the final path unless every step succeeded; a
    /// previous artifact there stays byte-identical on failure.
    pub async fn compose(&self, request: ComposeRequest<'_>) -> ForgeResult<InstallerArtifact> {
        check_artifact_name(request.artifact_name)?;
        if !request.output_dir.is_dir() {
            return Err(ForgeError::Composition(format!(
                "output directory does not exist: {}",
                request.output_dir.display()
            )));
        }

        request.payload.verify()?;

        let base_image = self.base_image.resolve(self.tool.as_ref()).await?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(request.output_dir)
            .map_err(|e| {
                ForgeError::Composition(format!(
                    "cannot create staging directory in {}: {}",
                    request.output_dir.display(),
                    e
                ))
            })?;

        let staged_config = staging.path().join(STAGED_CONFIG_NAME);
        std::fs::write(&staged_config, request.config.as_bytes()).map_err(|e| {
            ForgeError::Composition(format!("cannot stage config: {}", e))
        })?;

        let staged_artifact = staging.path().join(request.artifact_name);

        tracing::info!(
            device = %request.target,
            base_image = %base_image.display(),
            payload_files = request.payload.files().len(),
            "Embedding config into installer image"
        );

        self.tool
            .embed(EmbedRequest {
                base_image: &base_image,
                config: &staged_config,
                device: request.target,
                output: &staged_artifact,
            })
            .await?;

        let size = finished_size(&staged_artifact)?;

        let final_path = request.output_dir.join(request.artifact_name);
        std::fs::rename(&staged_artifact, &final_path).map_err(|e| {
            ForgeError::Composition(format!(
                "cannot move artifact to {}: {}",
                final_path.display(),
                e
            ))
        })?;

        tracing::info!(artifact = %final_path.display(), size, "Installer image written");

        Ok(InstallerArtifact {
            path: final_path,
            size,
            base_image,
        })
    }
}

/// Flush the staged artifact and return its size; an absent or empty file
/// means the tool did not really succeed.
fn finished_size(path: &Path) -> ForgeResult<u64> {
    let file = std::fs::File::open(path).map_err(|_| {
        ForgeError::Composition(format!(
            "image tool reported success but wrote no artifact at {}",
            path.display()
        ))
    })?;
    file.sync_all()
        .map_err(|e| ForgeError::Composition(format!("cannot flush artifact: {}", e)))?;

    let size = file
        .metadata()
        .map_err(|e| ForgeError::Composition(format!("cannot stat artifact: {}", e)))?
        .len();
    if size == 0 {
        return Err(ForgeError::Composition(
            "image tool reported success but the artifact is empty".to_string(),
        ));
    }
    Ok(size)
}

pub(crate) fn check_artifact_name(name: &str) -> ForgeResult<()> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.starts_with(STAGING_PREFIX);
    if plain {
        Ok(())
    } else {
        Err(ForgeError::InvalidInput(format!(
            "artifact name must be a plain file name, got '{}'",
            name
        )))
    }
}
