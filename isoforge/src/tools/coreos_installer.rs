//! `coreos-installer`: base image download and `iso customize`.

use super::{DownloadRequest, EmbedRequest, ImageTool, ToolCommand, ToolOutput};
use crate::util::find_binary;
use async_trait::async_trait;
use isoforge_shared::constants::image::BASE_IMAGE_FORMAT;
use isoforge_shared::{ForgeError, ForgeResult};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct CoreosInstaller {
    program: PathBuf,
}

impl CoreosInstaller {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn download_arguments(request: &DownloadRequest<'_>) -> Vec<OsString> {
        vec![
            "download".into(),
            "--stream".into(),
            request.stream.into(),
            "--format".into(),
            BASE_IMAGE_FORMAT.into(),
            "--decompress".into(),
            "--architecture".into(),
            request.architecture.as_str().into(),
            "--directory".into(),
            request.dest_dir.as_os_str().to_os_string(),
        ]
    }

    pub fn embed_arguments(request: &EmbedRequest<'_>) -> Vec<OsString> {
        vec![
            "iso".into(),
            "customize".into(),
            "--dest-ignition".into(),
            request.config.as_os_str().to_os_string(),
            "--dest-device".into(),
            request.device.as_str().into(),
            "-o".into(),
            request.output.as_os_str().to_os_string(),
            request.base_image.as_os_str().to_os_string(),
        ]
    }

    async fn run(&self, args: Vec<OsString>) -> ForgeResult<ToolOutput> {
        let program = find_binary(&self.program)?;
        ToolCommand::new(program)
            .args(args)
            .run()
            .await
            .map_err(|e| ForgeError::Composition(e.to_string()))
    }
}

#[async_trait]
impl ImageTool for CoreosInstaller {
    async fn download_base_image(&self, request: DownloadRequest<'_>) -> ForgeResult<()> {
        let output = self.run(Self::download_arguments(&request)).await?;
        if !output.success() {
            return Err(ForgeError::Composition(format!(
                "base image download failed ({}):\n{}",
                output.describe_status(),
                output.diagnostic()
            )));
        }
        Ok(())
    }

    async fn embed(&self, request: EmbedRequest<'_>) -> ForgeResult<()> {
        let output = self.run(Self::embed_arguments(&request)).await?;
        if !output.success() {
            return Err(ForgeError::Composition(format!(
                "embedding config into {} failed ({}):\n{}",
                request.base_image.display(),
                output.describe_status(),
                output.diagnostic()
            )));
        }
        Ok(())
    }
}
