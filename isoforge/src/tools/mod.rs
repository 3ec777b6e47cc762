//! External tool capabilities.
//!
//! The pipeline only sees narrow traits:
//! - [`Transpiler`]: rendered config -> low-level config (`butane`)
//! - [`Validator`]: low-level config -> ok / error (`ignition-validate`)
//! - [`ImageTool`]: base image download and config embedding (`coreos-installer`)
//!
//! The process-backed implementations build the argument list, run the tool
//! to completion and map a non-zero exit to the owning stage's error, passing
//! the tool's diagnostic through unmodified.

mod butane;
mod command;
mod coreos_installer;
mod ignition;

pub use butane::Butane;
pub use command::{ToolCommand, ToolOutput};
pub use coreos_installer::CoreosInstaller;
pub use ignition::IgnitionValidate;

use crate::compose::Architecture;
use crate::options::ToolPaths;
use crate::render::RenderedConfig;
use crate::target::InstallTarget;
use async_trait::async_trait;
use isoforge_shared::ForgeResult;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// TRANSPILED CONFIG
// ============================================================================

/// Machine-level provisioning config consumed by the first-boot engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspiledConfig {
    bytes: Vec<u8>,
}

impl TranspiledConfig {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hex SHA-256 of the config bytes.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

// ============================================================================
// CAPABILITIES
// ============================================================================

#[async_trait]
pub trait Transpiler: Send + Sync {
    /// Transpile `config`. `files_dir` is where `local:` file references
    /// resolve; without it such references are an error.
    async fn transpile(
        &self,
        config: &RenderedConfig,
        files_dir: Option<&Path>,
    ) -> ForgeResult<TranspiledConfig>;
}

#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, config: &TranspiledConfig) -> ForgeResult<()>;
}

/// Request to fetch a base installer image into `dest_dir`.
#[derive(Debug, Clone, Copy)]
pub struct DownloadRequest<'a> {
    pub stream: &'a str,
    pub architecture: Architecture,
    pub dest_dir: &'a Path,
}

/// Request to embed a config into a copy of `base_image` written at `output`.
#[derive(Debug, Clone, Copy)]
pub struct EmbedRequest<'a> {
    pub base_image: &'a Path,
    pub config: &'a Path,
    pub device: &'a InstallTarget,
    pub output: &'a Path,
}

#[async_trait]
pub trait ImageTool: Send + Sync {
    /// Download one base image into `request.dest_dir`.
    async fn download_base_image(&self, request: DownloadRequest<'_>) -> ForgeResult<()>;

    /// Write a customized image to `request.output`. The base image is not
    /// modified.
    async fn embed(&self, request: EmbedRequest<'_>) -> ForgeResult<()>;
}

// ============================================================================
// TOOLCHAIN
// ============================================================================

/// The set of tools one pipeline run uses.
#[derive(Clone)]
pub struct Toolchain {
    pub transpiler: Arc<dyn Transpiler>,
    pub validator: Arc<dyn Validator>,
    pub image_tool: Arc<dyn ImageTool>,
}

impl Toolchain {
    /// Process-backed tools at the configured paths.
    pub fn from_paths(paths: &ToolPaths, strict: bool) -> Self {
        Self {
            transpiler: Arc::new(Butane::new(&paths.butane).strict(strict)),
            validator: Arc::new(IgnitionValidate::new(&paths.ignition_validate)),
            image_tool: Arc::new(CoreosInstaller::new(&paths.coreos_installer)),
        }
    }
}

impl std::fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolchain").finish()
    }
}
