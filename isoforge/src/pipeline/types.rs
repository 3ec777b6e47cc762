//! Type definitions for the provisioning pipeline.

use crate::compose::{BaseImageSource, ImageComposer, InstallerArtifact};
use crate::identity::{IdentityReference, IdentityResolver, KeySet};
use crate::options::ForgeOptions;
use crate::payload::PayloadSet;
use crate::pipeline::metrics::PipelineMetrics;
use crate::pipeline::state::PipelineState;
use crate::render::{RenderedConfig, TemplateSource};
use crate::target::InstallTarget;
use crate::tools::{TranspiledConfig, Transpiler, Validator};
use isoforge_shared::ForgeResult;
use std::path::{Path, PathBuf};

// ============================================================================
// Requests and reports
// ============================================================================

/// Inputs of the identity and render stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub target: InstallTarget,
    pub identity: IdentityReference,
    pub template: TemplateSource,
    pub payload_dir: Option<PathBuf>,
    pub payload_target_root: String,
}

impl RenderRequest {
    /// Request with template and payload settings taken from `options`.
    pub fn from_options(
        target: InstallTarget,
        identity: IdentityReference,
        options: &ForgeOptions,
    ) -> Self {
        Self {
            target,
            identity,
            template: options.render.template_source(),
            payload_dir: options.render.payload_dir.clone(),
            payload_target_root: options.render.payload_target_root.clone(),
        }
    }
}

/// Everything one build needs from the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub render: RenderRequest,
    pub base_image: BaseImageSource,
    pub output_dir: PathBuf,
    pub artifact_name: String,
}

impl BuildRequest {
    /// Request with every setting taken from `options`.
    pub fn from_options(
        target: InstallTarget,
        identity: IdentityReference,
        options: &ForgeOptions,
    ) -> ForgeResult<Self> {
        Ok(Self {
            render: RenderRequest::from_options(target, identity, options),
            base_image: options.image.base_image_source()?,
            output_dir: options.image.output_dir.clone(),
            artifact_name: options.image.artifact_name.clone(),
        })
    }

    /// Final artifact location.
    pub fn artifact_path(&self) -> PathBuf {
        self.output_dir.join(&self.artifact_name)
    }
}

/// Outcome of a successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub artifact: InstallerArtifact,
    pub key_count: usize,
    pub payload_files: usize,
    /// Hex SHA-256 of the embedded config.
    pub config_digest: String,
    pub state: PipelineState,
    pub metrics: PipelineMetrics,
}

/// Outcome of a dry run (identity + render only).
#[derive(Debug, Clone)]
pub struct RenderReport {
    pub keys: KeySet,
    pub payload: PayloadSet,
    pub rendered: RenderedConfig,
}

/// A transpiled config that passed validation.
///
/// Only the validate stage constructs this, and composition only accepts
/// this, so an unvalidated config cannot reach the image tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedConfig(TranspiledConfig);

impl ValidatedConfig {
    pub(crate) fn new(config: TranspiledConfig) -> Self {
        Self(config)
    }

    pub fn config(&self) -> &TranspiledConfig {
        &self.0
    }
}

// ============================================================================
// Stage inputs/outputs
// ============================================================================

pub struct IdentityInput<'a> {
    pub resolver: &'a IdentityResolver,
    pub identity: &'a IdentityReference,
}

pub struct IdentityOutput {
    pub keys: KeySet,
}

pub struct RenderInput<'a> {
    pub template: &'a TemplateSource,
    pub target: &'a InstallTarget,
    pub keys: &'a KeySet,
    pub payload_dir: Option<&'a Path>,
    pub payload_target_root: &'a str,
}

pub struct RenderOutput {
    pub rendered: RenderedConfig,
    pub payload: PayloadSet,
}

pub struct TranspileInput<'a> {
    pub transpiler: &'a dyn Transpiler,
    pub rendered: &'a RenderedConfig,
    pub payload: &'a PayloadSet,
}

pub struct TranspileOutput {
    pub config: TranspiledConfig,
}

pub struct ValidateInput<'a> {
    pub validator: &'a dyn Validator,
    pub config: TranspiledConfig,
}

pub struct ValidateOutput {
    pub config: ValidatedConfig,
}

pub struct ComposeInput<'a> {
    pub composer: &'a ImageComposer,
    pub target: &'a InstallTarget,
    pub config: &'a ValidatedConfig,
    pub payload: &'a PayloadSet,
    pub output_dir: &'a Path,
    pub artifact_name: &'a str,
}

pub struct ComposeOutput {
    pub artifact: InstallerArtifact,
}
