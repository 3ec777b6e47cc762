//! Provisioning pipeline orchestration.
//!
//! ## Architecture
//!
//! Five stages run strictly in sequence; each stage's output is the next
//! stage's input:
//!
//! ```text
//! 1. Identity ──→ 2. Render ──→ 3. Transpile ──→ 4. Validate ──→ 5. Compose
//! ```
//!
//! A failure anywhere aborts the run: later stages never start and nothing is
//! written at the artifact path. Dropping the run future cancels it; running
//! tools are killed and the staging directory is removed.

mod metrics;
mod stages;
mod state;
mod types;

pub use metrics::{PipelineMetrics, StageMetrics};
pub use state::{PipelineState, StateTracker};
pub use types::{BuildReport, BuildRequest, RenderReport, RenderRequest, ValidatedConfig};

use crate::compose::{ImageComposer, check_artifact_name};
use crate::identity::{IdentityReference, IdentityResolver, KeySet, SharedKeySource};
use crate::tools::Toolchain;
use isoforge_shared::{ForgeError, ForgeResult, Stage};
use metrics::MetricsRecorder;
use std::future::Future;
use std::time::Instant;
use types::{
    ComposeInput, IdentityInput, IdentityOutput, RenderInput, RenderOutput, TranspileInput,
    ValidateInput,
};

/// Runs the provisioning pipeline against a key source and a toolchain.
pub struct ProvisionPipeline {
    resolver: IdentityResolver,
    toolchain: Toolchain,
}

impl ProvisionPipeline {
    pub fn new(key_source: SharedKeySource, toolchain: Toolchain) -> Self {
        Self {
            resolver: IdentityResolver::new(key_source),
            toolchain,
        }
    }

    /// Run all five stages and write the installer image.
    pub async fn run(&self, request: &BuildRequest) -> ForgeResult<BuildReport> {
        preflight(request)?;

        tracing::info!(
            device = %request.render.target,
            identity = %request.render.identity,
            template = %request.render.template,
            artifact = %request.artifact_path().display(),
            "Building installer image"
        );

        let mut run = RunTracker::new();
        let (identity, render) = self.resolve_and_render(&mut run, &request.render).await?;

        let transpiled = run
            .stage(
                Stage::Transpile,
                stages::transpile::run(TranspileInput {
                    transpiler: self.toolchain.transpiler.as_ref(),
                    rendered: &render.rendered,
                    payload: &render.payload,
                }),
            )
            .await?;

        let validated = run
            .stage(
                Stage::Validate,
                stages::validate::run(ValidateInput {
                    validator: self.toolchain.validator.as_ref(),
                    config: transpiled.config,
                }),
            )
            .await?;

        let composer = ImageComposer::new(
            self.toolchain.image_tool.clone(),
            request.base_image.clone(),
        );
        let composed = run
            .stage(
                Stage::Compose,
                stages::compose::run(ComposeInput {
                    composer: &composer,
                    target: &request.render.target,
                    config: &validated.config,
                    payload: &render.payload,
                    output_dir: &request.output_dir,
                    artifact_name: &request.artifact_name,
                }),
            )
            .await?;

        let (state, metrics) = run.finish()?;

        tracing::info!(
            artifact = %composed.artifact.path.display(),
            total_ms = metrics.total_duration_ms,
            "Installer image ready"
        );

        Ok(BuildReport {
            key_count: identity.keys.len(),
            payload_files: render.payload.files().len(),
            config_digest: validated.config.config().digest(),
            artifact: composed.artifact,
            state,
            metrics,
        })
    }

    /// Dry run: resolve keys and render the config without invoking any tool.
    pub async fn render(&self, request: &RenderRequest) -> ForgeResult<RenderReport> {
        let mut run = RunTracker::new();
        let (identity, render) = self.resolve_and_render(&mut run, request).await?;

        Ok(RenderReport {
            keys: identity.keys,
            payload: render.payload,
            rendered: render.rendered,
        })
    }

    /// Stage 1 only.
    pub async fn resolve_keys(&self, identity: &IdentityReference) -> ForgeResult<KeySet> {
        self.resolver.resolve(identity).await
    }

    async fn resolve_and_render(
        &self,
        run: &mut RunTracker,
        request: &RenderRequest,
    ) -> ForgeResult<(IdentityOutput, RenderOutput)> {
        let identity = run
            .stage(
                Stage::ResolveIdentity,
                stages::identity::run(IdentityInput {
                    resolver: &self.resolver,
                    identity: &request.identity,
                }),
            )
            .await?;

        let render = run
            .stage(Stage::Render, async {
                stages::render::run(RenderInput {
                    template: &request.template,
                    target: &request.target,
                    keys: &identity.keys,
                    payload_dir: request.payload_dir.as_deref(),
                    payload_target_root: &request.payload_target_root,
                })
            })
            .await?;

        Ok((identity, render))
    }
}

/// Reject output settings before any network or tool work.
fn preflight(request: &BuildRequest) -> ForgeResult<()> {
    check_artifact_name(&request.artifact_name)?;
    if !request.output_dir.is_dir() {
        return Err(ForgeError::InvalidInput(format!(
            "output directory does not exist: {}",
            request.output_dir.display()
        )));
    }
    Ok(())
}

/// State machine and timings for one run.
struct RunTracker {
    state: StateTracker,
    metrics: MetricsRecorder,
}

impl RunTracker {
    fn new() -> Self {
        Self {
            state: StateTracker::new(),
            metrics: MetricsRecorder::start(),
        }
    }

    async fn stage<T>(
        &mut self,
        stage: Stage,
        work: impl Future<Output = ForgeResult<T>>,
    ) -> ForgeResult<T> {
        self.state.enter(stage)?;
        tracing::debug!(stage = %stage, "Stage started");

        let started = Instant::now();
        let result = work.await;
        self.metrics.record(stage, started, result.is_ok());

        if let Err(e) = &result {
            self.state.fail()?;
            tracing::error!(stage = %stage, error = %e, "Stage failed; aborting");
        }
        result
    }

    fn finish(mut self) -> ForgeResult<(PipelineState, PipelineMetrics)> {
        self.state.finish()?;
        Ok((self.state.state(), self.metrics.finish()))
    }
}
