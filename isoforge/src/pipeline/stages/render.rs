//! Stage 2: Config rendering.
//!
//! Collects the payload (the template needs its file names), builds the
//! context and renders the template.

use crate::payload::PayloadSet;
use crate::pipeline::types::{RenderInput, RenderOutput};
use crate::render::{ConfigRenderer, TemplateContext};
use isoforge_shared::ForgeResult;

pub fn run(input: RenderInput<'_>) -> ForgeResult<RenderOutput> {
    let renderer = ConfigRenderer::load(input.template)?;

    let payload = match input.payload_dir {
        Some(dir) => PayloadSet::collect(dir, input.payload_target_root)?,
        None => PayloadSet::empty(),
    };

    let context = TemplateContext::new(input.target, input.keys, &payload);
    let rendered = renderer.render(context)?;

    tracing::info!(
        template = %renderer.name(),
        keys = input.keys.len(),
        payload_files = payload.files().len(),
        "Rendered provisioning config"
    );

    Ok(RenderOutput { rendered, payload })
}
