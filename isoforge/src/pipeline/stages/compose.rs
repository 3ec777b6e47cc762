//! Stage 5: Installer image composition.

use crate::compose::ComposeRequest;
use crate::pipeline::types::{ComposeInput, ComposeOutput};
use isoforge_shared::ForgeResult;

pub async fn run(input: ComposeInput<'_>) -> ForgeResult<ComposeOutput> {
    let artifact = input
        .composer
        .compose(ComposeRequest {
            target: input.target,
            config: input.config.config(),
            payload: input.payload,
            output_dir: input.output_dir,
            artifact_name: input.artifact_name,
        })
        .await?;

    Ok(ComposeOutput { artifact })
}
