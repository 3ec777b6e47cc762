//! Stage 3: Transpile the rendered config.

use crate::pipeline::types::{TranspileInput, TranspileOutput};
use isoforge_shared::ForgeResult;

/// `local:` references in the config resolve against the payload root.
pub async fn run(input: TranspileInput<'_>) -> ForgeResult<TranspileOutput> {
    let config = input
        .transpiler
        .transpile(input.rendered, input.payload.root())
        .await?;

    tracing::info!(
        bytes = config.len(),
        sha256 = %config.digest(),
        "Transpiled provisioning config"
    );

    Ok(TranspileOutput { config })
}
