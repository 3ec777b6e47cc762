//! Stage 4: Validation gate.
//!
//! The only way to obtain a [`ValidatedConfig`].

use crate::pipeline::types::{ValidateInput, ValidateOutput, ValidatedConfig};
use isoforge_shared::ForgeResult;

pub async fn run(input: ValidateInput<'_>) -> ForgeResult<ValidateOutput> {
    input.validator.validate(&input.config).await?;
    tracing::info!(sha256 = %input.config.digest(), "Config passed validation");

    Ok(ValidateOutput {
        config: ValidatedConfig::new(input.config),
    })
}
