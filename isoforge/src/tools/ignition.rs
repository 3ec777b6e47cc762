//! `ignition-validate`: schema check of the transpiled config.

use super::{ToolCommand, TranspiledConfig, Validator};
use crate::util::find_binary;
use async_trait::async_trait;
use isoforge_shared::{ForgeError, ForgeResult};
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct IgnitionValidate {
    program: PathBuf,
}

impl IgnitionValidate {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Validator for IgnitionValidate {
    async fn validate(&self, config: &TranspiledConfig) -> ForgeResult<()> {
        let program = find_binary(&self.program)?;

        // The validator reads a file; stage the config privately for the call.
        let mut staged = tempfile::Builder::new()
            .prefix("isoforge-")
            .suffix(".ign")
            .tempfile()
            .map_err(|e| ForgeError::io("staging config for validation", e))?;
        staged
            .write_all(config.as_bytes())
            .and_then(|_| staged.flush())
            .map_err(|e| ForgeError::io("staging config for validation", e))?;

        let output = ToolCommand::new(program)
            .arg(staged.path())
            .run()
            .await
            .map_err(|e| ForgeError::Validation {
                diagnostic: format!("validator could not run: {}", e),
            })?;

        if !output.success() {
            tracing::error!(
                status = %output.describe_status(),
                "Transpiled config failed validation; refusing to compose"
            );
            return Err(ForgeError::Validation {
                diagnostic: output.diagnostic(),
            });
        }

        // ignition-validate reports warnings on stdout/stderr with exit 0.
        let warnings = output.diagnostic();
        if !warnings.is_empty() {
            tracing::warn!(warnings = %warnings, "Validator reported warnings");
        }

        Ok(())
    }
}
