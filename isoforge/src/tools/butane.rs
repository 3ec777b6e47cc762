//! `butane`: Butane YAML -> Ignition JSON.

use super::{ToolCommand, TranspiledConfig, Transpiler};
use crate::render::RenderedConfig;
use crate::util::find_binary;
use async_trait::async_trait;
use isoforge_shared::constants::tools::BUTANE;
use isoforge_shared::{ForgeError, ForgeResult};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Butane {
    program: PathBuf,
    strict: bool,
}

impl Butane {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            strict: true,
        }
    }

    /// Treat Butane warnings as errors (default on).
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Argument list for one transpile run. Input on stdin, output on stdout.
    pub fn arguments(&self, files_dir: Option<&Path>) -> Vec<String> {
        let mut args = vec!["--pretty".to_string()];
        if self.strict {
            args.push("--strict".to_string());
        }
        if let Some(dir) = files_dir {
            args.push("--files-dir".to_string());
            args.push(dir.display().to_string());
        }
        args
    }
}

#[async_trait]
impl Transpiler for Butane {
    async fn transpile(
        &self,
        config: &RenderedConfig,
        files_dir: Option<&Path>,
    ) -> ForgeResult<TranspiledConfig> {
        let program = find_binary(&self.program)?;

        let output = ToolCommand::new(program)
            .args(self.arguments(files_dir))
            .stdin_bytes(config.as_bytes())
            .run()
            .await
            .map_err(|e| ForgeError::Transpile {
                tool: BUTANE.to_string(),
                diagnostic: e.to_string(),
            })?;

        if !output.success() {
            tracing::warn!(status = %output.describe_status(), "Transpiler rejected config");
            return Err(ForgeError::Transpile {
                tool: BUTANE.to_string(),
                diagnostic: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Err(ForgeError::Transpile {
                tool: BUTANE.to_string(),
                diagnostic: "transpiler exited successfully but produced no output".to_string(),
            });
        }

        Ok(TranspiledConfig::new(output.stdout))
    }
}
