use crate::commands;
use clap::{Args, Parser, Subcommand};
use isoforge::options::ForgeOptions;
use isoforge::{HttpKeySource, SharedKeySource, Toolchain};
use isoforge_shared::constants::envs;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "isoforge",
    version,
    about = "Build unattended Fedora CoreOS installer images"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build an installer image for a device and identity
    Build(commands::build::BuildArgs),
    /// Resolve keys and print the rendered config without building
    Render(commands::render::RenderArgs),
    /// Print the public keys listed for an identity
    Keys(commands::keys::KeysArgs),
    /// Bundle workload manifests from a git repository into one YAML file
    Manifests(commands::manifests::ManifestsArgs),
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalFlags {
    /// YAML options file
    #[arg(long, global = true, env = envs::CONFIG)]
    pub config: Option<PathBuf>,

    /// Key listing endpoint (keys are read from <ENDPOINT>/<IDENTITY>.keys)
    #[arg(long, global = true, env = envs::KEYS_ENDPOINT)]
    pub endpoint: Option<String>,

    /// Path to the butane binary
    #[arg(long, global = true, env = envs::BUTANE)]
    pub butane: Option<PathBuf>,

    /// Path to the ignition-validate binary
    #[arg(long, global = true, env = envs::IGNITION_VALIDATE)]
    pub ignition_validate: Option<PathBuf>,

    /// Path to the coreos-installer binary
    #[arg(long, global = true, env = envs::COREOS_INSTALLER)]
    pub coreos_installer: Option<PathBuf>,

    /// Path to the git binary
    #[arg(long, global = true, env = envs::GIT)]
    pub git: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Also append logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

impl GlobalFlags {
    /// Defaults, then the options file, then flags and environment.
    pub fn load_options(&self) -> anyhow::Result<ForgeOptions> {
        let mut options = match &self.config {
            Some(path) => ForgeOptions::load(path)?,
            None => ForgeOptions::default(),
        };

        if let Some(endpoint) = &self.endpoint {
            options.identity.endpoint = endpoint.clone();
        }
        if let Some(path) = &self.butane {
            options.tools.butane = path.clone();
        }
        if let Some(path) = &self.ignition_validate {
            options.tools.ignition_validate = path.clone();
        }
        if let Some(path) = &self.coreos_installer {
            options.tools.coreos_installer = path.clone();
        }
        if let Some(path) = &self.git {
            options.tools.git = path.clone();
        }

        options.validate()?;
        Ok(options)
    }

    pub fn key_source(&self, options: &ForgeOptions) -> anyhow::Result<SharedKeySource> {
        let source = HttpKeySource::new(&options.identity.endpoint, options.identity.timeout())?;
        Ok(Arc::new(source))
    }

    pub fn toolchain(&self, options: &ForgeOptions) -> Toolchain {
        Toolchain::from_paths(&options.tools, options.render.strict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_options_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = dir.path().join("isoforge.yaml");
        std::fs::write(
            &config,
            "identity:\n  endpoint: https://keys.example.com\ntools:\n  butane: /opt/butane\n  git: /opt/git\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "isoforge",
            "--config",
            config.to_str().unwrap(),
            "--butane",
            "/usr/local/bin/butane",
            "keys",
            "alice",
        ])
        .unwrap();

        let options = cli.global.load_options().unwrap();
        assert_eq!(options.identity.endpoint, "https://keys.example.com");
        assert_eq!(options.tools.butane, PathBuf::from("/usr/local/bin/butane"));
        assert_eq!(options.tools.git, PathBuf::from("/opt/git"));
    }
}
