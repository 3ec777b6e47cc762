use clap::Args;
use isoforge::manifests::{self, ManifestSource};
use isoforge_shared::constants::manifests::DEFAULT_OUTPUT;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ManifestsArgs {
    /// Git repository to clone
    #[arg(long)]
    pub repo: Option<String>,

    /// Tag, branch or commit to check out
    #[arg(long)]
    pub version: Option<String>,

    /// Directory inside the repository to collect from (repeatable)
    #[arg(long = "path")]
    pub paths: Vec<String>,

    /// Output file
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,
}

pub async fn execute(args: ManifestsArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let options = global.load_options()?;

    let mut source = ManifestSource::default();
    if let Some(repo) = args.repo {
        source.repo = repo;
    }
    if let Some(version) = args.version {
        source.version = version;
    }
    if !args.paths.is_empty() {
        source.paths = args.paths;
    }

    let bundle = manifests::fetch(&options.tools.git, &source).await?;
    let written = manifests::write_bundle(&bundle, &args.output)?;

    tracing::info!(documents = bundle.documents, "Manifests bundled");
    println!("{}", written.display());
    Ok(())
}
