use clap::Args;
use isoforge::options::ForgeOptions;
use isoforge::{BuildRequest, IdentityReference, InstallTarget, ProvisionPipeline};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Block device the installer writes to (e.g. /dev/sda)
    pub device: String,

    /// Identity whose public keys are authorized on the installed host
    pub identity: String,

    /// Directory the installer image is written to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// File name of the installer image
    #[arg(long)]
    pub artifact_name: Option<String>,

    /// Template: embedded:<name> or a file path
    #[arg(short, long)]
    pub template: Option<String>,

    /// Directory of files to install on the host
    #[arg(long)]
    pub payload_dir: Option<PathBuf>,

    /// Use this base image instead of the cached download
    #[arg(long)]
    pub base_image: Option<PathBuf>,

    /// Base image architecture (default: host)
    #[arg(long)]
    pub architecture: Option<String>,

    /// Release stream for base image downloads
    #[arg(long)]
    pub stream: Option<String>,
}

impl BuildArgs {
    fn apply(&self, options: &mut ForgeOptions) {
        if let Some(dir) = &self.output_dir {
            options.image.output_dir = dir.clone();
        }
        if let Some(name) = &self.artifact_name {
            options.image.artifact_name = name.clone();
        }
        if let Some(template) = &self.template {
            options.render.template = template.clone();
        }
        if let Some(dir) = &self.payload_dir {
            options.render.payload_dir = Some(dir.clone());
        }
        if let Some(path) = &self.base_image {
            options.image.base_image = Some(path.clone());
        }
        if let Some(arch) = &self.architecture {
            options.image.architecture = Some(arch.clone());
        }
        if let Some(stream) = &self.stream {
            options.image.stream = stream.clone();
        }
    }
}

pub async fn execute(args: BuildArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let mut options = global.load_options()?;
    args.apply(&mut options);
    options.validate()?;

    let target = InstallTarget::new(&args.device)?;
    let identity = IdentityReference::new(&args.identity)?;
    let request = BuildRequest::from_options(target, identity, &options)?;

    let pipeline = ProvisionPipeline::new(global.key_source(&options)?, global.toolchain(&options));
    let report = pipeline.run(&request).await?;

    tracing::info!(
        keys = report.key_count,
        payload_files = report.payload_files,
        config_sha256 = %report.config_digest,
        size = report.artifact.size,
        "Build finished"
    );
    println!("{}", report.artifact.path.display());
    Ok(())
}
