use clap::Args;
use isoforge::{IdentityReference, InstallTarget, ProvisionPipeline, RenderRequest};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Block device the installer writes to
    pub device: String,

    /// Identity whose public keys are authorized
    pub identity: String,

    /// Template: embedded:<name> or a file path
    #[arg(short, long)]
    pub template: Option<String>,

    /// Directory of files to install on the host
    #[arg(long)]
    pub payload_dir: Option<PathBuf>,
}

pub async fn execute(args: RenderArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let mut options = global.load_options()?;
    if let Some(template) = args.template {
        options.render.template = template;
    }
    if let Some(dir) = args.payload_dir {
        options.render.payload_dir = Some(dir);
    }

    let target = InstallTarget::new(&args.device)?;
    let identity = IdentityReference::new(&args.identity)?;
    let request = RenderRequest::from_options(target, identity, &options);

    let pipeline = ProvisionPipeline::new(global.key_source(&options)?, global.toolchain(&options));
    let report = pipeline.render(&request).await?;

    print!("{}", report.rendered.as_str());
    if !report.rendered.as_str().ends_with('\n') {
        println!();
    }
    Ok(())
}
