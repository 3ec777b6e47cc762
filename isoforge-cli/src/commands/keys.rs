use clap::Args;
use isoforge::{IdentityReference, IdentityResolver};

#[derive(Args, Debug)]
pub struct KeysArgs {
    /// Identity to look up
    pub identity: String,

    /// Print `<fingerprint> <algorithm> <comment>` instead of the key lines
    #[arg(long)]
    pub fingerprints: bool,
}

pub async fn execute(args: KeysArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let options = global.load_options()?;
    let identity = IdentityReference::new(&args.identity)?;

    let resolver = IdentityResolver::new(global.key_source(&options)?);
    let keys = resolver.resolve(&identity).await?;

    for key in keys.iter() {
        if args.fingerprints {
            println!(
                "{} {} {}",
                key.fingerprint(),
                key.algorithm(),
                key.comment().unwrap_or("(no comment)")
            );
        } else {
            println!("{}", key.as_str());
        }
    }
    Ok(())
}
