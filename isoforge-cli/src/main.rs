mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, GlobalFlags};
use isoforge::util::init_logging;
use isoforge_shared::ForgeError;
use isoforge_shared::errors::exit_codes;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match init_logging(env_filter(&cli.global), cli.global.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => return report(&anyhow::Error::from(e)),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => return report(&anyhow::Error::from(ForgeError::io("starting async runtime", e))),
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let global = cli.global;
    let command = async {
        match cli.command {
            Commands::Build(args) => commands::build::execute(args, &global).await,
            Commands::Render(args) => commands::render::execute(args, &global).await,
            Commands::Keys(args) => commands::keys::execute(args, &global).await,
            Commands::Manifests(args) => commands::manifests::execute(args, &global).await,
        }
    };

    // Dropping the command future kills running tools and removes staging.
    tokio::select! {
        result = command => result,
        () = interrupted() => {
            tracing::warn!("Interrupted; aborting");
            Err(ForgeError::Cancelled.into())
        }
    }
}

async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// `RUST_LOG` wins; otherwise `info`, or debug for isoforge with `--debug`.
fn env_filter(global: &GlobalFlags) -> EnvFilter {
    let default = if global.debug {
        "info,isoforge=debug,isoforge_cli=debug"
    } else {
        "info"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn report(error: &anyhow::Error) -> ExitCode {
    eprintln!("Error: {:#}", error);
    let code = error
        .downcast_ref::<ForgeError>()
        .map(ForgeError::exit_code)
        .unwrap_or(exit_codes::FAILURE);
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
