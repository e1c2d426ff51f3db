// Zonefold binary: serves authoritative DNS from a manifest directory
use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use std::io::stderr;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

mod cmd;

use cmd::check::CheckArgs;
use cmd::serve::ServeArgs;

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative DNS from declarative zone manifests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output - shows more detailed logs
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the zones declared in a manifest directory
    Serve(ServeArgs),
    /// Validate a manifest directory without serving it
    Check(CheckArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // RUST_LOG wins; otherwise our crates at info (debug with --verbose)
    let level = if cli.verbose { "debug" } else { "info" };
    let default_directives = format!(
        "zonefold={level},zonefold_crd={level},zonefold_dns={level},zonefold_controller={level},hickory_server=warn,hickory_proto=warn",
        level = level
    );
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    registry().with(filter).with(fmt::layer().with_writer(stderr)).init();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    let outcome = match cli.command {
        Commands::Serve(args) => cmd::serve::run_serve(args, shutdown_rx).await,
        Commands::Check(args) => cmd::check::run_check(args).await,
    };

    if let Err(e) = outcome {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
