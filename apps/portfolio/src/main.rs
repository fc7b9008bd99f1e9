//! Portfolio service entry point.

use clap::Parser;
use portfolio::cli::{self, CliError};
use portfolio::config::{Cli, Command};
use portfolio::probe::SystemProbe;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Cli::parse();
    if let Err(e) = run(&args).await {
        tracing::error!(error = %e, "command failed");
        std::process::exit(1);
    }
}

async fn run(args: &Cli) -> Result<(), CliError> {
    let seeds = args.seed_candidates();
    match args.command() {
        Command::Serve => cli::cmd_serve(&args.database, &seeds, &args.serve).await,
        Command::Init { force } => cli::cmd_init(&args.database, &seeds, force).map(|_| ()),
        Command::Status { json } => cli::cmd_status(&args.database, json).map(|_| ()),
        Command::CheckPort { port, json } => {
            cli::cmd_check_port(&args.database, port, json, &SystemProbe)
                .await
                .map(|_| ())
        }
    }
}
