//! tsync CLI - reconcile historian tags into per-minute wide tables

use clap::Parser;
use env_logger::Env;

mod cli;
mod commands;
mod context;

use cli::Cli;
use commands::common::ExitCode;
use commands::{batch, compare, cron, ingest, registry, status, tables};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.global.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .init();

    let result = match &cli.command {
        cli::Commands::Batch(args) => batch::execute(args, &cli.global).await,
        cli::Commands::Cron(args) => cron::execute(args, &cli.global).await,
        cli::Commands::Compare(args) => compare::execute(args, &cli.global).await,
        cli::Commands::Ingest(args) => ingest::execute(args, &cli.global).await,
        cli::Commands::Registry(args) => registry::execute(args, &cli.global),
        cli::Commands::Tables(args) => tables::execute(args, &cli.global).await,
        cli::Commands::Status(args) => status::execute(args, &cli.global),
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<ExitCode>() {
            Some(code) => std::process::ExitCode::from(u8::try_from(code.0).unwrap_or(1)),
            None => {
                eprintln!("Error: {err:#}");
                std::process::ExitCode::FAILURE
            }
        },
    }
}
