use anyhow::Context;
use bike_predictor::{logging, Config};
use clap::{Arg, ArgMatches, Command};
use dotenv::dotenv;
use std::path::PathBuf;
use std::process;

mod cli;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv().ok();

    let matches = build_cli().get_matches();

    if let Err(e) = run_command(matches).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn build_cli() -> Command {
    Command::new("bike_predictor")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Bike failure prediction API")
        .long_about("Serves bike failure predictions from PostgreSQL over HTTP")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("serve")
                .about("Start the HTTP API")
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .help("Port to listen on (overrides config)")
                        .value_parser(clap::value_parser!(u16))
                )
                .arg(
                    Arg::new("host")
                        .long("host")
                        .help("Host to bind to (overrides config)")
                )
        )
        .subcommand(
            Command::new("seed")
                .about("Create the predictions table and load sample rows")
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .help("Print the sample rows without touching the database")
                        .action(clap::ArgAction::SetTrue)
                )
        )
        .subcommand(
            Command::new("check")
                .about("Check database connectivity and list tables")
                .arg(
                    Arg::new("verbose")
                        .short('v')
                        .long("verbose")
                        .help("Show row counts and connection details")
                        .action(clap::ArgAction::SetTrue)
                )
        )
        .arg(
            Arg::new("config-dir")
                .long("config-dir")
                .help("Directory containing config.toml")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf))
        )
}

async fn run_command(matches: ArgMatches) -> anyhow::Result<()> {
    let config = match matches.get_one::<PathBuf>("config-dir") {
        Some(dir) => Config::load_from_dir(dir),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    logging::init_tracing(&config.logging)?;
    for warning in &config.warnings {
        tracing::warn!("{}", warning);
    }

    match matches.subcommand() {
        Some(("serve", sub_matches)) => {
            cli::commands::serve::handle_serve(sub_matches, config).await?
        }
        Some(("seed", sub_matches)) => {
            cli::commands::seed::handle_seed(sub_matches, &config).await?
        }
        Some(("check", sub_matches)) => {
            cli::commands::check::handle_check(sub_matches, &config).await?
        }
        _ => {
            unreachable!("Command parsing should ensure we never reach this");
        }
    }

    Ok(())
}
