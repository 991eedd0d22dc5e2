use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use commands::{Command, Overrides};
use log::LevelFilter;
use simple_logger::SimpleLogger;

mod commands;
mod config;

/// Default configuration file, read only if present.
const DEFAULT_CONFIG_FILE: &str = "sampctl.toml";

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Verbose level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(flatten)]
    overrides: Overrides,
    #[command(subcommand)]
    command: Command,
}

fn main() {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Err(err) = SimpleLogger::new().with_level(log_level).init() {
        eprintln!("Could not set up logging: {}", err);
    }

    if let Err(err) = run(args) {
        log::error!("{:#}", err);
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run(args: Args) -> anyhow::Result<()> {
    let (config_file, required) = match args.config {
        Some(config_file) => (config_file, true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    let config = config::read_config(&config_file, required)
        .await
        .with_context(|| {
            format!(
                "Could not read configuration file ({})",
                config_file.to_string_lossy()
            )
        })?;
    log::debug!("Parsed configuration: {:#?}", config);

    let config = args.overrides.apply(config);
    commands::execute(args.command, config, &args.overrides).await
}
