use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use config::RunConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "HYDWS hydraulic data ingestion and export", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ingestion rules over a raw sensor file and write HYDWS JSON
    Ingest(IngestArgs),
    /// Filter and resample a HYDWS JSON file or directory
    Query(QueryArgs),
    /// Print boreholes and sections of a HYDWS JSON file or directory
    Summary(SummaryArgs),
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// Run configuration (TOML); falls back to HYDWS_CONFIG
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct QueryArgs {
    #[arg(long)]
    input: PathBuf,
    /// Inclusive lower bound, e.g. 2022-03-01T00:00:00
    #[arg(long, value_parser = parse_datetime)]
    start: Option<NaiveDateTime>,
    /// Inclusive upper bound
    #[arg(long, value_parser = parse_datetime)]
    end: Option<NaiveDateTime>,
    /// Resample interval in seconds
    #[arg(long)]
    resample: Option<i64>,
    /// Output file; stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SummaryArgs {
    #[arg(long)]
    input: PathBuf,
}

fn parse_datetime(value: &str) -> Result<NaiveDateTime, String> {
    hydws_core::record::parse_timestamp(value).map_err(|err| err.to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Ingest(args) => {
            let path = match args.config {
                Some(path) => path,
                None => std::env::var("HYDWS_CONFIG")
                    .map(PathBuf::from)
                    .context("--config or HYDWS_CONFIG must be set")?,
            };
            let config = RunConfig::load(&path)?;
            commands::ingest::run(&config)?;
            info!("Ingestion finished");
            Ok(())
        }
        Command::Query(args) => commands::query::run(
            &args.input,
            args.start,
            args.end,
            args.resample,
            args.output.as_deref(),
        ),
        Command::Summary(args) => commands::summary::run(&args.input),
    }
}
