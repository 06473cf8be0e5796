pub mod aggregate;
pub mod cache;
pub mod cli;
pub mod columns;
pub mod config;
pub mod data;
pub mod dataset;
pub mod derive;
pub mod engine;
pub mod error;
pub mod export;
pub mod export_cmd;
pub mod filter;
pub mod format;
pub mod instrument;
pub mod io_utils;
pub mod leaderboard;
pub mod metrics;
pub mod ranges;
pub mod record;
pub mod scheduler;
pub mod schema;
pub mod sort;
pub mod stats;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("statboard", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Columns(args) => columns::execute(&args),
        Commands::Table(args) => leaderboard::execute(&args),
        Commands::Export(args) => export_cmd::execute(&args),
        Commands::Stats(args) => stats::execute(&args),
    }
}
