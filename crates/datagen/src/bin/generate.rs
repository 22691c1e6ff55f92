//! Dataset generation script - writes every MetricFlow table
//!
//! Run with:
//! ```
//! cargo run -p datagen --bin generate -- --users 5000 --seed 7
//! cargo run -p datagen --bin generate -- --config generator.json --compression none
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use datagen::builders::ScenarioBuilder;
use datagen::config::{Compression, GeneratorConfig};
use time::Date;
use time::macros::format_description;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "generate", about = "Generate the synthetic MetricFlow SaaS dataset")]
struct Args {
    /// Path to a JSON config file. Missing fields take defaults.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of users to generate.
    #[arg(long)]
    users: Option<usize>,

    /// Master seed.
    #[arg(long)]
    seed: Option<u64>,

    /// First day of history (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    start: Option<Date>,

    /// Last day of history and simulation horizon (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    end: Option<Date>,

    /// Directory for entity tables.
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Directory for reference tables.
    #[arg(long, value_name = "DIR")]
    seeds_dir: Option<PathBuf>,

    /// Parquet codec for entity tables: none, snappy, or gzip.
    #[arg(long)]
    compression: Option<Compression>,
}

fn parse_date(s: &str) -> Result<Date, String> {
    Date::parse(s, format_description!("[year]-[month]-[day]")).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => GeneratorConfig::load(path)
            .with_context(|| format!("loading config file {}", path.display()))?,
        None => GeneratorConfig::default(),
    };

    // CLI flags override config file, which overrides defaults.
    if let Some(users) = args.users {
        config.num_users = users;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(start) = args.start {
        config.history_start = start;
    }
    if let Some(end) = args.end {
        config.history_end = end;
    }
    if let Some(dir) = args.output_dir {
        config.output.dir = dir;
    }
    if let Some(dir) = args.seeds_dir {
        config.output.seeds_dir = dir;
    }
    if let Some(compression) = args.compression {
        config.output.compression = compression;
    }

    let result = ScenarioBuilder::with_config(config)
        .with_metrics(true)
        .build()
        .context("generating dataset")?;

    // Summary output
    tracing::info!("Generation completed!");
    for (table, rows) in result.row_counts() {
        tracing::info!("  {}: {}", table, rows);
    }
    tracing::info!("  Total rows: {}", result.total_rows());
    if let Some(metrics) = &result.metrics {
        tracing::info!(
            "  Generated in {} ms, written in {} ms",
            metrics.generation_time_ms,
            metrics.write_time_ms
        );
    }

    Ok(())
}
