//! Cleo Packer
//!
//! Reads every match record from a store, builds the matchup index and
//! writes it as a snapshot (plus an optional JSON summary).
//!
//! ## Usage
//!
//! ```bash
//! # Pack the configured SQLite store
//! cleo-packer --output matchups.cleo
//!
//! # Pack a JSON-lines export, only games since a given day
//! cleo-packer --jsonl matches.jsonl --since 2014-05-01 --metadata matchups.json
//! ```

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use cleo::builder::{IndexBuilder, RecordFilter};
use cleo::index::{write_metadata, write_snapshot, CompressionType};
use cleo::store::{JsonLinesSource, MatchSource, SqliteMatchStore};
use cleo::{logging, Champion, Config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cleo-packer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build a matchup snapshot from stored match records")]
struct Args {
    /// Config file (default: search standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite match store (default: from config)
    #[arg(long, conflicts_with = "jsonl")]
    store: Option<PathBuf>,

    /// Read records from a JSON-lines file instead of SQLite
    #[arg(long)]
    jsonl: Option<PathBuf>,

    /// Snapshot output path (default: from config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write a JSON summary here
    #[arg(short, long)]
    metadata: Option<PathBuf>,

    /// Snapshot body compression
    #[arg(long, value_enum)]
    compression: Option<Compression>,

    /// Only games played on or after this day (YYYY-MM-DD, UTC)
    #[arg(long)]
    since: Option<NaiveDate>,

    /// Only games played before this day (YYYY-MM-DD, UTC)
    #[arg(long)]
    until: Option<NaiveDate>,

    /// Only games where this champion played (repeatable)
    #[arg(long = "require", value_parser = parse_champion)]
    require: Vec<Champion>,

    /// Only games this champion won (repeatable)
    #[arg(long = "require-win", value_parser = parse_champion)]
    require_win: Vec<Champion>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Compression {
    None,
    Lz4,
}

impl From<Compression> for CompressionType {
    fn from(c: Compression) -> Self {
        match c {
            Compression::None => CompressionType::None,
            Compression::Lz4 => CompressionType::Lz4,
        }
    }
}

fn parse_champion(s: &str) -> Result<Champion, String> {
    let champion = match s.parse::<u32>() {
        Ok(id) => Champion::from_riot_id(id),
        Err(_) => Champion::from_name(s),
    };

    if champion.is_known() {
        Ok(champion)
    } else {
        Err(format!("unknown champion '{}'", s))
    }
}

impl Args {
    fn filters(&self, config: &Config) -> Vec<RecordFilter> {
        let mut filters = vec![RecordFilter::MinTeams(config.builder.min_teams)];
        filters.extend(self.since.map(RecordFilter::PlayedOnOrAfter));
        filters.extend(self.until.map(RecordFilter::PlayedBefore));
        filters.extend(self.require.iter().copied().map(RecordFilter::ChampionPresent));
        filters.extend(
            self.require_win
                .iter()
                .copied()
                .map(RecordFilter::ChampionVictorious),
        );
        filters
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::resolve(args.config.as_deref())?;
    logging::init(&config.logging);

    tracing::info!("Cleo packer v{}", env!("CARGO_PKG_VERSION"));

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| config.index.snapshot_path.clone());
    let metadata = args.metadata.clone().or_else(|| config.index.metadata_path.clone());
    let compression = args
        .compression
        .map(CompressionType::from)
        .unwrap_or(config.index.compression);

    let filters = args.filters(&config);
    for filter in &filters {
        tracing::info!("Filter: {}", filter);
    }

    let mut source: Box<dyn MatchSource> = match &args.jsonl {
        Some(path) => {
            tracing::info!("Reading records from {:?}", path);
            Box::new(JsonLinesSource::new(path))
        }
        None => {
            let path = args.store.clone().unwrap_or(config.builder.store_path.clone());
            tracing::info!("Reading records from {:?}", path);
            Box::new(
                SqliteMatchStore::open_existing(&path)
                    .with_context(|| format!("Failed to open match store {:?}", path))?,
            )
        }
    };

    let mut builder = IndexBuilder::new()
        .with_filters(filters)
        .progress_every(config.builder.progress_every);
    builder
        .ingest_source(source.as_mut())
        .context("Failed to read match records")?;
    let (index, report) = builder.finish()?;

    let bytes = write_snapshot(&output, &index, compression)
        .with_context(|| format!("Failed to write snapshot {:?}", output))?;
    tracing::info!("Wrote {} bytes to {:?}", bytes, output);

    if let Some(path) = metadata {
        write_metadata(&path, &index)
            .with_context(|| format!("Failed to write metadata {:?}", path))?;
        tracing::info!("Wrote metadata to {:?}", path);
    }

    println!("✓ {}", report);
    Ok(())
}
