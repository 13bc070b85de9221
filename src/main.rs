//! Cleo CLI
//!
//! Command-line interface for Cleo operations:
//! - Ask a running server (or a local snapshot) about a matchup
//! - Inspect a snapshot
//! - List champions
//! - Generate a config file

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use cleo::config::generate_default_config;
use cleo::index::read_snapshot;
use cleo::{
    CancelToken, Champion, Config, Exploration, Query, QueryClient, QueryEngine, QueryResponse,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cleo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Champion matchup statistics")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask how often the winners beat the losers
    Query {
        /// Champions on the winning side (name or id)
        #[arg(short, long, value_parser = parse_champion, num_args = 1..)]
        win: Vec<Champion>,
        /// Champions on the losing side (name or id)
        #[arg(short, long, value_parser = parse_champion, num_args = 1..)]
        lose: Vec<Champion>,
        /// Also try every other champion as an extra winner
        #[arg(short, long)]
        explore: bool,
        /// How many explorations to print
        #[arg(long, default_value = "10")]
        top: usize,
        /// Server address (default: from config)
        #[arg(short, long)]
        server: Option<String>,
        /// Evaluate against a snapshot file instead of a server
        #[arg(long, conflicts_with = "server")]
        snapshot: Option<PathBuf>,
    },

    /// Show what a snapshot contains
    Inspect {
        /// Snapshot file (default: from config)
        path: Option<PathBuf>,
        /// How many champions to list
        #[arg(long, default_value = "20")]
        top: usize,
    },

    /// List known champions
    Champions,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::resolve(cli.config.as_deref())?;
    let json = cli.format.eq_ignore_ascii_case("json");

    match cli.command {
        Commands::Query {
            win,
            lose,
            explore,
            top,
            server,
            snapshot,
        } => {
            let response = match snapshot {
                Some(path) => query_snapshot(&path, &win, &lose, explore)?,
                None => {
                    let address = server.unwrap_or_else(|| config.server.address());
                    let client = QueryClient::connect(&address)
                        .await
                        .with_context(|| format!("Failed to connect to {}", address))?;
                    let response = client.query(&win, &lose, explore).await?;
                    client.close();
                    response
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_response(&win, &lose, &response, top);
            }
        }

        Commands::Inspect { path, top } => {
            let path = path.unwrap_or(config.index.snapshot_path);
            let index = read_snapshot(&path)
                .with_context(|| format!("Failed to read snapshot {:?}", path))?;

            let mut champions: Vec<(Champion, usize)> = index
                .champions()
                .map(|(champion, record)| (champion, record.games()))
                .collect();
            champions.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

            if json {
                let rows: Vec<_> = champions
                    .iter()
                    .take(top)
                    .map(|(c, games)| serde_json::json!({ "id": c.id(), "name": c.name(), "games": games }))
                    .collect();
                let body = serde_json::json!({
                    "matches": index.total(),
                    "champions": index.champions().count(),
                    "built_at": index.built_at(),
                    "top": rows,
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                println!("{}", index.stats());
                println!();
                println!("{:<20} {:>10}", "Champion", "Games");
                println!("{}", "-".repeat(31));
                for (champion, games) in champions.iter().take(top) {
                    println!("{:<20} {:>10}", champion.name(), games);
                }
            }
        }

        Commands::Champions => {
            if json {
                let rows: Vec<_> = Champion::all()
                    .map(|c| serde_json::json!({ "id": c.id(), "name": c.name(), "shortname": c.shortname() }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for champion in Champion::all() {
                    println!("{:>5}  {:<20} {}", champion.id(), champion.name(), champion.shortname());
                }
            }
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            if let Some(path) = output {
                std::fs::write(&path, content)
                    .with_context(|| format!("Failed to write {:?}", path))?;
                println!("✓ Config written to {:?}", path);
            } else {
                print!("{}", content);
            }
        }
    }

    Ok(())
}

fn query_snapshot(
    path: &PathBuf,
    win: &[Champion],
    lose: &[Champion],
    explore: bool,
) -> anyhow::Result<QueryResponse> {
    let index = read_snapshot(path).with_context(|| format!("Failed to read snapshot {:?}", path))?;
    let engine = QueryEngine::new(Arc::new(index));
    let query = Query::new(win.iter().copied(), lose.iter().copied());
    let cancel = CancelToken::new();

    let request = cleo::QueryRequest {
        query_process: u64::from(std::process::id()),
        query_id: 0,
        winners: query.winners().iter().map(|c| c.id()).collect(),
        losers: query.losers().iter().map(|c| c.id()).collect(),
        explore,
    };

    let result = match engine.evaluate(&query, &cancel) {
        Ok(result) => result,
        Err(e) if e.is_invalid_query() => bail!("Invalid query: {}", e),
        Err(e) => return Err(e.into()),
    };
    let explorations = if explore {
        engine.explore(&query, &cancel)?
    } else {
        Vec::new()
    };

    Ok(QueryResponse::answered(&request, result, explorations))
}

fn print_response(win: &[Champion], lose: &[Champion], response: &QueryResponse, top: usize) {
    if !response.successful {
        println!("✗ Query rejected by server");
        return;
    }

    let names = |side: &[Champion]| {
        if side.is_empty() {
            "anyone".to_string()
        } else {
            side.iter().map(|c| c.name()).collect::<Vec<_>>().join(", ")
        }
    };
    let result = response.result();

    println!("{} vs {}", names(win), names(lose));
    println!("  Won:      {}", result.matching);
    println!("  Played:   {}", result.eligible);
    println!("  Of total: {}", result.total);
    if let Some(rate) = result.win_rate() {
        println!("  Win rate: {:.1}%", rate * 100.0);
    }

    if response.explorations.is_empty() {
        return;
    }

    let mut ranked: Vec<&Exploration> = response
        .explorations
        .iter()
        .filter(|e| e.result.eligible > 0)
        .collect();
    ranked.sort_by(|a, b| {
        let rate = |e: &Exploration| e.result.win_rate().unwrap_or(0.0);
        rate(b)
            .partial_cmp(&rate(a))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.result.eligible.cmp(&a.result.eligible))
    });

    println!();
    println!("{:<20} {:>8} {:>8} {:>8}", "Add winner", "Won", "Played", "Rate");
    println!("{}", "-".repeat(47));
    for e in ranked.into_iter().take(top) {
        println!(
            "{:<20} {:>8} {:>8} {:>7.1}%",
            e.champion.name(),
            e.result.matching,
            e.result.eligible,
            e.result.win_rate().unwrap_or(0.0) * 100.0
        );
    }
}
