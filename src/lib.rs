//! # Cleo
//!
//! Champion matchup statistics: how often did these champions win against
//! those champions?
//!
//! ## Features
//!
//! - **Compact index**: sorted posting lists of dense match ids per champion,
//!   persisted as a checksummed, LZ4-compressed snapshot
//! - **Exact counts**: matching and eligible games from set algebra, with
//!   optional exploration of every additional winner
//! - **Multiplexed transport**: many concurrent queries over one TCP
//!   connection, cancelled when the caller goes away
//! - **Hot reload**: the server swaps in a rebuilt snapshot without dropping
//!   connections
//!
//! ## Modules
//!
//! - [`champion`]: Champion ids and names
//! - [`store`]: Match record sources (SQLite, JSON lines)
//! - [`builder`]: Packs match records into an index
//! - [`index`]: Posting lists, the matchup index and its snapshot format
//! - [`query`]: Query validation and evaluation
//! - [`transport`]: Query server and client
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cleo::builder::build_index;
//! use cleo::store::SqliteMatchStore;
//! use cleo::index::{read_snapshot, write_snapshot, CompressionType};
//! use cleo::{CancelToken, Champion, Query, QueryEngine};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut store = SqliteMatchStore::open("matches.db")?;
//!     let (index, report) = build_index(&mut store, Vec::new())?;
//!     println!("{}", report);
//!
//!     write_snapshot("matchups.cleo", &index, CompressionType::Lz4)?;
//!
//!     let engine = QueryEngine::new(Arc::new(read_snapshot("matchups.cleo")?));
//!     let query = Query::new([Champion::from_name("thresh")], [Champion::from_name("annie")]);
//!     let result = engine.evaluate(&query, &CancelToken::new())?;
//!
//!     println!("{} of {} games won", result.matching, result.eligible);
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod champion;
pub mod config;
pub mod index;
pub mod logging;
pub mod query;
pub mod store;
pub mod transport;

pub use champion::Champion;

pub use index::{
    ChampionRecord, CompressionType, IndexError, IndexHandle, IndexMetadata, IndexResult,
    IndexStats, MatchId, MatchupIndex, PostingList,
};

pub use store::{
    JsonLinesSource, MatchRecord, MatchSource, Participant, SqliteMatchStore, StoreError,
    StoreResult, TeamRecord,
};

pub use builder::{build_index, BuildError, BuildReport, IndexBuilder, RecordFilter};

pub use query::{
    CancelToken, EngineResult, Exploration, Query, QueryEngine, QueryError, QueryResult,
    RequestState,
};

pub use transport::{
    QueryClient, QueryRequest, QueryResponse, QueryServer, TransportError, TransportResult,
};

pub use config::{
    BuilderConfig, Config, ConfigError, IndexConfig, LoggingConfig, ServerConfig,
};
