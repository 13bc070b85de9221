//! Cleo Matchup Index
//!
//! Inverted index from champion to the matches it won and lost:
//!
//! - **PostingList**: sorted, duplicate-free match ids with `intersect`/`union`
//! - **MatchupIndex**: per-champion winning/losing lists plus the universe
//! - **Snapshot**: versioned binary file the builder writes and the server loads
//! - **IndexHandle**: atomically swappable reference used while serving
//!
//! # Architecture
//!
//! ```text
//! Query: "Thresh + Jinx beat Annie"
//!        ↓
//! Universe ∩ Thresh.winning ∩ Jinx.winning ∩ Annie.losing → matching
//!        ↓
//! (Annie.winning) ∪ (Thresh.losing ∩ Jinx.losing) ∪ matching → eligible
//! ```

mod error;
mod handle;
mod matchup;
pub mod postings;
pub mod snapshot;

pub use error::{IndexError, IndexResult};
pub use handle::IndexHandle;
pub use matchup::{ChampionRecord, MatchupIndex};
pub use postings::{intersect, union, PostingList};
pub use snapshot::{read_snapshot, write_metadata, write_snapshot, CompressionType, IndexMetadata};

/// Dense match identifier, assigned by the builder in encounter order
pub type MatchId = u32;

/// Statistics about a loaded index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of distinct matches
    pub matches: usize,
    /// Number of champions with at least one game
    pub champions: usize,
    /// Total postings across all winning and losing lists
    pub postings: usize,
    /// Unix milliseconds of the build
    pub built_at: i64,
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} matches, {} champions, {} postings",
            self.matches, self.champions, self.postings
        )
    }
}
