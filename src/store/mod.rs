//! Match record stores
//!
//! The index builder only needs one thing from a store: a single pass over
//! every match record. [`MatchSource`] captures that. Two stores ship with
//! the crate:
//!
//! - [`SqliteMatchStore`]: records keyed by upstream id, with a secondary
//!   date-partition index
//! - [`JsonLinesSource`]: one JSON-encoded record per line, for exports and
//!   fixtures

mod error;
mod jsonl;
mod sqlite;
mod types;

pub use error::{StoreError, StoreResult};
pub use jsonl::JsonLinesSource;
pub use sqlite::SqliteMatchStore;
pub use types::{quick_date, MatchRecord, Participant, TeamRecord};

/// A single pass over every record in a store.
///
/// Per-record failures are handed to the visitor as `Err` so the caller can
/// skip them; an `Err` return from `for_each_record` itself means the pass
/// could not run at all.
pub trait MatchSource {
    /// Number of records the pass will visit, if cheaply known
    fn len_hint(&self) -> Option<u64> {
        None
    }

    fn for_each_record(
        &mut self,
        visit: &mut dyn FnMut(StoreResult<MatchRecord>),
    ) -> StoreResult<()>;
}

/// In-memory source, mostly for tests and tooling
impl MatchSource for Vec<MatchRecord> {
    fn len_hint(&self) -> Option<u64> {
        Some(self.len() as u64)
    }

    fn for_each_record(
        &mut self,
        visit: &mut dyn FnMut(StoreResult<MatchRecord>),
    ) -> StoreResult<()> {
        for record in self.iter() {
            visit(Ok(record.clone()));
        }
        Ok(())
    }
}
