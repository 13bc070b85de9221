//! Index Builder
//!
//! Compacts raw match records into a [`MatchupIndex`] in a single pass:
//!
//! 1. Give each unseen upstream record id the next dense [`MatchId`]
//! 2. Append that id to the winning or losing list of every resolvable
//!    champion on each team
//! 3. Append it once to the universe
//! 4. Sort and deduplicate every list
//!
//! Unreadable records are skipped and counted. Writing the snapshot is the
//! caller's job (see [`crate::index::write_snapshot`]).

mod filter;

pub use filter::RecordFilter;

use crate::champion::Champion;
use crate::index::{ChampionRecord, IndexError, MatchId, MatchupIndex, PostingList};
use crate::store::{MatchRecord, MatchSource, StoreError};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::time::Instant;
use thiserror::Error;

/// Errors that abort a build
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Dense match id space exhausted after {0} matches")]
    IdSpaceExhausted(u64),
}

pub type BuildResult<T> = Result<T, BuildError>;

/// What happened to one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Indexed(MatchId),
    /// Upstream id already indexed in this build. The later record's teams
    /// are ignored, so the first occurrence alone decides the outcome.
    Duplicate(MatchId),
    /// Rejected by a filter
    Filtered,
}

/// Counters collected over one build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub records_seen: u64,
    pub indexed: u64,
    pub duplicates: u64,
    pub filtered: u64,
    pub malformed: u64,
    /// Participants whose champion id is not in the table
    pub unknown_participants: u64,
    /// Champion appearances dropped because the champion was on both sides
    pub mirrored: u64,
    pub elapsed_ms: u64,
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} seen, {} indexed, {} duplicate, {} filtered, {} malformed, {} unknown participants, {} mirrored ({} ms)",
            self.records_seen,
            self.indexed,
            self.duplicates,
            self.filtered,
            self.malformed,
            self.unknown_participants,
            self.mirrored,
            self.elapsed_ms
        )
    }
}

/// Accumulates match records into posting lists
pub struct IndexBuilder {
    filters: Vec<RecordFilter>,
    progress_every: u64,
    built_at: Option<i64>,
    dense_ids: HashMap<u64, MatchId>,
    next_id: MatchId,
    winning: BTreeMap<Champion, Vec<MatchId>>,
    losing: BTreeMap<Champion, Vec<MatchId>>,
    universe: Vec<MatchId>,
    report: BuildReport,
    started: Instant,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            progress_every: 10_000,
            built_at: None,
            dense_ids: HashMap::new(),
            next_id: 0,
            winning: BTreeMap::new(),
            losing: BTreeMap::new(),
            universe: Vec::new(),
            report: BuildReport::default(),
            started: Instant::now(),
        }
    }

    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_filters(mut self, filters: impl IntoIterator<Item = RecordFilter>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// Log progress every `n` records (0 disables)
    pub fn progress_every(mut self, n: u64) -> Self {
        self.progress_every = n;
        self
    }

    /// Fix the build timestamp instead of using the wall clock
    pub fn built_at(mut self, unix_ms: i64) -> Self {
        self.built_at = Some(unix_ms);
        self
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Add one record
    pub fn ingest(&mut self, record: &MatchRecord) -> BuildResult<IngestOutcome> {
        self.report.records_seen += 1;

        if let Some(&existing) = self.dense_ids.get(&record.record_id) {
            self.report.duplicates += 1;
            return Ok(IngestOutcome::Duplicate(existing));
        }

        if let Some(rejected) = self.filters.iter().find(|f| !f.accepts(record)) {
            tracing::trace!(record_id = record.record_id, filter = %rejected, "Record filtered");
            self.report.filtered += 1;
            return Ok(IngestOutcome::Filtered);
        }

        let id = self.next_id;
        self.next_id = self
            .next_id
            .checked_add(1)
            .ok_or(BuildError::IdSpaceExhausted(self.report.indexed))?;
        self.dense_ids.insert(record.record_id, id);

        let mut won = BTreeSet::new();
        let mut lost = BTreeSet::new();
        for team in &record.teams {
            for player in &team.players {
                let champion = player.champion();
                if !champion.is_known() {
                    self.report.unknown_participants += 1;
                    continue;
                }
                if team.victory {
                    won.insert(champion);
                } else {
                    lost.insert(champion);
                }
            }
        }

        for champion in won.intersection(&lost) {
            tracing::debug!(record_id = record.record_id, %champion, "Champion on both teams, not indexed");
            self.report.mirrored += 1;
        }

        for champion in won.difference(&lost) {
            self.winning.entry(*champion).or_default().push(id);
        }
        for champion in lost.difference(&won) {
            self.losing.entry(*champion).or_default().push(id);
        }

        self.universe.push(id);
        self.report.indexed += 1;
        Ok(IngestOutcome::Indexed(id))
    }

    /// Note a record the source could not decode
    pub fn skip_malformed(&mut self, err: &StoreError) {
        self.report.records_seen += 1;
        self.report.malformed += 1;
        tracing::warn!("Skipping unreadable record: {}", err);
    }

    /// Run one full pass over a source
    pub fn ingest_source<S: MatchSource + ?Sized>(&mut self, source: &mut S) -> BuildResult<()> {
        let total = source.len_hint();
        let mut failure = None;

        source.for_each_record(&mut |item| {
            if failure.is_some() {
                return;
            }

            match item {
                Ok(record) => {
                    if let Err(e) = self.ingest(&record) {
                        failure = Some(e);
                    }
                }
                Err(e) if e.is_record_level() => self.skip_malformed(&e),
                Err(e) => failure = Some(BuildError::Store(e)),
            }

            let seen = self.report.records_seen;
            if self.progress_every > 0 && seen % self.progress_every == 0 {
                match total {
                    Some(total) => tracing::info!("Packing {} of {}...", seen, total),
                    None => tracing::info!("Packing {}...", seen),
                }
            }
        })?;

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Sort every list and assemble the index
    pub fn finish(mut self) -> BuildResult<(MatchupIndex, BuildReport)> {
        let mut champions: BTreeMap<Champion, ChampionRecord> = BTreeMap::new();

        for (champion, ids) in std::mem::take(&mut self.winning) {
            champions.entry(champion).or_default().winning = PostingList::from_unsorted(ids);
        }
        for (champion, ids) in std::mem::take(&mut self.losing) {
            champions.entry(champion).or_default().losing = PostingList::from_unsorted(ids);
        }

        let universe = PostingList::from_unsorted(std::mem::take(&mut self.universe));
        let built_at = self
            .built_at
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

        let index = MatchupIndex::new(champions, universe, built_at)?;

        self.report.elapsed_ms = self.started.elapsed().as_millis() as u64;
        tracing::info!(stats = %index.stats(), "Index built: {}", self.report);

        Ok((index, self.report))
    }
}

/// Build an index from a source in one call
pub fn build_index<S: MatchSource + ?Sized>(
    source: &mut S,
    filters: Vec<RecordFilter>,
) -> BuildResult<(MatchupIndex, BuildReport)> {
    let mut builder = IndexBuilder::new().with_filters(filters);
    builder.ingest_source(source)?;
    builder.finish()
}
