//! Query Engine
//!
//! Evaluates matchup queries against one immutable [`MatchupIndex`].
//!
//! Two sets are computed per query:
//!
//! - **matching**: the queried winners won and the queried losers lost
//!   (numerator)
//! - **eligible**: the queried champions faced each other in the given split,
//!   whoever won (denominator)
//!
//! ```text
//! matching   = U ∩ W(w₁) ∩ … ∩ L(l₁) ∩ …
//! altWinning = U ∩ W(l₁) ∩ …        (∅ without losers)
//! altLosing  = U ∩ L(w₁) ∩ …        (∅ without winners)
//! eligible   = altWinning ∪ altLosing ∪ matching
//! ```
//!
//! Intersecting only the hypothesized outcome would undercount eligibility
//! whenever the matchup happened with the opposite result, hence the two
//! alternate-outcome sets.

use crate::champion::Champion;
use crate::index::{intersect, union, MatchupIndex, PostingList};
use crate::query::error::{EngineResult, QueryError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Required winners and losers. Each side behaves as a set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    winners: Vec<Champion>,
    losers: Vec<Champion>,
}

impl Query {
    pub fn new(
        winners: impl IntoIterator<Item = Champion>,
        losers: impl IntoIterator<Item = Champion>,
    ) -> Self {
        Self {
            winners: as_set(winners),
            losers: as_set(losers),
        }
    }

    /// Build from raw wire ids; unresolvable ids become `Champion::UNKNOWN`
    /// and fail validation.
    pub fn from_ids(winners: &[u16], losers: &[u16]) -> Self {
        let resolve = |id: &u16| Champion::from_riot_id(u32::from(*id));
        Self::new(winners.iter().map(resolve), losers.iter().map(resolve))
    }

    pub fn winners(&self) -> &[Champion] {
        &self.winners
    }

    pub fn losers(&self) -> &[Champion] {
        &self.losers
    }

    pub fn involves(&self, champion: Champion) -> bool {
        self.winners.contains(&champion) || self.losers.contains(&champion)
    }

    /// Same query with one more required winner
    pub fn with_winner(&self, champion: Champion) -> Self {
        Self::new(
            self.winners.iter().copied().chain(std::iter::once(champion)),
            self.losers.iter().copied(),
        )
    }

    /// Same query with one more required loser
    pub fn with_loser(&self, champion: Champion) -> Self {
        Self::new(
            self.winners.iter().copied(),
            self.losers.iter().copied().chain(std::iter::once(champion)),
        )
    }

    /// Reject queries that cannot be evaluated
    pub fn validate(&self) -> EngineResult<()> {
        if self.winners.is_empty() && self.losers.is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        if let Some(bad) = self
            .winners
            .iter()
            .chain(&self.losers)
            .find(|c| !c.is_known())
        {
            return Err(QueryError::UnknownChampion(bad.id()));
        }

        if let Some(both) = self.winners.iter().find(|c| self.losers.contains(c)) {
            return Err(QueryError::ConflictingChampion(*both));
        }

        Ok(())
    }
}

fn as_set(champions: impl IntoIterator<Item = Champion>) -> Vec<Champion> {
    let mut out: Vec<Champion> = champions.into_iter().collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Counts answering one query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Matches where the hypothesized outcome happened
    pub matching: u32,
    /// Matches where the matchup happened at all
    pub eligible: u32,
    /// Matches in the index
    pub total: u32,
}

impl QueryResult {
    /// Empirical win rate of the winners' side in this matchup
    pub fn win_rate(&self) -> Option<f64> {
        (self.eligible > 0).then(|| f64::from(self.matching) / f64::from(self.eligible))
    }

    /// Share of all matches in which this matchup occurred
    pub fn prevalence(&self) -> Option<f64> {
        (self.total > 0).then(|| f64::from(self.eligible) / f64::from(self.total))
    }
}

/// Result of the base query with one extra champion added to the winners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exploration {
    pub champion: Champion,
    pub result: QueryResult,
}

/// Cooperative cancellation flag shared between a handler and its evaluation
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> EngineResult<()> {
        if self.is_cancelled() {
            Err(QueryError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Lifecycle of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Computing,
    Responded,
    Failed,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Responded | RequestState::Failed)
    }

    /// Move to `next` if the transition is legal
    pub fn advance(self, next: RequestState) -> Option<RequestState> {
        use RequestState::*;
        match (self, next) {
            (Received, Computing) | (Received, Responded) | (Received, Failed) => Some(next),
            (Computing, Responded) | (Computing, Failed) => Some(next),
            _ => None,
        }
    }
}

/// Intermediate sets of one evaluation
struct Components {
    matching: PostingList,
    alt_winning: PostingList,
    /// `None` when there are no winners (the set is empty)
    alt_losing: Option<PostingList>,
}

impl Components {
    fn eligible(&self) -> PostingList {
        let alternate = match &self.alt_losing {
            Some(alt_losing) => union(&self.alt_winning, alt_losing),
            None => self.alt_winning.clone(),
        };
        union(&alternate, &self.matching)
    }
}

/// Stateless evaluator over one index snapshot
#[derive(Debug, Clone)]
pub struct QueryEngine {
    index: Arc<MatchupIndex>,
}

impl QueryEngine {
    pub fn new(index: Arc<MatchupIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &MatchupIndex {
        &self.index
    }

    /// Validate and evaluate a query
    pub fn evaluate(&self, query: &Query, cancel: &CancelToken) -> EngineResult<QueryResult> {
        query.validate()?;
        let parts = self.components(query, cancel)?;
        cancel.check()?;

        Ok(self.result_of(&parts.matching, &parts.eligible()))
    }

    /// For every known champion not already in the query, the result of
    /// adding it to the winners.
    pub fn explore(&self, query: &Query, cancel: &CancelToken) -> EngineResult<Vec<Exploration>> {
        query.validate()?;
        let base = self.components(query, cancel)?;
        let universe = self.index.universe();

        let mut out = Vec::new();
        for champion in Champion::all().filter(|c| !query.involves(*c)) {
            cancel.check()?;

            let record = self.index.champion(champion);
            let matching = intersect(&base.matching, &record.winning);
            let alt_losing = intersect(base.alt_losing.as_ref().unwrap_or(universe), &record.losing);
            let eligible = union(&union(&base.alt_winning, &alt_losing), &matching);

            out.push(Exploration {
                champion,
                result: self.result_of(&matching, &eligible),
            });
        }

        Ok(out)
    }

    fn components(&self, query: &Query, cancel: &CancelToken) -> EngineResult<Components> {
        let index = &*self.index;

        let matching = self.narrow(
            query
                .winners()
                .iter()
                .map(|c| &index.champion(*c).winning)
                .chain(query.losers().iter().map(|c| &index.champion(*c).losing)),
            cancel,
        )?;

        let alt_winning = if query.losers().is_empty() {
            PostingList::new()
        } else {
            self.narrow(
                query.losers().iter().map(|c| &index.champion(*c).winning),
                cancel,
            )?
        };

        let alt_losing = if query.winners().is_empty() {
            None
        } else {
            Some(self.narrow(
                query.winners().iter().map(|c| &index.champion(*c).losing),
                cancel,
            )?)
        };

        Ok(Components {
            matching,
            alt_winning,
            alt_losing,
        })
    }

    /// Universe intersected with every list in turn
    fn narrow<'a>(
        &self,
        lists: impl Iterator<Item = &'a PostingList>,
        cancel: &CancelToken,
    ) -> EngineResult<PostingList> {
        let universe = self.index.universe();
        let mut acc: Option<PostingList> = None;

        for list in lists {
            cancel.check()?;
            acc = Some(intersect(acc.as_ref().unwrap_or(universe), list));
        }

        Ok(acc.unwrap_or_else(|| universe.clone()))
    }

    fn result_of(&self, matching: &PostingList, eligible: &PostingList) -> QueryResult {
        QueryResult {
            matching: matching.len() as u32,
            eligible: eligible.len() as u32,
            total: self.index.total() as u32,
        }
    }
}
