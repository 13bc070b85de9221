//! The matchup index: per-champion winning/losing posting lists plus the
//! universe of every known match.

use crate::champion::Champion;
use crate::index::error::{IndexError, IndexResult};
use crate::index::postings::{intersect, PostingList};
use crate::index::IndexStats;
use std::collections::BTreeMap;

/// Matches a champion took part in, split by outcome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChampionRecord {
    /// Matches this champion's team won
    pub winning: PostingList,
    /// Matches this champion's team lost
    pub losing: PostingList,
}

impl ChampionRecord {
    pub fn new(winning: PostingList, losing: PostingList) -> Self {
        Self { winning, losing }
    }

    /// Total games played
    pub fn games(&self) -> usize {
        self.winning.len() + self.losing.len()
    }
}

/// Immutable inverted index from champion to match outcomes
///
/// Once loaded it is only ever read; a reload builds a new value and swaps it
/// in through [`crate::index::IndexHandle`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchupIndex {
    champions: BTreeMap<Champion, ChampionRecord>,
    universe: PostingList,
    built_at: i64,
}

impl MatchupIndex {
    /// Assemble an index and check its invariants
    pub fn new(
        champions: BTreeMap<Champion, ChampionRecord>,
        universe: PostingList,
        built_at: i64,
    ) -> IndexResult<Self> {
        let index = Self {
            champions,
            universe,
            built_at,
        };
        index.validate()?;
        Ok(index)
    }

    /// Empty list shared by champions with no recorded games
    fn empty() -> &'static ChampionRecord {
        static EMPTY: ChampionRecord = ChampionRecord {
            winning: PostingList::EMPTY,
            losing: PostingList::EMPTY,
        };
        &EMPTY
    }

    /// Record for a champion; champions never seen get empty lists
    pub fn champion(&self, champion: Champion) -> &ChampionRecord {
        self.champions.get(&champion).unwrap_or(Self::empty())
    }

    pub fn champions(&self) -> impl Iterator<Item = (Champion, &ChampionRecord)> {
        self.champions.iter().map(|(c, r)| (*c, r))
    }

    pub fn universe(&self) -> &PostingList {
        &self.universe
    }

    /// Number of distinct matches indexed
    pub fn total(&self) -> usize {
        self.universe.len()
    }

    /// Unix milliseconds at which the builder finished
    pub fn built_at(&self) -> i64 {
        self.built_at
    }

    /// Games recorded for a champion (wins + losses)
    pub fn games_for(&self, champion: Champion) -> usize {
        self.champion(champion).games()
    }

    pub fn stats(&self) -> IndexStats {
        let postings = self
            .champions
            .values()
            .map(|r| r.winning.len() + r.losing.len())
            .sum();

        IndexStats {
            matches: self.universe.len(),
            champions: self.champions.len(),
            postings,
            built_at: self.built_at,
        }
    }

    /// Check every structural invariant of the index.
    ///
    /// Lists are ascending by construction; this verifies that no champion
    /// both won and lost the same match and that every list is covered by the
    /// universe.
    pub fn validate(&self) -> IndexResult<()> {
        for (champion, record) in &self.champions {
            if let Some(&match_id) = intersect(&record.winning, &record.losing).as_slice().first() {
                return Err(IndexError::OverlappingOutcome {
                    champion: *champion,
                    match_id,
                });
            }

            if !record.winning.is_subset_of(&self.universe)
                || !record.losing.is_subset_of(&self.universe)
            {
                return Err(IndexError::OutsideUniverse {
                    champion: *champion,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(ids: &[u32]) -> PostingList {
        PostingList::from_sorted(ids.to_vec()).unwrap()
    }

    fn thresh() -> Champion {
        Champion::from_name("thresh")
    }

    #[test]
    fn test_unknown_champion_gets_empty_record() {
        let index = MatchupIndex::default();
        let record = index.champion(thresh());
        assert!(record.winning.is_empty());
        assert!(record.losing.is_empty());
        assert_eq!(index.games_for(thresh()), 0);
    }

    #[test]
    fn test_records_borrow_from_owned_index() {
        fn lookup(index: &MatchupIndex, champion: Champion) -> &ChampionRecord {
            index.champion(champion)
        }

        let mut champions = BTreeMap::new();
        champions.insert(thresh(), ChampionRecord::new(list(&[1]), list(&[2])));
        let index = MatchupIndex::new(champions, list(&[1, 2]), 0).unwrap();

        assert_eq!(lookup(&index, thresh()).winning.as_slice(), &[1]);
        assert!(lookup(&index, Champion::from_name("annie")).losing.is_empty());
    }

    #[test]
    fn test_rejects_overlap() {
        let mut champions = BTreeMap::new();
        champions.insert(thresh(), ChampionRecord::new(list(&[1, 2]), list(&[2, 3])));

        let err = MatchupIndex::new(champions, list(&[1, 2, 3]), 0).unwrap_err();
        assert!(matches!(
            err,
            IndexError::OverlappingOutcome { match_id: 2, .. }
        ));
    }

    #[test]
    fn test_rejects_lists_outside_universe() {
        let mut champions = BTreeMap::new();
        champions.insert(thresh(), ChampionRecord::new(list(&[1, 9]), list(&[])));

        let err = MatchupIndex::new(champions, list(&[1, 2, 3]), 0).unwrap_err();
        assert!(matches!(err, IndexError::OutsideUniverse { .. }));
    }

    #[test]
    fn test_stats() {
        let mut champions = BTreeMap::new();
        champions.insert(thresh(), ChampionRecord::new(list(&[1, 3]), list(&[2])));
        champions.insert(
            Champion::from_name("annie"),
            ChampionRecord::new(list(&[2]), list(&[1, 3])),
        );

        let index = MatchupIndex::new(champions, list(&[1, 2, 3]), 42).unwrap();
        let stats = index.stats();
        assert_eq!(stats.matches, 3);
        assert_eq!(stats.champions, 2);
        assert_eq!(stats.postings, 6);
        assert_eq!(stats.built_at, 42);
        assert_eq!(index.games_for(thresh()), 3);
    }
}
