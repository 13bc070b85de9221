//! Record filters applied before a match is indexed
//!
//! A closed set of predicates; [`RecordFilter::accepts`] is the only
//! dispatcher. Builders keep a list and index a record only when every
//! filter accepts it.

use crate::champion::Champion;
use crate::store::MatchRecord;
use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFilter {
    /// Champion appears on any team
    ChampionPresent(Champion),
    /// Champion appears on a victorious team
    ChampionVictorious(Champion),
    /// Played on or after this UTC day
    PlayedOnOrAfter(NaiveDate),
    /// Played strictly before this UTC day
    PlayedBefore(NaiveDate),
    /// At least this many teams recorded
    MinTeams(usize),
}

impl RecordFilter {
    pub fn accepts(&self, record: &MatchRecord) -> bool {
        match self {
            RecordFilter::ChampionPresent(champion) => {
                record.teams.iter().any(|t| t.has_champion(*champion))
            }
            RecordFilter::ChampionVictorious(champion) => record
                .teams
                .iter()
                .any(|t| t.victory && t.has_champion(*champion)),
            RecordFilter::PlayedOnOrAfter(date) => {
                record.played_on().is_some_and(|played| played >= *date)
            }
            RecordFilter::PlayedBefore(date) => {
                record.played_on().is_some_and(|played| played < *date)
            }
            RecordFilter::MinTeams(n) => record.teams.len() >= *n,
        }
    }
}

impl fmt::Display for RecordFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordFilter::ChampionPresent(c) => write!(f, "champion {} present", c),
            RecordFilter::ChampionVictorious(c) => write!(f, "champion {} victorious", c),
            RecordFilter::PlayedOnOrAfter(d) => write!(f, "played on or after {}", d),
            RecordFilter::PlayedBefore(d) => write!(f, "played before {}", d),
            RecordFilter::MinTeams(n) => write!(f, "at least {} teams", n),
        }
    }
}
