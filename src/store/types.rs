//! Match record data model shared by every store

use crate::champion::Champion;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One participant on a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Riot champion id as recorded upstream (may be unknown to us)
    pub champion: u32,
    /// Upstream player identifier
    #[serde(default)]
    pub participant_id: u64,
}

impl Participant {
    pub fn new(champion: u32, participant_id: u64) -> Self {
        Self {
            champion,
            participant_id,
        }
    }

    /// Resolved champion, `Champion::UNKNOWN` if not in the table
    pub fn champion(&self) -> Champion {
        Champion::from_riot_id(self.champion)
    }
}

/// One side of a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub victory: bool,
    pub players: Vec<Participant>,
}

impl TeamRecord {
    pub fn new(victory: bool, players: Vec<Participant>) -> Self {
        Self { victory, players }
    }

    /// Convenience for tests and fixtures: one participant per champion id
    pub fn with_champions(victory: bool, champions: &[u32]) -> Self {
        Self {
            victory,
            players: champions
                .iter()
                .enumerate()
                .map(|(i, &c)| Participant::new(c, i as u64))
                .collect(),
        }
    }

    pub fn has_champion(&self, champion: Champion) -> bool {
        self.players.iter().any(|p| p.champion() == champion)
    }
}

/// A completed match as stored upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Opaque upstream identifier (large and sparse)
    pub record_id: u64,
    /// Start of the match, unix milliseconds
    #[serde(default)]
    pub timestamp: i64,
    pub teams: Vec<TeamRecord>,
}

impl MatchRecord {
    pub fn new(record_id: u64, timestamp: i64, teams: Vec<TeamRecord>) -> Self {
        Self {
            record_id,
            timestamp,
            teams,
        }
    }

    /// Calendar day (UTC) the match was played on
    pub fn played_on(&self) -> Option<NaiveDate> {
        DateTime::<Utc>::from_timestamp_millis(self.timestamp).map(|dt| dt.date_naive())
    }

    /// Date partition key in `YYYYMMDD` form
    pub fn quick_date(&self) -> Option<u32> {
        self.played_on().map(quick_date)
    }
}

/// `YYYYMMDD` partition key for a date
pub fn quick_date(date: NaiveDate) -> u32 {
    date.format("%Y%m%d")
        .to_string()
        .parse()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quick_date() {
        let record = MatchRecord::new(1, 1_400_000_000_000, vec![]);
        assert_eq!(record.quick_date(), Some(20140513));
        assert_eq!(
            record.played_on(),
            NaiveDate::from_ymd_opt(2014, 5, 13)
        );
    }

    #[test]
    fn test_participant_resolution() {
        let team = TeamRecord::with_champions(true, &[412, 46]);
        assert_eq!(team.players[0].champion().name(), "Thresh");
        assert_eq!(team.players[1].champion(), Champion::UNKNOWN);
        assert!(team.has_champion(Champion::from_name("thresh")));
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{"record_id": 99, "teams": [{"victory": true, "players": [{"champion": 1}]}]}"#;
        let record: MatchRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.record_id, 99);
        assert_eq!(record.timestamp, 0);
        assert_eq!(record.teams[0].players[0].participant_id, 0);
    }
}
