//! Champion identifiers
//!
//! Champions are identified by their Riot numeric id. Anything outside the
//! known table resolves to [`Champion::UNKNOWN`], which is never valid in a
//! query and never indexed.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// A playable character, keyed by Riot champion id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Champion(u16);

/// Known champions as (riot id, display name)
const CHAMPIONS: &[(u16, &str)] = &[
    (1, "Annie"),
    (2, "Olaf"),
    (3, "Galio"),
    (4, "Twisted Fate"),
    (5, "Xin Zhao"),
    (6, "Urgot"),
    (7, "LeBlanc"),
    (8, "Vladimir"),
    (9, "Fiddlesticks"),
    (10, "Kayle"),
    (11, "Master Yi"),
    (12, "Alistar"),
    (13, "Ryze"),
    (14, "Sion"),
    (15, "Sivir"),
    (16, "Soraka"),
    (17, "Teemo"),
    (18, "Tristana"),
    (19, "Warwick"),
    (20, "Nunu"),
    (21, "Miss Fortune"),
    (22, "Ashe"),
    (23, "Tryndamere"),
    (24, "Jax"),
    (25, "Morgana"),
    (26, "Zilean"),
    (27, "Singed"),
    (28, "Evelynn"),
    (29, "Twitch"),
    (30, "Karthus"),
    (31, "Cho'Gath"),
    (32, "Amumu"),
    (33, "Rammus"),
    (34, "Anivia"),
    (35, "Shaco"),
    (36, "Dr. Mundo"),
    (37, "Sona"),
    (38, "Kassadin"),
    (39, "Irelia"),
    (40, "Janna"),
    (41, "Gangplank"),
    (42, "Corki"),
    (43, "Karma"),
    (44, "Taric"),
    (45, "Veigar"),
    (48, "Trundle"),
    (50, "Swain"),
    (51, "Caitlyn"),
    (53, "Blitzcrank"),
    (54, "Malphite"),
    (55, "Katarina"),
    (56, "Nocturne"),
    (57, "Maokai"),
    (58, "Renekton"),
    (59, "Jarvan IV"),
    (60, "Elise"),
    (61, "Orianna"),
    (62, "Wukong"),
    (63, "Brand"),
    (64, "Lee Sin"),
    (67, "Vayne"),
    (68, "Rumble"),
    (69, "Cassiopeia"),
    (72, "Skarner"),
    (74, "Heimerdinger"),
    (75, "Nasus"),
    (76, "Nidalee"),
    (77, "Udyr"),
    (78, "Poppy"),
    (79, "Gragas"),
    (80, "Pantheon"),
    (81, "Ezreal"),
    (82, "Mordekaiser"),
    (83, "Yorick"),
    (84, "Akali"),
    (85, "Kennen"),
    (86, "Garen"),
    (89, "Leona"),
    (90, "Malzahar"),
    (91, "Talon"),
    (92, "Riven"),
    (96, "Kog'Maw"),
    (98, "Shen"),
    (99, "Lux"),
    (101, "Xerath"),
    (102, "Shyvana"),
    (103, "Ahri"),
    (104, "Graves"),
    (105, "Fizz"),
    (106, "Volibear"),
    (107, "Rengar"),
    (110, "Varus"),
    (111, "Nautilus"),
    (112, "Viktor"),
    (113, "Sejuani"),
    (114, "Fiora"),
    (115, "Ziggs"),
    (117, "Lulu"),
    (119, "Draven"),
    (120, "Hecarim"),
    (121, "Kha'Zix"),
    (122, "Darius"),
    (126, "Jayce"),
    (127, "Lissandra"),
    (131, "Diana"),
    (133, "Quinn"),
    (134, "Syndra"),
    (143, "Zyra"),
    (154, "Zac"),
    (157, "Yasuo"),
    (161, "Vel'Koz"),
    (201, "Braum"),
    (222, "Jinx"),
    (236, "Lucian"),
    (238, "Zed"),
    (254, "Vi"),
    (266, "Aatrox"),
    (267, "Nami"),
    (412, "Thresh"),
];

impl Champion {
    /// Sentinel for ids that are not in the known table
    pub const UNKNOWN: Champion = Champion(0);

    /// Resolve a Riot champion id. Unknown ids map to [`Champion::UNKNOWN`].
    pub fn from_riot_id(id: u32) -> Self {
        match u16::try_from(id) {
            Ok(id) if Self::position(id).is_some() => Champion(id),
            _ => Self::UNKNOWN,
        }
    }

    /// Resolve a champion from a user-supplied name.
    ///
    /// Matching ignores case and anything that is not a letter or digit, so
    /// `"twisted_fate"`, `"Twisted Fate"` and `"TWISTEDFATE"` are equivalent.
    pub fn from_name(name: &str) -> Self {
        let wanted = squash(name);
        if wanted.is_empty() {
            return Self::UNKNOWN;
        }

        CHAMPIONS
            .iter()
            .find(|(_, display)| squash(display) == wanted)
            .map(|(id, _)| Champion(*id))
            .unwrap_or(Self::UNKNOWN)
    }

    /// Every known champion, ordered by id
    pub fn all() -> impl Iterator<Item = Champion> {
        CHAMPIONS.iter().map(|(id, _)| Champion(*id))
    }

    pub fn id(self) -> u16 {
        self.0
    }

    pub fn is_known(self) -> bool {
        self != Self::UNKNOWN && Self::position(self.0).is_some()
    }

    /// Display name, or `"Unknown"`
    pub fn name(self) -> &'static str {
        Self::position(self.0)
            .map(|idx| CHAMPIONS[idx].1)
            .unwrap_or("Unknown")
    }

    /// Lowercase, underscore-separated name used by front ends in URLs
    pub fn shortname(self) -> String {
        static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
        let re = NON_ALNUM.get_or_init(|| {
            Regex::new("[^A-Za-z0-9 ]+").expect("static champion name pattern")
        });

        re.replace_all(self.name(), "")
            .replace(' ', "_")
            .to_lowercase()
    }

    fn position(id: u16) -> Option<usize> {
        CHAMPIONS.binary_search_by_key(&id, |(cid, _)| *cid).ok()
    }
}

impl fmt::Display for Champion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn squash(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_sorted() {
        assert!(CHAMPIONS.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_from_riot_id() {
        assert_eq!(Champion::from_riot_id(412).name(), "Thresh");
        assert_eq!(Champion::from_riot_id(46), Champion::UNKNOWN);
        assert_eq!(Champion::from_riot_id(0), Champion::UNKNOWN);
        assert_eq!(Champion::from_riot_id(70_000), Champion::UNKNOWN);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Champion::from_name("thresh").id(), 412);
        assert_eq!(Champion::from_name("twisted_fate").id(), 4);
        assert_eq!(Champion::from_name("Kha'Zix").id(), 121);
        assert_eq!(Champion::from_name("khazix").id(), 121);
        assert_eq!(Champion::from_name("nobody"), Champion::UNKNOWN);
        assert_eq!(Champion::from_name(""), Champion::UNKNOWN);
    }

    #[test]
    fn test_shortname() {
        assert_eq!(Champion::from_riot_id(36).shortname(), "dr_mundo");
        assert_eq!(Champion::from_riot_id(161).shortname(), "velkoz");
        assert_eq!(Champion::from_riot_id(59).shortname(), "jarvan_iv");
    }

    #[test]
    fn test_unknown_is_not_known() {
        assert!(!Champion::UNKNOWN.is_known());
        assert!(Champion::from_riot_id(1).is_known());
        assert_eq!(Champion::UNKNOWN.to_string(), "Unknown");
    }
}
