//! Identity and wire types
//!
//! Everything that crosses a crate boundary by name lives here: league and
//! client identifiers, session dates, sanitized player names, the scorer
//! sum type (with its reserved own-goal wire key) and knockout round labels.
//!
//! Payload normalization happens at construction: once a `PlayerName` or
//! `SessionDate` exists, downstream code never re-validates it.

use crate::error::{Error, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Reserved scorer key crediting a goal against the opposition rather than
/// to any player.
pub const OWN_GOAL_KEY: &str = "__ownGoal__";

// =============================================================================
// LeagueId
// =============================================================================

/// League identifier, doubling as the tenant subdomain label.
///
/// Format: 3–63 characters of `[a-z0-9-]`, not beginning or ending with `-`.
/// Reserved names are a directory concern and checked there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeagueId(String);

impl LeagueId {
    /// Validate and wrap a league id
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let ok_len = (3..=63).contains(&id.len());
        let ok_chars = id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        let ok_edges = !id.starts_with('-') && !id.ends_with('-');
        if !(ok_len && ok_chars && ok_edges) {
            return Err(Error::validation(format!("invalid league id: {id:?}")));
        }
        Ok(LeagueId(id))
    }

    /// The id as a path-safe string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeagueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// ClientId
// =============================================================================

/// Opaque per-browser client identifier (UUID-like, stable).
///
/// The exact shape is not enforced beyond being a short token of
/// `[0-9a-zA-Z-]`; the ownership binding hashes it anyway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Validate and wrap a client id
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let ok = (8..=64).contains(&id.len())
            && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !ok {
            return Err(Error::validation("invalid client id"));
        }
        Ok(ClientId(id))
    }

    /// The raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// SessionDate
// =============================================================================

/// Calendar date addressing one session document (`YYYY-MM-DD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionDate(NaiveDate);

impl SessionDate {
    /// Wrap an already-parsed date
    pub fn new(date: NaiveDate) -> Self {
        SessionDate(date)
    }

    /// Parse the canonical `YYYY-MM-DD` form; anything else is rejected
    pub fn parse(s: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| Error::validation(format!("invalid date: {s:?}")))?;
        // parse_from_str accepts unpadded fields; only the canonical
        // rendering addresses a file on disk.
        if date.format("%Y-%m-%d").to_string() != s {
            return Err(Error::validation(format!("invalid date: {s:?}")));
        }
        Ok(SessionDate(date))
    }

    /// The underlying date
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Year component
    pub fn year(&self) -> i32 {
        self.0.year()
    }
}

impl fmt::Display for SessionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for SessionDate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SessionDate::parse(s)
    }
}

impl Serialize for SessionDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SessionDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SessionDate::parse(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// PlayerName
// =============================================================================

/// Sanitized player name.
///
/// Sanitization trims, collapses internal whitespace and rejects anything
/// that is not a letter, digit, space, hyphen, apostrophe or dot. Names are
/// case-sensitive after sanitization; `"ann"` and `"Ann"` are two players.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerName(String);

/// Longest accepted player name, in characters
pub const MAX_PLAYER_NAME_CHARS: usize = 40;

impl PlayerName {
    /// Sanitize raw input into a player name
    pub fn sanitize(raw: &str) -> Result<Self> {
        let collapsed: String = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return Err(Error::validation("player name is empty"));
        }
        if collapsed.chars().count() > MAX_PLAYER_NAME_CHARS {
            return Err(Error::validation("player name too long"));
        }
        let safe = collapsed
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '\'' | '.'));
        if !safe {
            return Err(Error::validation(format!(
                "player name contains unsafe characters: {collapsed:?}"
            )));
        }
        Ok(PlayerName(collapsed))
    }

    /// The sanitized name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Scorer
// =============================================================================

/// Who a goal is credited to.
///
/// On the wire this is a map key: either a player name or the reserved
/// `"__ownGoal__"` sentinel. Internally the sentinel is a proper variant so
/// nothing downstream string-compares against it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scorer {
    /// Goal scored by a named player on the credited team
    Player(PlayerName),
    /// Goal conceded by the opposition (own goal)
    OwnGoal,
}

impl Scorer {
    /// Wire key for this scorer
    pub fn as_key(&self) -> &str {
        match self {
            Scorer::Player(name) => name.as_str(),
            Scorer::OwnGoal => OWN_GOAL_KEY,
        }
    }

    /// Parse a wire key back into a scorer
    pub fn from_key(key: &str) -> Result<Self> {
        if key == OWN_GOAL_KEY {
            Ok(Scorer::OwnGoal)
        } else {
            Ok(Scorer::Player(PlayerName::sanitize(key)?))
        }
    }
}

impl Serialize for Scorer {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_key())
    }
}

impl<'de> Deserialize<'de> for Scorer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Scorer::from_key(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// KnockoutRound
// =============================================================================

/// Knockout stage label, derived from the number of teams still in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnockoutRound {
    /// Early round with N teams remaining (N > 8)
    RoundOf(u32),
    /// Quarter-final (8 teams)
    Quarter,
    /// Semi-final (4 teams)
    Semi,
    /// Final (2 teams)
    Final,
    /// Decided champion entry
    Winner,
}

impl KnockoutRound {
    /// Label for a round with `slots` teams remaining
    pub fn for_slots(slots: usize) -> Self {
        match slots {
            2 => KnockoutRound::Final,
            4 => KnockoutRound::Semi,
            8 => KnockoutRound::Quarter,
            n => KnockoutRound::RoundOf(n as u32),
        }
    }

    /// Wire label (`round-of-16`, `quarter`, `semi`, `final`, `winner`)
    pub fn label(&self) -> String {
        match self {
            KnockoutRound::RoundOf(n) => format!("round-of-{n}"),
            KnockoutRound::Quarter => "quarter".to_string(),
            KnockoutRound::Semi => "semi".to_string(),
            KnockoutRound::Final => "final".to_string(),
            KnockoutRound::Winner => "winner".to_string(),
        }
    }

    /// Parse a wire label
    pub fn from_label(label: &str) -> Result<Self> {
        match label {
            "quarter" => Ok(KnockoutRound::Quarter),
            "semi" => Ok(KnockoutRound::Semi),
            "final" => Ok(KnockoutRound::Final),
            "winner" => Ok(KnockoutRound::Winner),
            other => {
                let n = other
                    .strip_prefix("round-of-")
                    .and_then(|n| n.parse::<u32>().ok())
                    .ok_or_else(|| {
                        Error::validation(format!("unknown knockout round: {other:?}"))
                    })?;
                Ok(KnockoutRound::RoundOf(n))
            }
        }
    }
}

impl fmt::Display for KnockoutRound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl Serialize for KnockoutRound {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

impl<'de> Deserialize<'de> for KnockoutRound {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        KnockoutRound::from_label(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_league_id_accepts_subdomain_shape() {
        assert!(LeagueId::new("sunday-league").is_ok());
        assert!(LeagueId::new("abc").is_ok());
        assert!(LeagueId::new("a2c").is_ok());
    }

    #[test]
    fn test_league_id_rejects_bad_shapes() {
        assert!(LeagueId::new("ab").is_err());
        assert!(LeagueId::new("-abc").is_err());
        assert!(LeagueId::new("abc-").is_err());
        assert!(LeagueId::new("Sunday").is_err());
        assert!(LeagueId::new("sun day").is_err());
        assert!(LeagueId::new("a".repeat(64)).is_err());
    }

    #[test]
    fn test_client_id_shapes() {
        assert!(ClientId::new("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(ClientId::new("short").is_err());
        assert!(ClientId::new("has space in it").is_err());
    }

    #[test]
    fn test_session_date_roundtrip() {
        let d = SessionDate::parse("2025-01-04").unwrap();
        assert_eq!(d.to_string(), "2025-01-04");
        assert_eq!(d.year(), 2025);
    }

    #[test]
    fn test_session_date_rejects_non_canonical() {
        assert!(SessionDate::parse("2025-1-4").is_err());
        assert!(SessionDate::parse("04-01-2025").is_err());
        assert!(SessionDate::parse("2025-01-04T10:00").is_err());
        assert!(SessionDate::parse("2025-02-30").is_err());
    }

    #[test]
    fn test_player_name_sanitization() {
        assert_eq!(
            PlayerName::sanitize("  Ann   Smith ").unwrap().as_str(),
            "Ann Smith"
        );
        assert_eq!(PlayerName::sanitize("O'Neil Jr.").unwrap().as_str(), "O'Neil Jr.");
        assert!(PlayerName::sanitize("").is_err());
        assert!(PlayerName::sanitize("   ").is_err());
        assert!(PlayerName::sanitize("<script>").is_err());
        assert!(PlayerName::sanitize("a&b").is_err());
        assert!(PlayerName::sanitize(&"x".repeat(41)).is_err());
    }

    #[test]
    fn test_player_name_case_sensitive() {
        let a = PlayerName::sanitize("ann").unwrap();
        let b = PlayerName::sanitize("Ann").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_scorer_wire_keys() {
        let own = Scorer::from_key(OWN_GOAL_KEY).unwrap();
        assert_eq!(own, Scorer::OwnGoal);
        assert_eq!(own.as_key(), "__ownGoal__");

        let player = Scorer::from_key("Ann").unwrap();
        assert_eq!(player.as_key(), "Ann");

        // The sentinel shape is reserved; arbitrary dunder names are not
        // valid player names.
        assert!(Scorer::from_key("__other__").is_err());
    }

    #[test]
    fn test_knockout_round_labels() {
        assert_eq!(KnockoutRound::for_slots(16).label(), "round-of-16");
        assert_eq!(KnockoutRound::for_slots(8).label(), "quarter");
        assert_eq!(KnockoutRound::for_slots(4).label(), "semi");
        assert_eq!(KnockoutRound::for_slots(2).label(), "final");
        assert_eq!(
            KnockoutRound::from_label("round-of-16").unwrap(),
            KnockoutRound::RoundOf(16)
        );
        assert_eq!(
            KnockoutRound::from_label("winner").unwrap(),
            KnockoutRound::Winner
        );
        assert!(KnockoutRound::from_label("eighth").is_err());
    }
}
