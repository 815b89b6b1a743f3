//! Knockout bracket
//!
//! Seeded single elimination. Standings seed a bracket of the next power
//! of two in standard bracket order (1 meets the lowest surviving seed in
//! the final, not the semi), missing opponents become round-1 byes for the
//! best seeds, and winners advance by bracket position.
//!
//! A drawn knockout match needs an explicit tiebreak (penalty) score; the
//! engine never invents one.

use crate::session::ScorerMap;
use matchday_core::error::{Error, Result};
use matchday_core::types::KnockoutRound;
use serde::{Deserialize, Serialize};

/// A knockout fixture between two survivors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnockoutMatch {
    /// Stage this match belongs to
    pub round: KnockoutRound,
    /// Better-seeded side
    pub home: String,
    /// Other side
    pub away: String,
    /// Home goals, `null` until recorded
    #[serde(default)]
    pub home_score: Option<u32>,
    /// Away goals, `null` until recorded
    #[serde(default)]
    pub away_score: Option<u32>,
    /// Home tiebreak score, only present after a drawn match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_penalties: Option<u32>,
    /// Away tiebreak score, only present after a drawn match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away_penalties: Option<u32>,
    /// Goal credits for the home side
    #[serde(default, skip_serializing_if = "ScorerMap::is_empty")]
    pub home_scorers: ScorerMap,
    /// Goal credits for the away side
    #[serde(default, skip_serializing_if = "ScorerMap::is_empty")]
    pub away_scorers: ScorerMap,
}

impl KnockoutMatch {
    /// A fresh fixture at a stage
    pub fn new(round: KnockoutRound, home: impl Into<String>, away: impl Into<String>) -> Self {
        KnockoutMatch {
            round,
            home: home.into(),
            away: away.into(),
            home_score: None,
            away_score: None,
            home_penalties: None,
            away_penalties: None,
            home_scorers: ScorerMap::new(),
            away_scorers: ScorerMap::new(),
        }
    }

    /// Winner of this match.
    ///
    /// `None` while scores are missing. A level score consults the
    /// tiebreak; a level or missing tiebreak is a `Conflict` because the
    /// bracket cannot advance through an undecided match.
    pub fn winner(&self) -> Result<Option<&str>> {
        let (Some(home), Some(away)) = (self.home_score, self.away_score) else {
            return Ok(None);
        };
        if home > away {
            return Ok(Some(&self.home));
        }
        if away > home {
            return Ok(Some(&self.away));
        }
        match (self.home_penalties, self.away_penalties) {
            (Some(h), Some(a)) if h > a => Ok(Some(&self.home)),
            (Some(h), Some(a)) if a > h => Ok(Some(&self.away)),
            _ => Err(Error::conflict(format!(
                "{} vs {} is level; a tiebreak score is required",
                self.home, self.away
            ))),
        }
    }
}

/// One entry of the knockout sub-document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KnockoutEntry {
    /// The decided champion
    Decided {
        /// Always [`KnockoutRound::Winner`]
        round: KnockoutRound,
        /// Champion team name
        winner: String,
    },
    /// A seed advancing without an opponent
    Bye {
        /// Stage the bye belongs to
        round: KnockoutRound,
        /// Team advancing for free
        bye: String,
    },
    /// A playable fixture
    Match(KnockoutMatch),
}

impl KnockoutEntry {
    /// Stage of this entry
    pub fn round(&self) -> KnockoutRound {
        match self {
            KnockoutEntry::Decided { round, .. } => *round,
            KnockoutEntry::Bye { round, .. } => *round,
            KnockoutEntry::Match(m) => m.round,
        }
    }

    /// The fixture, when this entry is playable
    pub fn as_match(&self) -> Option<&KnockoutMatch> {
        match self {
            KnockoutEntry::Match(m) => Some(m),
            _ => None,
        }
    }
}

/// Seeds in standard bracket order for a power-of-two size.
///
/// Size 8 yields `[1, 8, 4, 5, 2, 7, 3, 6]`: adjacent entries play each
/// other, and the structure keeps the top seeds apart until the end.
fn bracket_order(size: usize) -> Vec<usize> {
    debug_assert!(size.is_power_of_two());
    let mut order = vec![1usize];
    let mut round = 1;
    while order.len() < size {
        round *= 2;
        let mut next = Vec::with_capacity(round);
        for &seed in &order {
            next.push(seed);
            next.push(round + 1 - seed);
        }
        order = next;
    }
    order
}

/// Seed the opening round from ordered standings.
///
/// The bracket holds `2^⌈log2 n⌉` slots; seeds whose opponent slot is
/// beyond the field advance on a bye.
pub fn seed_bracket(standings: &[String]) -> Result<Vec<KnockoutEntry>> {
    let n = standings.len();
    if n < 2 {
        return Err(Error::validation("knockout needs at least two teams"));
    }
    let size = n.next_power_of_two();
    let round = KnockoutRound::for_slots(size);
    let order = bracket_order(size);

    let mut entries = Vec::with_capacity(size / 2);
    for pair in order.chunks(2) {
        let (high, low) = (pair[0].min(pair[1]), pair[0].max(pair[1]));
        let high_team = standings[high - 1].clone();
        match standings.get(low - 1) {
            Some(low_team) => {
                entries.push(KnockoutEntry::Match(KnockoutMatch::new(
                    round,
                    high_team,
                    low_team.clone(),
                )));
            }
            None => entries.push(KnockoutEntry::Bye {
                round,
                bye: high_team,
            }),
        }
    }
    Ok(entries)
}

/// Entries belonging to the latest stage of the bracket
pub fn current_round(entries: &[KnockoutEntry]) -> Option<(KnockoutRound, Vec<&KnockoutEntry>)> {
    let round = entries.last()?.round();
    let current = entries.iter().filter(|e| e.round() == round).collect();
    Some((round, current))
}

/// Build the next stage from a fully-decided current stage.
///
/// Winners pair by bracket position; a single survivor becomes the
/// `winner` entry. Advancing an incomplete or already-decided bracket is
/// a `Conflict`.
pub fn advance(entries: &[KnockoutEntry]) -> Result<Vec<KnockoutEntry>> {
    let Some((round, current)) = current_round(entries) else {
        return Err(Error::conflict("knockout bracket is empty"));
    };
    if round == KnockoutRound::Winner {
        return Err(Error::conflict("knockout bracket is already decided"));
    }

    let mut survivors = Vec::with_capacity(current.len());
    for entry in current {
        match entry {
            KnockoutEntry::Bye { bye, .. } => survivors.push(bye.clone()),
            KnockoutEntry::Match(m) => match m.winner()? {
                Some(winner) => survivors.push(winner.to_string()),
                None => {
                    return Err(Error::conflict(format!(
                        "{} vs {} has no result yet",
                        m.home, m.away
                    )))
                }
            },
            KnockoutEntry::Decided { .. } => {
                return Err(Error::conflict("knockout bracket is already decided"))
            }
        }
    }

    if survivors.len() == 1 {
        return Ok(vec![KnockoutEntry::Decided {
            round: KnockoutRound::Winner,
            winner: survivors.remove(0),
        }]);
    }

    let next_round = KnockoutRound::for_slots(survivors.len());
    Ok(survivors
        .chunks(2)
        .map(|pair| {
            KnockoutEntry::Match(KnockoutMatch::new(next_round, pair[0].clone(), pair[1].clone()))
        })
        .collect())
}

/// Validate recorded knockout entries against the session's teams.
///
/// Every named team must exist, sides pass the score/scorer checks, and
/// a tiebreak score may only accompany a played, level match.
pub fn validate_knockout_results(
    teams: &[crate::session::Team],
    entries: &[KnockoutEntry],
) -> Result<()> {
    let find = |name: &str| teams.iter().find(|t| t.name == name);
    for entry in entries {
        match entry {
            KnockoutEntry::Bye { bye, .. } => {
                if find(bye).is_none() {
                    return Err(Error::validation(format!("unknown team {bye:?}")));
                }
            }
            KnockoutEntry::Decided { winner, .. } => {
                if find(winner).is_none() {
                    return Err(Error::validation(format!("unknown team {winner:?}")));
                }
            }
            KnockoutEntry::Match(m) => {
                let (Some(home), Some(away)) = (find(&m.home), find(&m.away)) else {
                    return Err(Error::validation(format!(
                        "unknown team in {} vs {}",
                        m.home, m.away
                    )));
                };
                if m.home == m.away {
                    return Err(Error::validation(format!("{} plays itself", m.home)));
                }
                crate::session::validate_side(home, m.home_score, &m.home_scorers)?;
                crate::session::validate_side(away, m.away_score, &m.away_scorers)?;
                let has_penalties = m.home_penalties.is_some() || m.away_penalties.is_some();
                if has_penalties {
                    match (m.home_score, m.away_score) {
                        (Some(h), Some(a)) if h == a => {}
                        _ => {
                            return Err(Error::validation(format!(
                                "{} vs {}: tiebreak recorded without a level score",
                                m.home, m.away
                            )))
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
