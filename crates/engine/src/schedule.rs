//! Round-robin scheduler
//!
//! Anchor-rotation ("circle method") round robin. One team index stays
//! fixed while the remaining positions rotate by one each round; position
//! `i` plays position `n-1-i`. An odd team count gets a sentinel slot and
//! whoever draws it sits the round out.
//!
//! Home/away follows pair position: the first element of each pair is
//! home for the whole first leg, and the full schedule is that pass
//! followed by the same pass with home/away swapped, so every pair meets
//! exactly twice with opposite orientation.

use crate::session::{validate_side, Fixture, MatchEntry, Team};
use matchday_core::error::{Error, Result};
use rand::Rng;
use std::collections::BTreeSet;

/// Generate one single round robin: `n-1` rounds (`n` even) with the team
/// at `anchor` held in place.
pub fn generate_rounds(team_names: &[String], anchor: usize) -> Result<Vec<Vec<Fixture>>> {
    let teams = normalized_teams(team_names)?;
    if anchor >= teams.len() {
        return Err(Error::validation(format!(
            "anchor index {anchor} out of range for {} teams",
            teams.len()
        )));
    }

    let mut slots: Vec<Option<String>> = teams.into_iter().map(Some).collect();
    if slots.len() % 2 == 1 {
        slots.push(None); // sentinel: pairing with it is a bye
    }
    let n = slots.len();
    let rotating: Vec<usize> = (0..n).filter(|&i| i != anchor).collect();

    let mut rounds = Vec::with_capacity(n - 1);
    for _ in 0..n - 1 {
        let mut round = Vec::with_capacity(n / 2);
        for i in 0..n / 2 {
            let first = slots[i].clone();
            let second = slots[n - 1 - i].clone();
            match (first, second) {
                (Some(a), Some(b)) => {
                    // first element of the pair is home; the second leg
                    // reverses every fixture
                    round.push(Fixture::Match(MatchEntry::new(a, b)));
                }
                (Some(team), None) | (None, Some(team)) => {
                    round.push(Fixture::Bye { bye: team });
                }
                (None, None) => unreachable!("two sentinel slots"),
            }
        }
        rounds.push(round);

        // rotate every non-anchor position right by one
        let last = rotating.len() - 1;
        let carried = slots[rotating[last]].take();
        for idx in (1..=last).rev() {
            slots[rotating[idx]] = slots[rotating[idx - 1]].take();
        }
        slots[rotating[0]] = carried;
    }
    Ok(rounds)
}

/// A copy of the given rounds with home and away swapped and scores blank
pub fn swapped_pass(rounds: &[Vec<Fixture>]) -> Vec<Vec<Fixture>> {
    rounds
        .iter()
        .map(|round| {
            round
                .iter()
                .map(|fixture| match fixture {
                    Fixture::Match(m) => {
                        Fixture::Match(MatchEntry::new(m.away.clone(), m.home.clone()))
                    }
                    Fixture::Bye { bye } => Fixture::Bye { bye: bye.clone() },
                })
                .collect()
        })
        .collect()
}

/// Home/away double round robin: `2(n-1)` rounds, every pair meeting
/// exactly twice with opposite orientation.
pub fn generate_full_schedule(team_names: &[String], anchor: usize) -> Result<Vec<Vec<Fixture>>> {
    let mut rounds = generate_rounds(team_names, anchor)?;
    let second_leg = swapped_pass(&rounds);
    rounds.extend(second_leg);
    Ok(rounds)
}

/// Extra rounds to append to an existing schedule: the single pass rebuilt
/// and swapped, so appended fixtures reverse the previous orientation.
pub fn additional_rounds(team_names: &[String], anchor: usize) -> Result<Vec<Vec<Fixture>>> {
    Ok(swapped_pass(&generate_rounds(team_names, anchor)?))
}

/// Uniformly random anchor index for `team_count` teams
pub fn random_anchor(team_count: usize, rng: &mut impl Rng) -> usize {
    rng.gen_range(0..team_count.max(1))
}

/// Check a schedule against the session's team set.
///
/// Each round must hold exactly `⌈n/2⌉` entries, no team twice in one
/// round, no team playing itself, no unknown team names.
pub fn validate_rounds(rounds: &[Vec<Fixture>], team_names: &[String]) -> Result<()> {
    let teams = normalized_teams(team_names)?;
    let known: BTreeSet<&str> = teams.iter().map(String::as_str).collect();
    let per_round = (teams.len() + 1) / 2;

    for (index, round) in rounds.iter().enumerate() {
        if round.len() != per_round {
            return Err(Error::validation(format!(
                "round {index} has {} entries, expected {per_round}",
                round.len()
            )));
        }
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for fixture in round {
            let participants: Vec<&str> = match fixture {
                Fixture::Match(m) => {
                    if m.home == m.away {
                        return Err(Error::validation(format!(
                            "round {index}: {} plays itself",
                            m.home
                        )));
                    }
                    vec![m.home.as_str(), m.away.as_str()]
                }
                Fixture::Bye { bye } => vec![bye.as_str()],
            };
            for team in participants {
                if !known.contains(team) {
                    return Err(Error::validation(format!(
                        "round {index}: unknown team {team:?}"
                    )));
                }
                if !seen.insert(team) {
                    return Err(Error::validation(format!(
                        "round {index}: {team} appears twice"
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Validate recorded rounds against the session's teams: schedule shape
/// plus per-side score and scorer checks.
pub fn validate_results(teams: &[Team], rounds: &[Vec<Fixture>]) -> Result<()> {
    let names: Vec<String> = teams.iter().map(|t| t.name.clone()).collect();
    validate_rounds(rounds, &names)?;
    for entry in rounds.iter().flatten() {
        let Some(m) = entry.as_match() else { continue };
        let home = teams.iter().find(|t| t.name == m.home);
        let away = teams.iter().find(|t| t.name == m.away);
        // unknown names were already rejected by validate_rounds
        if let (Some(home), Some(away)) = (home, away) {
            validate_side(home, m.home_score, &m.home_scorers)?;
            validate_side(away, m.away_score, &m.away_scorers)?;
        }
    }
    Ok(())
}

// =============================================================================
// League table
// =============================================================================

/// One row of the league table
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    /// Team name
    pub team: String,
    /// Matches with both scores recorded
    pub played: u32,
    /// Wins
    pub won: u32,
    /// Draws
    pub drawn: u32,
    /// Losses
    pub lost: u32,
    /// Goals scored
    pub goals_for: u32,
    /// Goals conceded
    pub goals_against: u32,
    /// 3/1/0 points
    pub points: u32,
}

impl Standing {
    fn new(team: String) -> Self {
        Standing {
            team,
            played: 0,
            won: 0,
            drawn: 0,
            lost: 0,
            goals_for: 0,
            goals_against: 0,
            points: 0,
        }
    }

    /// Goal difference
    pub fn goal_difference(&self) -> i64 {
        i64::from(self.goals_for) - i64::from(self.goals_against)
    }
}

/// League table over the played matches of the given rounds.
///
/// Ties break on goal difference, then goals scored, then name.
pub fn league_standings(team_names: &[String], rounds: &[Vec<Fixture>]) -> Vec<Standing> {
    let mut table: Vec<Standing> = team_names
        .iter()
        .map(|t| Standing::new(t.clone()))
        .collect();

    fn apply(table: &mut [Standing], team: &str, scored: u32, conceded: u32) {
        if let Some(s) = table.iter_mut().find(|s| s.team == team) {
            s.played += 1;
            s.goals_for += scored;
            s.goals_against += conceded;
            match scored.cmp(&conceded) {
                std::cmp::Ordering::Greater => {
                    s.won += 1;
                    s.points += 3;
                }
                std::cmp::Ordering::Equal => {
                    s.drawn += 1;
                    s.points += 1;
                }
                std::cmp::Ordering::Less => s.lost += 1,
            }
        }
    }
    for entry in rounds.iter().flatten() {
        if let Some(m) = entry.as_match() {
            if let (Some(h), Some(a)) = (m.home_score, m.away_score) {
                apply(&mut table, &m.home, h, a);
                apply(&mut table, &m.away, a, h);
            }
        }
    }

    table.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(b.goal_difference().cmp(&a.goal_difference()))
            .then(b.goals_for.cmp(&a.goals_for))
            .then(a.team.cmp(&b.team))
    });
    table
}

fn normalized_teams(team_names: &[String]) -> Result<Vec<String>> {
    let teams: Vec<String> = team_names.iter().map(|t| t.trim().to_string()).collect();
    if teams.len() < 2 {
        return Err(Error::validation("need at least two teams"));
    }
    if teams.iter().any(String::is_empty) {
        return Err(Error::validation("empty team name"));
    }
    let distinct: BTreeSet<&str> = teams.iter().map(String::as_str).collect();
    if distinct.len() != teams.len() {
        return Err(Error::validation("duplicate team names"));
    }
    Ok(teams)
}
