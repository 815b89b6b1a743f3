//! Team generator
//!
//! Seeded generation drafts from ELO-banded pots: players sort by rating,
//! split into pots one team-slot wide, and each pot deals one player per
//! team. A bounded search shuffles within pots and keeps the candidate
//! with the best balance score:
//!
//! ```text
//! score = elo_delta + 5 · pairing_penalty
//! ```
//!
//! where `elo_delta` is the spread between the strongest and weakest team
//! average and `pairing_penalty` sums `f(count)` over all intra-team pairs
//! (`f(0) = −2`, `f(1) = −1`, `f(k) = k²` otherwise). Any pair that has
//! already played together three times rejects the whole candidate.
//!
//! Every run leaves a draw trace (pots snapshot plus ordered placements)
//! so the draw can be replayed visually without re-running the algorithm.

use crate::session::{DrawTrace, Placement, Team, TeammateHistory};
use chrono::{DateTime, Utc};
use matchday_core::error::{Error, Result};
use matchday_core::settings::{GenerationMethod, LeagueSettings};
use matchday_core::types::PlayerName;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

/// Rating assumed for players with no ELO record yet
pub const DEFAULT_ELO: f64 = 1000.0;

/// Weight of the pairing penalty against the ELO spread
pub const PAIRING_PENALTY_WEIGHT: f64 = 5.0;

/// Search budget when teammate history is supplied
pub const MAX_ITERATIONS: usize = 25;

/// Pair count at which a candidate is rejected outright
pub const HARD_PAIR_LIMIT: u32 = 3;

/// Fixed colour corpus; at least as many entries as `maxTeams` allows
pub const TEAM_COLOURS: [&str; 10] = [
    "red", "blue", "green", "yellow", "orange", "purple", "black", "white", "silver", "teal",
];

/// Fixed noun corpus for team names
pub const TEAM_NOUNS: [&str; 20] = [
    "lions", "wolves", "eagles", "sharks", "tigers", "bears", "falcons", "panthers", "cobras",
    "hawks", "foxes", "bulls", "dragons", "ravens", "stallions", "pumas", "vipers", "rhinos",
    "otters", "owls",
];

/// How many teams of which sizes to draw
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamConfig {
    /// Number of teams
    pub teams: usize,
    /// Slots per team, in team order
    pub team_sizes: Vec<usize>,
}

impl TeamConfig {
    /// Check the configuration against the eligible player count and
    /// league settings
    pub fn validate(&self, player_count: usize, settings: &LeagueSettings) -> Result<()> {
        if self.teams < 2 {
            return Err(Error::validation("need at least two teams"));
        }
        if self.teams > settings.max_teams || self.teams > TEAM_COLOURS.len() {
            return Err(Error::validation(format!(
                "{} teams exceeds the limit of {}",
                self.teams,
                settings.max_teams.min(TEAM_COLOURS.len())
            )));
        }
        if self.team_sizes.len() != self.teams {
            return Err(Error::validation("teamSizes length must match team count"));
        }
        if self.team_sizes.iter().any(|&s| s == 0) {
            return Err(Error::validation("empty team size"));
        }
        if let Some(&too_big) = self
            .team_sizes
            .iter()
            .find(|&&s| s > settings.max_players_per_team)
        {
            return Err(Error::validation(format!(
                "team size {too_big} exceeds maxPlayersPerTeam {}",
                settings.max_players_per_team
            )));
        }
        let total: usize = self.team_sizes.iter().sum();
        if total != player_count {
            return Err(Error::validation(format!(
                "teamSizes sum to {total} but {player_count} players are eligible"
            )));
        }
        Ok(())
    }
}

/// Valid `(teams, teamSizes)` splits for an eligible player count.
///
/// A split is offered when every team has at least three players and no
/// team exceeds `maxPlayersPerTeam`; sizes are as even as possible with
/// the larger teams first.
pub fn team_configurations(player_count: usize, settings: &LeagueSettings) -> Vec<TeamConfig> {
    let mut configs = Vec::new();
    let max_teams = settings.max_teams.min(TEAM_COLOURS.len());
    for teams in 2..=max_teams {
        if teams > player_count {
            break;
        }
        let base = player_count / teams;
        let remainder = player_count % teams;
        let sizes: Vec<usize> = (0..teams)
            .map(|i| if i < remainder { base + 1 } else { base })
            .collect();
        if sizes[sizes.len() - 1] >= 3 && sizes[0] <= settings.max_players_per_team {
            configs.push(TeamConfig {
                teams,
                team_sizes: sizes,
            });
        }
    }
    configs
}

/// Output of one draw
#[derive(Debug, Clone)]
pub struct GeneratedTeams {
    /// Named teams with every eligible player placed
    pub teams: Vec<Team>,
    /// Replayable record of the draw
    pub trace: DrawTrace,
}

/// Draw teams from the eligible players.
///
/// `elo` supplies ratings for players that have one; everyone else plays
/// at [`DEFAULT_ELO`]. `history` enables the iterative teammate-aware
/// search; passing `None` collapses the search to a single iteration.
pub fn generate(
    eligible: &[PlayerName],
    elo: &BTreeMap<PlayerName, f64>,
    history: Option<&TeammateHistory>,
    config: &TeamConfig,
    method: GenerationMethod,
    generated_at: DateTime<Utc>,
    rng: &mut impl Rng,
) -> Result<GeneratedTeams> {
    match method {
        GenerationMethod::Seeded => {
            generate_seeded(eligible, elo, history, config, generated_at, rng)
        }
        GenerationMethod::Random => generate_random(eligible, config, generated_at, rng),
    }
}

struct Candidate {
    pots: Vec<Vec<Option<PlayerName>>>,
    assignments: Vec<Vec<PlayerName>>,
    placements: Vec<(PlayerName, usize, usize)>, // (player, from_pot, to_team)
    score: f64,
    rejected: bool,
}

fn generate_seeded(
    eligible: &[PlayerName],
    elo: &BTreeMap<PlayerName, f64>,
    history: Option<&TeammateHistory>,
    config: &TeamConfig,
    generated_at: DateTime<Utc>,
    rng: &mut impl Rng,
) -> Result<GeneratedTeams> {
    let rating =
        |name: &PlayerName| -> f64 { elo.get(name).copied().unwrap_or(DEFAULT_ELO) };

    // stable sort: equal ratings keep arrival order
    let mut seeded: Vec<PlayerName> = eligible.to_vec();
    seeded.sort_by(|a, b| {
        rating(b)
            .partial_cmp(&rating(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // pots one team-slot wide, strongest band first, tail padded
    let pot_count = config.team_sizes.iter().copied().max().unwrap_or(0);
    let mut pots: Vec<Vec<Option<PlayerName>>> = Vec::with_capacity(pot_count);
    for pot_index in 0..pot_count {
        let pot: Vec<Option<PlayerName>> = (0..config.teams)
            .map(|i| seeded.get(pot_index * config.teams + i).cloned())
            .collect();
        pots.push(pot);
    }

    let iterations = if history.is_some() { MAX_ITERATIONS } else { 1 };
    let mut best: Option<Candidate> = None;
    let mut best_rejected: Option<Candidate> = None;

    for _ in 0..iterations {
        let mut drawn_pots = pots.clone();
        for pot in drawn_pots.iter_mut() {
            pot.shuffle(rng);
        }

        let candidate = draw_candidate(&drawn_pots, config, history, &rating);
        let slot = if candidate.rejected {
            &mut best_rejected
        } else {
            &mut best
        };
        // strict comparison keeps the earlier candidate on ties
        if slot.as_ref().map_or(true, |b| candidate.score < b.score) {
            *slot = Some(candidate);
        }
    }

    // every iteration tripped the hard pair limit: use the least bad draw
    let winner = best
        .or(best_rejected)
        .ok_or_else(|| Error::conflict("no draw candidate produced"))?;

    let names = draw_team_names(config.teams, rng);
    let teams: Vec<Team> = winner
        .assignments
        .iter()
        .zip(&names)
        .map(|(members, name)| Team {
            name: name.clone(),
            players: members.iter().cloned().map(Some).collect(),
        })
        .collect();

    let placements = winner
        .placements
        .iter()
        .map(|(player, from_pot, to_team)| Placement {
            player: player.clone(),
            from_pot: *from_pot,
            to_team: names[*to_team].clone(),
        })
        .collect();

    Ok(GeneratedTeams {
        teams,
        trace: DrawTrace {
            method: GenerationMethod::Seeded,
            initial_pots: winner.pots,
            placements,
            generated_at,
        },
    })
}

fn draw_candidate(
    pots: &[Vec<Option<PlayerName>>],
    config: &TeamConfig,
    history: Option<&TeammateHistory>,
    rating: &impl Fn(&PlayerName) -> f64,
) -> Candidate {
    let mut assignments: Vec<Vec<PlayerName>> = vec![Vec::new(); config.teams];
    let mut placements = Vec::new();

    for (pot_index, pot) in pots.iter().enumerate() {
        for (i, slot) in pot.iter().enumerate() {
            let Some(player) = slot else { continue };
            // i-th element goes to team i, skipping teams already filled
            // to their configured size
            let mut team = i % config.teams;
            let mut hops = 0;
            while assignments[team].len() >= config.team_sizes[team] {
                team = (team + 1) % config.teams;
                hops += 1;
                if hops > config.teams {
                    break;
                }
            }
            assignments[team].push(player.clone());
            placements.push((player.clone(), pot_index, team));
        }
    }

    let averages: Vec<f64> = assignments
        .iter()
        .map(|members| {
            if members.is_empty() {
                DEFAULT_ELO
            } else {
                members.iter().map(rating).sum::<f64>() / members.len() as f64
            }
        })
        .collect();
    let elo_delta = averages.iter().cloned().fold(f64::MIN, f64::max)
        - averages.iter().cloned().fold(f64::MAX, f64::min);

    let mut penalty = 0.0;
    let mut rejected = false;
    if let Some(history) = history {
        for members in &assignments {
            for a in 0..members.len() {
                for b in a + 1..members.len() {
                    let count = history.count(&members[a], &members[b]);
                    if count >= HARD_PAIR_LIMIT {
                        rejected = true;
                    }
                    penalty += pair_penalty(count);
                }
            }
        }
    }

    Candidate {
        pots: pots.to_vec(),
        assignments,
        placements,
        score: elo_delta + PAIRING_PENALTY_WEIGHT * penalty,
        rejected,
    }
}

fn pair_penalty(count: u32) -> f64 {
    match count {
        0 => -2.0,
        1 => -1.0,
        k => f64::from(k * k),
    }
}

fn generate_random(
    eligible: &[PlayerName],
    config: &TeamConfig,
    generated_at: DateTime<Utc>,
    rng: &mut impl Rng,
) -> Result<GeneratedTeams> {
    let mut pool: Vec<PlayerName> = eligible.to_vec();
    pool.shuffle(rng);

    let names = draw_team_names(config.teams, rng);
    let mut teams = Vec::with_capacity(config.teams);
    let mut placements = Vec::new();
    let mut cursor = 0;
    for (team_index, &size) in config.team_sizes.iter().enumerate() {
        let members = &pool[cursor..cursor + size];
        cursor += size;
        for player in members {
            placements.push(Placement {
                player: player.clone(),
                from_pot: 0,
                to_team: names[team_index].clone(),
            });
        }
        teams.push(Team {
            name: names[team_index].clone(),
            players: members.iter().cloned().map(Some).collect(),
        });
    }

    Ok(GeneratedTeams {
        teams,
        trace: DrawTrace {
            method: GenerationMethod::Random,
            initial_pots: vec![pool.into_iter().map(Some).collect()],
            placements,
            generated_at,
        },
    })
}

/// `teams` distinct `"<colour> <noun>"` names, colours and nouns both
/// sampled without replacement
fn draw_team_names(teams: usize, rng: &mut impl Rng) -> Vec<String> {
    let mut colours: Vec<&str> = TEAM_COLOURS.to_vec();
    let mut nouns: Vec<&str> = TEAM_NOUNS.to_vec();
    colours.shuffle(rng);
    nouns.shuffle(rng);
    colours
        .iter()
        .zip(nouns.iter())
        .take(teams)
        .map(|(colour, noun)| format!("{colour} {noun}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn name(s: &str) -> PlayerName {
        PlayerName::sanitize(s).unwrap()
    }

    fn players(n: usize) -> Vec<PlayerName> {
        (1..=n).map(|i| name(&format!("P{i}"))).collect()
    }

    /// ELOs spread evenly from 1200 down to 900
    fn spread_elo(players: &[PlayerName]) -> BTreeMap<PlayerName, f64> {
        let n = players.len();
        players
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let rating = 1200.0 - 300.0 * (i as f64) / ((n - 1) as f64);
                (p.clone(), rating)
            })
            .collect()
    }

    fn config(sizes: &[usize]) -> TeamConfig {
        TeamConfig {
            teams: sizes.len(),
            team_sizes: sizes.to_vec(),
        }
    }

    #[test]
    fn test_seeded_draw_respects_pots() {
        let eligible = players(12);
        let elo = spread_elo(&eligible);
        let history = TeammateHistory::default();
        let mut rng = StdRng::seed_from_u64(7);

        let generated = generate(
            &eligible,
            &elo,
            Some(&history),
            &config(&[4, 4, 4]),
            GenerationMethod::Seeded,
            Utc::now(),
            &mut rng,
        )
        .unwrap();

        assert_eq!(generated.teams.len(), 3);
        // every team holds exactly one player from each ELO band
        for band in 0..4 {
            let band_players: Vec<PlayerName> =
                (band * 3 + 1..=band * 3 + 3).map(|i| name(&format!("P{i}"))).collect();
            for team in &generated.teams {
                let from_band = team
                    .members()
                    .filter(|m| band_players.contains(m))
                    .count();
                assert_eq!(from_band, 1, "team {} band {band}", team.name);
            }
        }
    }

    #[test]
    fn test_seeded_draw_balances_averages() {
        let eligible = players(12);
        let elo = spread_elo(&eligible);
        let history = TeammateHistory::default();
        let mut rng = StdRng::seed_from_u64(42);

        let generated = generate(
            &eligible,
            &elo,
            Some(&history),
            &config(&[4, 4, 4]),
            GenerationMethod::Seeded,
            Utc::now(),
            &mut rng,
        )
        .unwrap();

        let averages: Vec<f64> = generated
            .teams
            .iter()
            .map(|t| t.members().map(|m| elo[m]).sum::<f64>() / 4.0)
            .collect();
        let delta = averages.iter().cloned().fold(f64::MIN, f64::max)
            - averages.iter().cloned().fold(f64::MAX, f64::min);
        assert!(delta <= 25.0, "elo delta {delta} too wide");
    }

    #[test]
    fn test_every_player_placed_exactly_once() {
        let eligible = players(10);
        let elo = spread_elo(&eligible);
        let mut rng = StdRng::seed_from_u64(3);

        let generated = generate(
            &eligible,
            &elo,
            Some(&TeammateHistory::default()),
            &config(&[4, 3, 3]),
            GenerationMethod::Seeded,
            Utc::now(),
            &mut rng,
        )
        .unwrap();

        let mut placed: Vec<&PlayerName> = generated
            .teams
            .iter()
            .flat_map(|t| t.members())
            .collect();
        placed.sort();
        let mut expected: Vec<&PlayerName> = eligible.iter().collect();
        expected.sort();
        assert_eq!(placed, expected);

        let sizes: Vec<usize> = generated.teams.iter().map(|t| t.players.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn test_search_avoids_repeated_pairs() {
        // P1 and P4 sit in different pots, so a naive draw may pair them;
        // their saturated history must push the search away from that.
        let eligible = players(6);
        let elo = spread_elo(&eligible);
        let mut history = TeammateHistory::default();
        history.record(&name("P1"), &name("P4"));
        history.record(&name("P1"), &name("P4"));
        history.record(&name("P1"), &name("P4"));

        let mut rng = StdRng::seed_from_u64(11);
        let generated = generate(
            &eligible,
            &elo,
            Some(&history),
            &config(&[3, 3]),
            GenerationMethod::Seeded,
            Utc::now(),
            &mut rng,
        )
        .unwrap();

        for team in &generated.teams {
            assert!(
                !(team.contains(&name("P1")) && team.contains(&name("P4"))),
                "saturated pair drafted together"
            );
        }
    }

    #[test]
    fn test_trace_replays_the_draw() {
        let eligible = players(8);
        let elo = spread_elo(&eligible);
        let mut rng = StdRng::seed_from_u64(5);

        let generated = generate(
            &eligible,
            &elo,
            Some(&TeammateHistory::default()),
            &config(&[4, 4]),
            GenerationMethod::Seeded,
            Utc::now(),
            &mut rng,
        )
        .unwrap();

        assert_eq!(generated.trace.placements.len(), 8);
        assert_eq!(generated.trace.initial_pots.len(), 4);

        // replaying the placements reconstructs the teams without
        // re-running the algorithm
        let mut rebuilt: BTreeMap<String, Vec<PlayerName>> = BTreeMap::new();
        for p in &generated.trace.placements {
            rebuilt.entry(p.to_team.clone()).or_default().push(p.player.clone());
        }
        for team in &generated.teams {
            let members: Vec<PlayerName> = team.members().cloned().collect();
            assert_eq!(rebuilt[&team.name], members);
        }
    }

    #[test]
    fn test_random_method_single_pot_trace() {
        let eligible = players(9);
        let mut rng = StdRng::seed_from_u64(1);
        let generated = generate(
            &eligible,
            &BTreeMap::new(),
            None,
            &config(&[3, 3, 3]),
            GenerationMethod::Random,
            Utc::now(),
            &mut rng,
        )
        .unwrap();

        assert_eq!(generated.trace.initial_pots.len(), 1);
        assert_eq!(generated.trace.initial_pots[0].len(), 9);
        assert_eq!(generated.teams.len(), 3);
        assert!(generated
            .trace
            .placements
            .iter()
            .all(|p| p.from_pot == 0));
    }

    #[test]
    fn test_team_names_distinct_colour_noun() {
        let mut rng = StdRng::seed_from_u64(2);
        let names = draw_team_names(6, &mut rng);
        assert_eq!(names.len(), 6);
        let colours: std::collections::BTreeSet<&str> =
            names.iter().map(|n| n.split(' ').next().unwrap()).collect();
        let nouns: std::collections::BTreeSet<&str> =
            names.iter().map(|n| n.split(' ').nth(1).unwrap()).collect();
        assert_eq!(colours.len(), 6);
        assert_eq!(nouns.len(), 6);
    }

    #[test]
    fn test_config_validation() {
        let settings = LeagueSettings::default();
        assert!(config(&[4, 4, 4]).validate(12, &settings).is_ok());
        assert!(config(&[4, 4]).validate(12, &settings).is_err()); // sum
        assert!(config(&[12]).validate(12, &settings).is_err()); // one team
        assert!(config(&[9, 3]).validate(12, &settings).is_err()); // size cap
        let mut tight = settings.clone();
        tight.max_teams = 2;
        assert!(config(&[4, 4, 4]).validate(12, &tight).is_err());
    }

    #[test]
    fn test_team_configurations_even_splits() {
        let settings = LeagueSettings::default();
        let configs = team_configurations(10, &settings);
        assert!(configs.contains(&config(&[5, 5])));
        assert!(configs.contains(&config(&[4, 3, 3])));
        // no config with a team under three players
        assert!(configs
            .iter()
            .all(|c| c.team_sizes.iter().all(|&s| s >= 3)));
    }
}
