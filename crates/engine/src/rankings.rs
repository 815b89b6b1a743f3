//! Ranking and ELO engine
//!
//! `recompute` is a deterministic replay: it reads every session file of
//! the requested year in date order and rebuilds the ranking document
//! from scratch. Nothing is edited in place, so the yearly file is a pure
//! function of the session archive plus the previous year's final ELO
//! snapshot.
//!
//! ## Points
//!
//! Per session a player on a team earns: 1 appearance point, 3/1/0 per
//! played league match, a standings bonus of 3/2/1 for the top three
//! teams, and knockout points by the furthest round reached
//! (quarter 1, semi 2, final 3, winner 5). `leagueWins` counts rank-1
//! finishes, `cupWins` counts knockout titles.
//!
//! ## Hybrid rating
//!
//! `weightedAverage = (points + C·globalAverage) / (appearances + C)`
//! pulls short records toward the league mean until a player has `C`
//! appearances (the confidence threshold).
//!
//! ## ELO
//!
//! Per played match every player moves against the opposing team's
//! average: `R += K·(S − E)`, `K = 24` for league and `15` for knockout
//! games. Ratings decay 2% toward 1000 per whole missed week, applied
//! lazily before a player's next match and topped up at recompute end.

use crate::knockout::KnockoutEntry;
use crate::schedule::league_standings;
use crate::session::{SessionDocument, Sessions};
use chrono::{DateTime, Utc};
use matchday_core::error::{Error, Result};
use matchday_core::types::{KnockoutRound, LeagueId, PlayerName, Scorer, SessionDate};
use matchday_storage::{DocumentName, JsonStore};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Baseline rating and the value decay pulls toward
pub const BASE_ELO: f64 = 1000.0;
/// K-factor for league matches
pub const LEAGUE_K: f64 = 24.0;
/// K-factor for knockout matches
pub const KNOCKOUT_K: f64 = 15.0;
/// Retained share of the delta from baseline per missed week
pub const WEEKLY_DECAY: f64 = 0.98;

/// Points for being on a team in a session
const APPEARANCE_POINTS: u32 = 1;
/// Points per league match: win / draw / loss
const MATCH_POINTS: [u32; 3] = [3, 1, 0];
/// Standings bonus for the top three teams of a session
const STANDINGS_BONUS: [u32; 3] = [3, 2, 1];

fn knockout_round_points(round: KnockoutRound) -> u32 {
    match round {
        KnockoutRound::Winner => 5,
        KnockoutRound::Final => 3,
        KnockoutRound::Semi => 2,
        KnockoutRound::Quarter => 1,
        KnockoutRound::RoundOf(_) => 0,
    }
}

fn round_order(round: KnockoutRound) -> u32 {
    match round {
        KnockoutRound::RoundOf(_) => 0,
        KnockoutRound::Quarter => 1,
        KnockoutRound::Semi => 2,
        KnockoutRound::Final => 3,
        KnockoutRound::Winner => 4,
    }
}

// =============================================================================
// Document model
// =============================================================================

/// A player's ELO state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EloState {
    /// Current rating
    pub rating: f64,
    /// Lifetime rated matches, carried across years
    pub games_played: u32,
    /// Date decay was last applied through
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_decay_at: Option<SessionDate>,
}

impl Default for EloState {
    fn default() -> Self {
        EloState {
            rating: BASE_ELO,
            games_played: 0,
            last_decay_at: None,
        }
    }
}

/// Per-session points breakdown
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RankingBreakdown {
    /// Appearance point
    pub appearance: u32,
    /// 3/1/0 match points
    pub match_points: u32,
    /// Standings bonus
    pub bonus_points: u32,
    /// Knockout points
    pub knockout_points: u32,
    /// Sum of the above
    pub total: u32,
}

/// One player's row in the yearly ranking document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerRanking {
    /// Total points this year
    pub points: u32,
    /// Sessions appeared in this year
    pub appearances: u32,
    /// Hybrid rating, rounded to one decimal
    pub ranking_points: f64,
    /// `points / appearances`
    pub raw_average: f64,
    /// Confidence-weighted average
    pub weighted_average: f64,
    /// True once appearances reach the confidence threshold
    pub has_full_confidence: bool,
    /// Appearances still missing for full confidence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub games_until_full_confidence: Option<u32>,
    /// Position in the year's table, 1-based
    pub rank: u32,
    /// Rank before the latest session minus current rank
    pub rank_movement: i32,
    /// Rank-1 session finishes
    pub league_wins: u32,
    /// Knockout titles
    pub cup_wins: u32,
    /// ELO state
    pub elo: EloState,
    /// Per-date breakdowns, keyed by session date
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub ranking_detail: BTreeMap<String, RankingBreakdown>,
}

/// League-wide figures the hybrid rating was computed with
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RankingMetadata {
    /// Mean points per appearance across all players
    pub global_average: f64,
    /// Appearances needed for full confidence
    pub confidence_threshold: u32,
}

/// The `rankings-YYYY.json` document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RankingsFile {
    /// One row per player seen this year (or carried over)
    pub players: BTreeMap<PlayerName, PlayerRanking>,
    /// Session dates the replay consumed, ascending
    pub calculated_dates: Vec<SessionDate>,
    /// Inputs of the hybrid rating
    pub ranking_metadata: RankingMetadata,
    /// When this document was recomputed
    pub last_updated: DateTime<Utc>,
    /// Unknown keys, preserved on write
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// Engine
// =============================================================================

/// Deterministic recomputation over the session archive
pub struct RankingEngine {
    store: Arc<JsonStore>,
    sessions: Sessions,
}

impl RankingEngine {
    /// Create the engine over the store
    pub fn new(store: Arc<JsonStore>, sessions: Sessions) -> Self {
        RankingEngine { store, sessions }
    }

    /// Load a year's ranking document
    pub fn load(&self, league: &LeagueId, year: i32) -> Result<RankingsFile> {
        self.store
            .read_typed(league, &DocumentName::Rankings(year))?
            .ok_or_else(|| Error::not_found(format!("rankings for {year}")))
    }

    /// Current ELO ratings for team generation: this year's document if it
    /// exists, else last year's carried ratings, else empty.
    pub fn elo_snapshot(&self, league: &LeagueId, year: i32) -> Result<BTreeMap<PlayerName, f64>> {
        for candidate in [year, year - 1] {
            if let Some(file) = self
                .store
                .read_typed::<RankingsFile>(league, &DocumentName::Rankings(candidate))?
            {
                return Ok(file
                    .players
                    .into_iter()
                    .map(|(name, p)| (name, p.elo.rating))
                    .collect());
            }
        }
        Ok(BTreeMap::new())
    }

    /// Rebuild `rankings-YYYY.json` from the year's session archive.
    ///
    /// The document is built in memory and written atomically under the
    /// rankings file mutex, which also serialises concurrent recomputes
    /// of the same `(league, year)`.
    pub fn recompute(
        &self,
        league: &LeagueId,
        year: i32,
        now: DateTime<Utc>,
    ) -> Result<RankingsFile> {
        let confidence = self.sessions.league_settings(league)?.confidence_threshold;
        let dates: Vec<SessionDate> = self
            .store
            .list_session_dates(league)?
            .into_iter()
            .filter(|d| d.year() == year)
            .collect();
        let carry_over: BTreeMap<PlayerName, EloState> = self
            .store
            .read_typed::<RankingsFile>(league, &DocumentName::Rankings(year - 1))?
            .map(|prev| {
                prev.players
                    .into_iter()
                    .map(|(name, p)| (name, p.elo))
                    .collect()
            })
            .unwrap_or_default();

        info!(league = %league, year, sessions = dates.len(), "recomputing rankings");

        let mut players = self.replay(league, &dates, &carry_over, confidence)?;

        // rank movement: compare against the table as it stood before the
        // latest session, so the document stays a pure function of the
        // archive
        if dates.len() > 1 {
            let before_last =
                self.replay(league, &dates[..dates.len() - 1], &carry_over, confidence)?;
            for (name, player) in players.iter_mut() {
                if let Some(previous) = before_last.get(name) {
                    if previous.appearances > 0 {
                        player.rank_movement = previous.rank as i32 - player.rank as i32;
                    }
                }
            }
        }

        let total_points: u32 = players.values().map(|p| p.points).sum();
        let total_appearances: u32 = players.values().map(|p| p.appearances).sum();
        let global_average = if total_appearances > 0 {
            f64::from(total_points) / f64::from(total_appearances)
        } else {
            0.0
        };

        let file = RankingsFile {
            players,
            calculated_dates: dates,
            ranking_metadata: RankingMetadata {
                global_average,
                confidence_threshold: confidence,
            },
            last_updated: now,
            extra: Map::new(),
        };

        let to_write = serde_json::to_value(&file)
            .map_err(|e| Error::io(format!("rankings serialization failed: {e}")))?;
        let Value::Object(map) = to_write else {
            return Err(Error::io("rankings document is not a JSON object"));
        };
        self.store
            .update(league, &DocumentName::Rankings(year), move |doc| {
                *doc = map;
                Ok(())
            })?;
        Ok(file)
    }

    /// Replay sessions chronologically into player rows
    fn replay(
        &self,
        league: &LeagueId,
        dates: &[SessionDate],
        carry_over: &BTreeMap<PlayerName, EloState>,
        confidence: u32,
    ) -> Result<BTreeMap<PlayerName, PlayerRanking>> {
        let mut players: BTreeMap<PlayerName, PlayerRanking> = carry_over
            .iter()
            .map(|(name, elo)| {
                let mut row = PlayerRanking::default();
                row.elo = elo.clone();
                (name.clone(), row)
            })
            .collect();

        for &date in dates {
            let session: SessionDocument = self
                .store
                .read_typed(league, &DocumentName::Session(date))?
                .unwrap_or_default();
            if session.teams.is_empty() {
                continue;
            }
            self.replay_session(&mut players, &session, date);
        }

        // catch-up decay for everyone who missed the tail of the year
        if let Some(&last) = dates.last() {
            for player in players.values_mut() {
                apply_decay(&mut player.elo, last);
            }
        }

        // hybrid rating and ranks
        let total_points: u32 = players.values().map(|p| p.points).sum();
        let total_appearances: u32 = players.values().map(|p| p.appearances).sum();
        let global_average = if total_appearances > 0 {
            f64::from(total_points) / f64::from(total_appearances)
        } else {
            0.0
        };
        for player in players.values_mut() {
            player.raw_average = if player.appearances > 0 {
                f64::from(player.points) / f64::from(player.appearances)
            } else {
                0.0
            };
            player.weighted_average = (f64::from(player.points)
                + f64::from(confidence) * global_average)
                / f64::from(player.appearances + confidence);
            player.ranking_points = round1(player.weighted_average);
            player.has_full_confidence = player.appearances >= confidence;
            player.games_until_full_confidence = if player.has_full_confidence {
                None
            } else {
                Some(confidence - player.appearances)
            };
        }

        let mut order: Vec<PlayerName> = players.keys().cloned().collect();
        order.sort_by(|a, b| {
            let pa = &players[a];
            let pb = &players[b];
            pb.ranking_points
                .partial_cmp(&pa.ranking_points)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(pb.appearances.cmp(&pa.appearances))
                .then(a.cmp(b))
        });
        for (index, name) in order.iter().enumerate() {
            if let Some(p) = players.get_mut(name) {
                p.rank = index as u32 + 1;
            }
        }
        Ok(players)
    }

    fn replay_session(
        &self,
        players: &mut BTreeMap<PlayerName, PlayerRanking>,
        session: &SessionDocument,
        date: SessionDate,
    ) {
        let rosters: BTreeMap<String, Vec<PlayerName>> = session
            .teams
            .iter()
            .map(|t| (t.name.clone(), t.members().cloned().collect()))
            .collect();

        // lazy decay before the day's matches
        for members in rosters.values() {
            for name in members {
                let row = players.entry(name.clone()).or_default();
                apply_decay(&mut row.elo, date);
            }
        }

        let mut day: BTreeMap<PlayerName, RankingBreakdown> = BTreeMap::new();
        for members in rosters.values() {
            for name in members {
                day.entry(name.clone()).or_default().appearance = APPEARANCE_POINTS;
            }
        }

        // league matches
        for fixture in session.games.rounds.iter().flatten() {
            let Some(m) = fixture.as_match() else { continue };
            let (Some(home_score), Some(away_score)) = (m.home_score, m.away_score) else {
                continue;
            };
            let (Some(home), Some(away)) = (rosters.get(&m.home), rosters.get(&m.away)) else {
                continue;
            };
            let (home_points, away_points) = match home_score.cmp(&away_score) {
                std::cmp::Ordering::Greater => (MATCH_POINTS[0], MATCH_POINTS[2]),
                std::cmp::Ordering::Equal => (MATCH_POINTS[1], MATCH_POINTS[1]),
                std::cmp::Ordering::Less => (MATCH_POINTS[2], MATCH_POINTS[0]),
            };
            for name in home {
                day.entry(name.clone()).or_default().match_points += home_points;
            }
            for name in away {
                day.entry(name.clone()).or_default().match_points += away_points;
            }
            let s_home = match home_score.cmp(&away_score) {
                std::cmp::Ordering::Greater => 1.0,
                std::cmp::Ordering::Equal => 0.5,
                std::cmp::Ordering::Less => 0.0,
            };
            elo_update(players, home, away, s_home, LEAGUE_K);
        }

        // standings bonus, only once results exist
        let team_names: Vec<String> = session.teams.iter().map(|t| t.name.clone()).collect();
        let table = league_standings(&team_names, &session.games.rounds);
        if table.iter().any(|s| s.played > 0) {
            for (index, standing) in table.iter().take(STANDINGS_BONUS.len()).enumerate() {
                let Some(members) = rosters.get(&standing.team) else { continue };
                for name in members {
                    let entry = day.entry(name.clone()).or_default();
                    entry.bonus_points += STANDINGS_BONUS[index];
                }
                if index == 0 {
                    for name in members {
                        players.entry(name.clone()).or_default().league_wins += 1;
                    }
                }
            }
        }

        // knockout matches move ELO at the cup K-factor
        let mut furthest: BTreeMap<String, KnockoutRound> = BTreeMap::new();
        for entry in &session.games.knockout {
            match entry {
                KnockoutEntry::Match(m) => {
                    for team in [&m.home, &m.away] {
                        bump_round(&mut furthest, team, m.round);
                    }
                    let (Some(home_score), Some(away_score)) = (m.home_score, m.away_score)
                    else {
                        continue;
                    };
                    let (Some(home), Some(away)) = (rosters.get(&m.home), rosters.get(&m.away))
                    else {
                        continue;
                    };
                    let s_home = match home_score.cmp(&away_score) {
                        std::cmp::Ordering::Greater => 1.0,
                        std::cmp::Ordering::Equal => 0.5,
                        std::cmp::Ordering::Less => 0.0,
                    };
                    elo_update(players, home, away, s_home, KNOCKOUT_K);
                }
                KnockoutEntry::Bye { round, bye } => bump_round(&mut furthest, bye, *round),
                KnockoutEntry::Decided { winner, .. } => {
                    bump_round(&mut furthest, winner, KnockoutRound::Winner);
                    if let Some(members) = rosters.get(winner) {
                        for name in members {
                            players.entry(name.clone()).or_default().cup_wins += 1;
                        }
                    }
                }
            }
        }
        for (team, round) in furthest {
            let Some(members) = rosters.get(&team) else { continue };
            let points = knockout_round_points(round);
            for name in members {
                day.entry(name.clone()).or_default().knockout_points += points;
            }
        }

        // fold the day into the year
        for (name, mut breakdown) in day {
            breakdown.total = breakdown.appearance
                + breakdown.match_points
                + breakdown.bonus_points
                + breakdown.knockout_points;
            let row = players.entry(name).or_default();
            row.points += breakdown.total;
            row.appearances += 1;
            row.ranking_detail.insert(date.to_string(), breakdown);
        }
        debug!(date = %date, "session replayed");
    }

    // =========================================================================
    // Queries over the archive
    // =========================================================================

    /// One player's row, with the breakdown trimmed to the most recent
    /// `limit` sessions
    pub fn player_detail(
        &self,
        league: &LeagueId,
        name: &PlayerName,
        year: i32,
        limit: Option<usize>,
    ) -> Result<PlayerRanking> {
        let file = self.load(league, year)?;
        let mut player = file
            .players
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("player {name} in {year} rankings")))?;
        if let Some(limit) = limit {
            let keep: Vec<String> = player
                .ranking_detail
                .keys()
                .rev()
                .take(limit)
                .cloned()
                .collect();
            player.ranking_detail.retain(|date, _| keep.contains(date));
        }
        Ok(player)
    }

    /// Winners of one year, or of every ranked year in order.
    ///
    /// Ties are concatenated, never deduplicated.
    pub fn champions(&self, league: &LeagueId, year: Option<i32>) -> Result<Vec<ChampionsEntry>> {
        let years = match year {
            Some(y) => vec![y],
            None => self.store.list_ranking_years(league)?,
        };
        let mut entries = Vec::new();
        for y in years {
            let file = self.load(league, y)?;
            let top_points = file
                .players
                .values()
                .filter(|p| p.appearances > 0)
                .map(|p| p.ranking_points)
                .fold(f64::MIN, f64::max);
            let league_champions: Vec<PlayerName> = file
                .players
                .iter()
                .filter(|(_, p)| p.appearances > 0 && p.ranking_points == top_points)
                .map(|(name, _)| name.clone())
                .collect();
            let top_cups = file.players.values().map(|p| p.cup_wins).max().unwrap_or(0);
            let cup_champions: Vec<PlayerName> = if top_cups == 0 {
                Vec::new()
            } else {
                file.players
                    .iter()
                    .filter(|(_, p)| p.cup_wins == top_cups)
                    .map(|(name, _)| name.clone())
                    .collect()
            };
            entries.push(ChampionsEntry {
                year: y,
                league_champions,
                cup_champions,
            });
        }
        Ok(entries)
    }

    /// Goal tallies from the session archive, own goals excluded.
    ///
    /// `year` filters to one season; `None` sweeps the whole archive.
    pub fn golden_boot(
        &self,
        league: &LeagueId,
        year: Option<i32>,
    ) -> Result<Vec<GoldenBootEntry>> {
        // tenant check
        self.sessions.league_settings(league)?;
        let mut goals: BTreeMap<PlayerName, u32> = BTreeMap::new();
        for date in self.store.list_session_dates(league)? {
            if let Some(y) = year {
                if date.year() != y {
                    continue;
                }
            }
            let session: SessionDocument = self
                .store
                .read_typed(league, &DocumentName::Session(date))?
                .unwrap_or_default();
            let mut tally = |scorers: &crate::session::ScorerMap| {
                for (scorer, count) in scorers {
                    if let Scorer::Player(name) = scorer {
                        *goals.entry(name.clone()).or_default() += count;
                    }
                }
            };
            for fixture in session.games.rounds.iter().flatten() {
                if let Some(m) = fixture.as_match() {
                    tally(&m.home_scorers);
                    tally(&m.away_scorers);
                }
            }
            for entry in &session.games.knockout {
                if let Some(m) = entry.as_match() {
                    tally(&m.home_scorers);
                    tally(&m.away_scorers);
                }
            }
        }
        let mut table: Vec<GoldenBootEntry> = goals
            .into_iter()
            .map(|(player, goals)| GoldenBootEntry { player, goals })
            .collect();
        table.sort_by(|a, b| b.goals.cmp(&a.goals).then(a.player.cmp(&b.player)));
        Ok(table)
    }

    /// Season summary for one year
    pub fn year_in_review(&self, league: &LeagueId, year: i32) -> Result<YearInReview> {
        self.sessions.league_settings(league)?;
        let mut review = YearInReview {
            year,
            ..Default::default()
        };
        let mut names: std::collections::BTreeSet<PlayerName> = Default::default();

        for date in self.store.list_session_dates(league)? {
            if date.year() != year {
                continue;
            }
            let session: SessionDocument = self
                .store
                .read_typed(league, &DocumentName::Session(date))?
                .unwrap_or_default();
            if session.teams.is_empty() {
                continue;
            }
            review.sessions += 1;
            for team in &session.teams {
                names.extend(team.members().cloned());
            }
            for fixture in session.games.rounds.iter().flatten() {
                let Some(m) = fixture.as_match() else { continue };
                let (Some(h), Some(a)) = (m.home_score, m.away_score) else { continue };
                review.goals += h + a;
                for scorers in [&m.home_scorers, &m.away_scorers] {
                    review.own_goals += scorers.get(&Scorer::OwnGoal).copied().unwrap_or(0);
                }
                let margin = h.abs_diff(a);
                let beats_record = review
                    .biggest_win
                    .as_ref()
                    .map_or(margin > 0, |b| margin > b.margin);
                if beats_record {
                    review.biggest_win = Some(BiggestWin {
                        date,
                        home: m.home.clone(),
                        away: m.away.clone(),
                        home_score: h,
                        away_score: a,
                        margin,
                    });
                }
            }
        }
        review.players = names.len() as u32;

        if let Ok(entries) = self.champions(league, Some(year)) {
            if let Some(entry) = entries.into_iter().next() {
                review.league_champions = entry.league_champions;
                review.cup_champions = entry.cup_champions;
            }
        }
        review.top_scorers = self
            .golden_boot(league, Some(year))?
            .into_iter()
            .take(3)
            .collect();
        Ok(review)
    }
}

/// Winners of one ranked year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChampionsEntry {
    /// Season year
    pub year: i32,
    /// Player(s) topping the ranking table
    pub league_champions: Vec<PlayerName>,
    /// Player(s) with the most knockout titles
    pub cup_champions: Vec<PlayerName>,
}

/// One row of the golden-boot table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldenBootEntry {
    /// Scorer
    pub player: PlayerName,
    /// Goals credited, own goals excluded
    pub goals: u32,
}

/// The widest winning margin of a season
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiggestWin {
    /// Session date
    pub date: SessionDate,
    /// Home team
    pub home: String,
    /// Away team
    pub away: String,
    /// Home goals
    pub home_score: u32,
    /// Away goals
    pub away_score: u32,
    /// Winning margin
    pub margin: u32,
}

/// Season summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YearInReview {
    /// Season year
    pub year: i32,
    /// Sessions with teams
    pub sessions: u32,
    /// Distinct players who made a team
    pub players: u32,
    /// Goals in played league matches
    pub goals: u32,
    /// Own goals among them
    pub own_goals: u32,
    /// Widest winning margin
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biggest_win: Option<BiggestWin>,
    /// Ranking table winners
    pub league_champions: Vec<PlayerName>,
    /// Knockout title holders
    pub cup_champions: Vec<PlayerName>,
    /// Top of the golden-boot table
    pub top_scorers: Vec<GoldenBootEntry>,
}

// =============================================================================
// ELO arithmetic
// =============================================================================

/// Expected score of a player rated `rating` against an opposing team
/// averaging `opponent_avg`
fn expected_score(rating: f64, opponent_avg: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent_avg - rating) / 400.0))
}

/// Move every player on both sides against the opposing team average
fn elo_update(
    players: &mut BTreeMap<PlayerName, PlayerRanking>,
    home: &[PlayerName],
    away: &[PlayerName],
    s_home: f64,
    k: f64,
) {
    if home.is_empty() || away.is_empty() {
        return;
    }
    let average = |members: &[PlayerName], players: &BTreeMap<PlayerName, PlayerRanking>| {
        members
            .iter()
            .map(|n| players.get(n).map_or(BASE_ELO, |p| p.elo.rating))
            .sum::<f64>()
            / members.len() as f64
    };
    // snapshot both averages before anyone moves
    let home_avg = average(home, players);
    let away_avg = average(away, players);

    for name in home {
        let row = players.entry(name.clone()).or_default();
        let expected = expected_score(row.elo.rating, away_avg);
        row.elo.rating += k * (s_home - expected);
        row.elo.games_played += 1;
    }
    for name in away {
        let row = players.entry(name.clone()).or_default();
        let expected = expected_score(row.elo.rating, home_avg);
        row.elo.rating += k * ((1.0 - s_home) - expected);
        row.elo.games_played += 1;
    }
}

/// Lazy weekly decay.
///
/// A whole-week step: `missed = max(0, gap_days/7 − 1)`, so a regular
/// weekly cadence never decays. The anchor date moves to the session the
/// decay was applied for.
fn apply_decay(elo: &mut EloState, date: SessionDate) {
    let last = match elo.last_decay_at {
        Some(last) if last < date => last,
        Some(_) => return,
        None => {
            elo.last_decay_at = Some(date);
            return;
        }
    };
    let gap_days = (date.date() - last.date()).num_days();
    let missed_weeks = (gap_days / 7 - 1).max(0);
    if missed_weeks > 0 {
        let delta = elo.rating - BASE_ELO;
        elo.rating = BASE_ELO + delta * WEEKLY_DECAY.powi(missed_weeks as i32);
    }
    elo.last_decay_at = Some(date);
}

fn bump_round(furthest: &mut BTreeMap<String, KnockoutRound>, team: &str, round: KnockoutRound) {
    furthest
        .entry(team.to_string())
        .and_modify(|current| {
            if round_order(round) > round_order(*current) {
                *current = round;
            }
        })
        .or_insert(round);
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
