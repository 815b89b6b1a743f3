//! Session document model
//!
//! A session is the addressable unit for all per-day operations: player
//! lists, teams, league games, knockout bracket, settings overlay, draw
//! history, teammate history and ownership bindings, all in one JSON
//! document keyed by date.
//!
//! The serde model mirrors the wire shape exactly (camelCase keys, the
//! `__ownGoal__` scorer sentinel, nullable team slots). Unknown top-level
//! keys ride along in a flattened map so a newer writer never destroys
//! data an older reader did not understand.

use chrono::{DateTime, Utc};
use matchday_core::error::{Error, Result};
use matchday_core::settings::{GenerationMethod, LeagueSettings, SettingsPatch};
use matchday_core::types::{LeagueId, PlayerName, Scorer, SessionDate};
use matchday_storage::{DocumentName, JsonStore};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::knockout::KnockoutEntry;

/// Goal tally per scorer; the own-goal sentinel is a real key
pub type ScorerMap = BTreeMap<Scorer, u32>;

/// Highest score a recorded match may carry
pub const MAX_GOALS: u32 = 99;

/// Own-goal credits allowed per side per match
pub const MAX_OWN_GOALS: u32 = 2;

/// Check one side's recorded score and scorer credits against its roster.
///
/// Scores are capped at [`MAX_GOALS`], scorer credits must not exceed the
/// recorded score, every named scorer must be on the team, and own goals
/// are capped at [`MAX_OWN_GOALS`].
pub fn validate_side(team: &Team, score: Option<u32>, scorers: &ScorerMap) -> Result<()> {
    if let Some(score) = score {
        if score > MAX_GOALS {
            return Err(Error::validation(format!(
                "score {score} for {} is out of range",
                team.name
            )));
        }
    }
    if scorers.is_empty() {
        return Ok(());
    }
    let Some(score) = score else {
        return Err(Error::validation(format!(
            "{} has scorers but no recorded score",
            team.name
        )));
    };
    let credited: u32 = scorers.values().sum();
    if credited > score {
        return Err(Error::validation(format!(
            "{} credits {credited} goals but scored {score}",
            team.name
        )));
    }
    for (scorer, count) in scorers {
        match scorer {
            Scorer::OwnGoal => {
                if *count > MAX_OWN_GOALS {
                    return Err(Error::validation(format!(
                        "{} records {count} own goals (limit {MAX_OWN_GOALS})",
                        team.name
                    )));
                }
            }
            Scorer::Player(name) => {
                if !team.contains(name) {
                    return Err(Error::validation(format!(
                        "scorer {name} is not on {}",
                        team.name
                    )));
                }
            }
        }
    }
    Ok(())
}

// =============================================================================
// Player lists
// =============================================================================

/// Which of the two ordered player lists is meant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListKind {
    /// Players with a confirmed spot, capped at `playerLimit`
    Available,
    /// Overflow queue, in arrival order
    WaitingList,
}

/// The two ordered, disjoint player lists of a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerLists {
    /// Confirmed players, in arrival order
    pub available: Vec<PlayerName>,
    /// Waiting players, in arrival order
    pub waiting_list: Vec<PlayerName>,
}

impl PlayerLists {
    /// The list for a kind
    pub fn list(&self, kind: ListKind) -> &Vec<PlayerName> {
        match kind {
            ListKind::Available => &self.available,
            ListKind::WaitingList => &self.waiting_list,
        }
    }

    /// Mutable list for a kind
    pub fn list_mut(&mut self, kind: ListKind) -> &mut Vec<PlayerName> {
        match kind {
            ListKind::Available => &mut self.available,
            ListKind::WaitingList => &mut self.waiting_list,
        }
    }

    /// Which list holds the player, if any
    pub fn find(&self, name: &PlayerName) -> Option<ListKind> {
        if self.available.contains(name) {
            Some(ListKind::Available)
        } else if self.waiting_list.contains(name) {
            Some(ListKind::WaitingList)
        } else {
            None
        }
    }

    /// True when the player is on either list
    pub fn contains(&self, name: &PlayerName) -> bool {
        self.find(name).is_some()
    }
}

// =============================================================================
// Teams and fixtures
// =============================================================================

/// One drawn team: a `"<colour> <noun>"` name and slots holding player
/// names or `null` for an empty slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    /// Display name, e.g. `"red lions"`
    pub name: String,
    /// Player slots; `None` is an open slot
    pub players: Vec<Option<PlayerName>>,
}

impl Team {
    /// Names currently occupying slots
    pub fn members(&self) -> impl Iterator<Item = &PlayerName> {
        self.players.iter().flatten()
    }

    /// Index of the first open slot
    pub fn open_slot(&self) -> Option<usize> {
        self.players.iter().position(|slot| slot.is_none())
    }

    /// True when the player occupies a slot
    pub fn contains(&self, name: &PlayerName) -> bool {
        self.members().any(|m| m == name)
    }
}

/// Result of a played match, from the home side's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Home side scored more
    HomeWin,
    /// Away side scored more
    AwayWin,
    /// Level score
    Draw,
}

/// A league fixture between two teams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEntry {
    /// Home team name
    pub home: String,
    /// Away team name
    pub away: String,
    /// Home goals, `null` until recorded
    #[serde(default)]
    pub home_score: Option<u32>,
    /// Away goals, `null` until recorded
    #[serde(default)]
    pub away_score: Option<u32>,
    /// Goal credits for the home side
    #[serde(default, skip_serializing_if = "ScorerMap::is_empty")]
    pub home_scorers: ScorerMap,
    /// Goal credits for the away side
    #[serde(default, skip_serializing_if = "ScorerMap::is_empty")]
    pub away_scorers: ScorerMap,
}

impl MatchEntry {
    /// A fresh unplayed fixture
    pub fn new(home: impl Into<String>, away: impl Into<String>) -> Self {
        MatchEntry {
            home: home.into(),
            away: away.into(),
            home_score: None,
            away_score: None,
            home_scorers: ScorerMap::new(),
            away_scorers: ScorerMap::new(),
        }
    }

    /// True once both scores are recorded
    pub fn is_played(&self) -> bool {
        self.home_score.is_some() && self.away_score.is_some()
    }

    /// Outcome when played
    pub fn outcome(&self) -> Option<MatchOutcome> {
        match (self.home_score?, self.away_score?) {
            (h, a) if h > a => Some(MatchOutcome::HomeWin),
            (h, a) if h < a => Some(MatchOutcome::AwayWin),
            _ => Some(MatchOutcome::Draw),
        }
    }
}

/// One entry of a league round: a playable match or a bye
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fixture {
    /// A team sitting this round out
    Bye {
        /// The resting team's name
        bye: String,
    },
    /// A playable match
    Match(MatchEntry),
}

impl Fixture {
    /// The match, unless this is a bye
    pub fn as_match(&self) -> Option<&MatchEntry> {
        match self {
            Fixture::Match(m) => Some(m),
            Fixture::Bye { .. } => None,
        }
    }

    /// Mutable match access
    pub fn as_match_mut(&mut self) -> Option<&mut MatchEntry> {
        match self {
            Fixture::Match(m) => Some(m),
            Fixture::Bye { .. } => None,
        }
    }
}

/// The games sub-document: league rounds plus the knockout bracket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Games {
    /// League rounds in play order
    pub rounds: Vec<Vec<Fixture>>,
    /// Knockout bracket entries in generation order
    pub knockout: Vec<KnockoutEntry>,
}

impl Games {
    /// True when no games exist yet
    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty() && self.knockout.is_empty()
    }
}

// =============================================================================
// Draw history and teammate history
// =============================================================================

/// One placement of the draw, in the order placements occurred
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    /// Who was placed
    pub player: PlayerName,
    /// Index of the pot the player was drawn from
    pub from_pot: usize,
    /// Team name the player landed on
    pub to_team: String,
}

/// Replayable record of one team draw.
///
/// Pure metadata for later visualization; replaying it never re-executes
/// the algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawTrace {
    /// Strategy that produced the draw
    pub method: GenerationMethod,
    /// Pot contents before any placement; `null` entries are padding
    pub initial_pots: Vec<Vec<Option<PlayerName>>>,
    /// Every placement, in order
    pub placements: Vec<Placement>,
    /// When the draw ran
    pub generated_at: DateTime<Utc>,
}

/// Symmetric pair counts of how often two players shared a team.
///
/// Both directions are stored so the wire shape matches a plain nested
/// object lookup; [`TeammateHistory::record`] keeps them in step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeammateHistory(pub BTreeMap<PlayerName, BTreeMap<PlayerName, u32>>);

impl TeammateHistory {
    /// Times `a` and `b` were teammates
    pub fn count(&self, a: &PlayerName, b: &PlayerName) -> u32 {
        self.0
            .get(a)
            .and_then(|inner| inner.get(b))
            .copied()
            .unwrap_or(0)
    }

    /// Record one shared session for the pair
    pub fn record(&mut self, a: &PlayerName, b: &PlayerName) {
        if a == b {
            return;
        }
        *self
            .0
            .entry(a.clone())
            .or_default()
            .entry(b.clone())
            .or_default() += 1;
        *self
            .0
            .entry(b.clone())
            .or_default()
            .entry(a.clone())
            .or_default() += 1;
    }

    /// True when no pair has history
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// The session document
// =============================================================================

/// Canonical per-day record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionDocument {
    /// The two ordered player lists
    pub players: PlayerLists,
    /// Drawn teams, empty until a draw ran
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub teams: Vec<Team>,
    /// League rounds and knockout bracket
    #[serde(skip_serializing_if = "Games::is_empty")]
    pub games: Games,
    /// Session-level settings overlay
    #[serde(skip_serializing_if = "SettingsPatch::is_empty")]
    pub settings: SettingsPatch,
    /// One trace per draw that ran on this session
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub draw_history: Vec<DrawTrace>,
    /// Teammate pair counts feeding the seeded generator
    #[serde(skip_serializing_if = "TeammateHistory::is_empty")]
    pub teammate_history: TeammateHistory,
    /// Ownership binding per player: hex HMAC of the adding client
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub ownership: BTreeMap<PlayerName, String>,
    /// Unknown top-level keys, preserved verbatim on write
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionDocument {
    /// The team currently holding the player, if any
    pub fn team_of(&self, name: &PlayerName) -> Option<&Team> {
        self.teams.iter().find(|t| t.contains(name))
    }

    /// Players eligible for a draw: the first `player_limit` of `available`
    pub fn eligible_players(&self, player_limit: usize) -> &[PlayerName] {
        let n = self.players.available.len().min(player_limit);
        &self.players.available[..n]
    }

    /// Team names in session order
    pub fn team_names(&self) -> Vec<String> {
        self.teams.iter().map(|t| t.name.clone()).collect()
    }
}

// =============================================================================
// Sessions handle + settings cache
// =============================================================================

/// Resolved-settings cache.
///
/// Settings resolution reads two documents; the result is cached for the
/// process lifetime and invalidated on any write to either level.
#[derive(Default)]
struct SettingsCache {
    defaults: RwLock<HashMap<LeagueId, LeagueSettings>>,
    resolved: RwLock<HashMap<(LeagueId, SessionDate), LeagueSettings>>,
}

impl SettingsCache {
    fn invalidate_league(&self, league: &LeagueId) {
        self.defaults.write().remove(league);
        self.resolved.write().retain(|(l, _), _| l != league);
    }

    fn invalidate_session(&self, league: &LeagueId, date: SessionDate) {
        self.resolved.write().remove(&(league.clone(), date));
    }
}

/// Handle for loading and mutating session documents
#[derive(Clone)]
pub struct Sessions {
    store: Arc<JsonStore>,
    cache: Arc<SettingsCache>,
}

impl Sessions {
    /// Create a handle over the store
    pub fn new(store: Arc<JsonStore>) -> Self {
        Sessions {
            store,
            cache: Arc::new(SettingsCache::default()),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<JsonStore> {
        &self.store
    }

    /// Load a session document; a date nobody touched yet is an empty one
    pub fn load(&self, league: &LeagueId, date: SessionDate) -> Result<SessionDocument> {
        Ok(self
            .store
            .read_typed(league, &DocumentName::Session(date))?
            .unwrap_or_default())
    }

    /// Read-modify-write a session document under its file mutex.
    ///
    /// The settings cache entry for this date is dropped after the write;
    /// callers touching the session `settings` key need no extra step.
    pub fn update<T>(
        &self,
        league: &LeagueId,
        date: SessionDate,
        f: impl FnOnce(&mut SessionDocument) -> Result<T>,
    ) -> Result<T> {
        let out = self
            .store
            .update_typed(league, &DocumentName::Session(date), f)?;
        self.cache.invalidate_session(league, date);
        Ok(out)
    }

    /// League default settings from `info.json`.
    ///
    /// Unknown league is `NotFound`: settings resolution doubles as the
    /// tenant-existence check for every session operation.
    pub fn league_settings(&self, league: &LeagueId) -> Result<LeagueSettings> {
        if let Some(cached) = self.cache.defaults.read().get(league) {
            return Ok(cached.clone());
        }
        let value = self
            .store
            .get(league, &DocumentName::Info, "settings")?
            .ok_or_else(|| Error::not_found(format!("league {league}")))?;
        let path = self.store.document_path(league, &DocumentName::Info);
        let settings: LeagueSettings = serde_json::from_value(value)
            .map_err(|e| Error::parse(path, e.to_string()))?;
        self.cache
            .defaults
            .write()
            .insert(league.clone(), settings.clone());
        Ok(settings)
    }

    /// League defaults overlaid by the session's own settings key
    pub fn resolved_settings(
        &self,
        league: &LeagueId,
        date: SessionDate,
    ) -> Result<LeagueSettings> {
        if let Some(cached) = self.cache.resolved.read().get(&(league.clone(), date)) {
            return Ok(cached.clone());
        }
        let defaults = self.league_settings(league)?;
        let session = self.load(league, date)?;
        let resolved = defaults.overlaid(&session.settings);
        self.cache
            .resolved
            .write()
            .insert((league.clone(), date), resolved.clone());
        Ok(resolved)
    }

    /// Drop cached settings for a league after a league-level write
    pub fn invalidate_league(&self, league: &LeagueId) {
        self.cache.invalidate_league(league);
    }
}
