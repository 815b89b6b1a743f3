//! League settings and per-session overlay
//!
//! A league document carries a full default settings block; a session
//! document may carry a partial `settings` key. The effective settings for
//! an operation are the league defaults overlaid by the session patch.

use serde::{Deserialize, Serialize};

/// Team generation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMethod {
    /// Pot-seeded, ELO-balanced, teammate-history-aware draw
    #[default]
    Seeded,
    /// Uniform shuffle sliced into teams
    Random,
}

/// Fully-resolved league settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeagueSettings {
    /// Maximum size of the `available` list; later additions overflow to
    /// the waiting list
    pub player_limit: usize,
    /// Upper bound on teams per session; must not exceed the colour corpus
    pub max_teams: usize,
    /// Hard cap on slots per team
    pub max_players_per_team: usize,
    /// How teams are drawn
    pub team_generation_method: GenerationMethod,
    /// Appearances needed before a player's average stands on its own in
    /// the hybrid rating
    pub confidence_threshold: u32,
}

impl Default for LeagueSettings {
    fn default() -> Self {
        LeagueSettings {
            player_limit: 18,
            max_teams: 6,
            max_players_per_team: 8,
            team_generation_method: GenerationMethod::Seeded,
            confidence_threshold: 5,
        }
    }
}

/// Partial settings stored on a session document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    /// Override for [`LeagueSettings::player_limit`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_limit: Option<usize>,
    /// Override for [`LeagueSettings::max_teams`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_teams: Option<usize>,
    /// Override for [`LeagueSettings::max_players_per_team`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_players_per_team: Option<usize>,
    /// Override for [`LeagueSettings::team_generation_method`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_generation_method: Option<GenerationMethod>,
    /// Override for [`LeagueSettings::confidence_threshold`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<u32>,
}

impl SettingsPatch {
    /// True when the patch overrides nothing
    pub fn is_empty(&self) -> bool {
        *self == SettingsPatch::default()
    }
}

impl LeagueSettings {
    /// League defaults overlaid by a session patch
    pub fn overlaid(&self, patch: &SettingsPatch) -> LeagueSettings {
        LeagueSettings {
            player_limit: patch.player_limit.unwrap_or(self.player_limit),
            max_teams: patch.max_teams.unwrap_or(self.max_teams),
            max_players_per_team: patch
                .max_players_per_team
                .unwrap_or(self.max_players_per_team),
            team_generation_method: patch
                .team_generation_method
                .unwrap_or(self.team_generation_method),
            confidence_threshold: patch
                .confidence_threshold
                .unwrap_or(self.confidence_threshold),
        }
    }
}
