//! Team draw operations

use super::Matchday;
use matchday_core::context::RequestContext;
use matchday_core::error::{Error, Result};
use matchday_core::settings::{GenerationMethod, LeagueSettings, SettingsPatch};
use matchday_core::types::SessionDate;
use matchday_engine::session::{DrawTrace, Games, Team};
use matchday_engine::teams::{self, GeneratedTeams, TeamConfig};
use tracing::info;

impl Matchday {
    /// `GET /api/teams?date=…`: the drawn teams of a session
    pub fn teams(&self, ctx: &RequestContext, date: SessionDate) -> Result<Vec<Team>> {
        self.sessions.resolved_settings(&ctx.league, date)?;
        Ok(self.sessions.load(&ctx.league, date)?.teams)
    }

    /// `GET /api/teams/configurations?date=…`: valid team splits for the
    /// current eligible player count
    pub fn team_configurations(
        &self,
        ctx: &RequestContext,
        date: SessionDate,
    ) -> Result<Vec<TeamConfig>> {
        let settings = self.sessions.resolved_settings(&ctx.league, date)?;
        let doc = self.sessions.load(&ctx.league, date)?;
        let eligible = doc.eligible_players(settings.player_limit).len();
        Ok(teams::team_configurations(eligible, &settings))
    }

    /// `GET /api/teams/draw-history?date=…`: every draw trace of the
    /// session, oldest first
    pub fn draw_history(&self, ctx: &RequestContext, date: SessionDate) -> Result<Vec<DrawTrace>> {
        self.sessions.resolved_settings(&ctx.league, date)?;
        Ok(self.sessions.load(&ctx.league, date)?.draw_history)
    }

    /// `POST /api/teams?date=…`: draw fresh teams.
    ///
    /// The draw consumes the first `playerLimit` available players, the
    /// league's current ELO ratings and the session's teammate history.
    /// Omitting the configuration picks the first valid split; omitting
    /// the method uses the session's configured one. A new draw clears
    /// any existing games.
    pub fn generate_teams(
        &self,
        ctx: &RequestContext,
        date: SessionDate,
        config: Option<TeamConfig>,
        method: Option<GenerationMethod>,
    ) -> Result<GeneratedTeams> {
        let settings = self.sessions.resolved_settings(&ctx.league, date)?;
        // ratings come from the rankings file; read before taking the
        // session mutex so only one file is locked at a time
        let elo = self.rankings.elo_snapshot(&ctx.league, date.year())?;
        let mut rng = rand::thread_rng();

        let generated = self.sessions.update(&ctx.league, date, |doc| {
            let eligible = doc.eligible_players(settings.player_limit).to_vec();
            let config = match config {
                Some(config) => config,
                None => teams::team_configurations(eligible.len(), &settings)
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        Error::validation(format!(
                            "no valid team configuration for {} players",
                            eligible.len()
                        ))
                    })?,
            };
            config.validate(eligible.len(), &settings)?;
            let method = method.unwrap_or(settings.team_generation_method);

            let generated = teams::generate(
                &eligible,
                &elo,
                Some(&doc.teammate_history),
                &config,
                method,
                ctx.now,
                &mut rng,
            )?;
            doc.teams = generated.teams.clone();
            doc.draw_history.push(generated.trace.clone());
            // drawn teams invalidate any schedule built for the old ones
            doc.games = Games::default();
            Ok(generated)
        })?;
        info!(league = %ctx.league, %date, teams = generated.teams.len(), "teams drawn");
        Ok(generated)
    }

    /// `PATCH /api/teams/settings?date=…`: replace the session settings
    /// overlay and return the resolved settings
    pub fn update_session_settings(
        &self,
        ctx: &RequestContext,
        date: SessionDate,
        patch: SettingsPatch,
    ) -> Result<LeagueSettings> {
        self.sessions.resolved_settings(&ctx.league, date)?;
        self.sessions.update(&ctx.league, date, |doc| {
            doc.settings = patch;
            Ok(())
        })?;
        self.sessions.resolved_settings(&ctx.league, date)
    }
}
