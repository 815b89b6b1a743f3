//! Player list operations

use super::Matchday;
use matchday_core::context::RequestContext;
use matchday_core::error::Result;
use matchday_core::types::{PlayerName, SessionDate};
use matchday_engine::players::{RemoveAction, TeamRemoveAction};
use matchday_engine::session::{ListKind, PlayerLists, SessionDocument};

impl Matchday {
    /// `GET /api/players?date=…`: both lists of a session
    pub fn player_lists(&self, ctx: &RequestContext, date: SessionDate) -> Result<PlayerLists> {
        // settings resolution doubles as the unknown-league check
        self.sessions.resolved_settings(&ctx.league, date)?;
        Ok(self.sessions.load(&ctx.league, date)?.players)
    }

    /// `POST /api/players?date=…`: add a player to a list.
    ///
    /// A full `available` list demotes the newcomer to the waiting list.
    pub fn add_player(
        &self,
        ctx: &RequestContext,
        date: SessionDate,
        player_name: &str,
        list: ListKind,
    ) -> Result<PlayerLists> {
        Ok(self.players.add(ctx, date, player_name, list)?.players)
    }

    /// `DELETE /api/players?date=…`: remove a player, optionally logging
    /// a no-show
    pub fn remove_player(
        &self,
        ctx: &RequestContext,
        date: SessionDate,
        player_name: &str,
        action: RemoveAction,
    ) -> Result<PlayerLists> {
        let name = PlayerName::sanitize(player_name)?;
        Ok(self.players.remove(ctx, date, &name, action)?.players)
    }

    /// `PATCH /api/players?date=…`: explicit cross-list move
    pub fn move_player(
        &self,
        ctx: &RequestContext,
        date: SessionDate,
        player_name: &str,
        from: ListKind,
        to: ListKind,
    ) -> Result<PlayerLists> {
        let name = PlayerName::sanitize(player_name)?;
        Ok(self
            .players
            .move_between(ctx, date, &name, from, to)?
            .players)
    }

    /// `PATCH /api/teams?date=…`: put an available player on a team
    pub fn assign_to_team(
        &self,
        ctx: &RequestContext,
        date: SessionDate,
        player_name: &str,
        team_name: &str,
    ) -> Result<SessionDocument> {
        let name = PlayerName::sanitize(player_name)?;
        self.players.assign_to_team(ctx, date, &name, team_name)
    }

    /// `DELETE /api/teams?date=…`: take a player off a team
    pub fn remove_from_team(
        &self,
        ctx: &RequestContext,
        date: SessionDate,
        player_name: &str,
        team_name: &str,
        action: TeamRemoveAction,
    ) -> Result<SessionDocument> {
        let name = PlayerName::sanitize(player_name)?;
        self.players
            .remove_from_team(ctx, date, &name, team_name, action)
    }
}
