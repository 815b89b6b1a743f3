//! League lifecycle and authentication

use super::Matchday;
use chrono::{DateTime, Utc};
use matchday_core::context::{AccessLevel, RequestContext};
use matchday_core::error::Result;
use matchday_core::settings::LeagueSettings;
use matchday_core::types::{ClientId, LeagueId};
use matchday_engine::leagues::{league_from_host, League};

impl Matchday {
    /// Build a request context: resolve the tenant from the host, check
    /// the presented code and stamp the request time.
    ///
    /// This is the glue the dispatch layer calls once per request after
    /// the api-key and origin checks.
    pub fn authenticate_request(
        &self,
        host: &str,
        client_id: &str,
        code: &str,
        admin_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RequestContext> {
        let league = league_from_host(host)?;
        let client_id = ClientId::new(client_id)?;
        let mut access = self.directory.authenticate(&league, code)?;
        if access == AccessLevel::Member {
            if let Some(admin_code) = admin_code {
                // an optional admin uplift; a wrong admin code is a hard
                // failure rather than a silent downgrade
                access = self.directory.authenticate(&league, admin_code)?;
            }
        }
        Ok(RequestContext::new(league, client_id, access, now))
    }

    /// `POST /api/leagues`: create a league with fresh credentials
    pub fn create_league(
        &self,
        id: &LeagueId,
        display_name: &str,
        owner_email: &str,
        icon: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<League> {
        self.directory
            .create(id, display_name, owner_email, icon, now, &mut rand::thread_rng())
    }

    /// `POST /api/leagues/authenticate`: what does this code grant?
    pub fn authenticate_league(&self, league: &LeagueId, code: &str) -> Result<AccessLevel> {
        self.directory.authenticate(league, code)
    }

    /// `POST /api/leagues/reset-access-code` (step 1): verify the owner
    /// email and issue a single-use reset code for delivery
    pub fn issue_reset_code(
        &self,
        league: &LeagueId,
        owner_email: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        self.directory
            .issue_reset_code(league, owner_email, now, &mut rand::thread_rng())
    }

    /// `POST /api/leagues/reset-access-code` (step 2): redeem the code
    /// and rotate the access code
    pub fn reset_access_code(
        &self,
        league: &LeagueId,
        reset_code: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        self.directory
            .reset_access_code(league, reset_code, now, &mut rand::thread_rng())
    }

    /// Replace the league default settings (admin only)
    pub fn update_league_settings(
        &self,
        ctx: &RequestContext,
        settings: LeagueSettings,
    ) -> Result<League> {
        self.directory.update_settings(ctx, settings)
    }
}
