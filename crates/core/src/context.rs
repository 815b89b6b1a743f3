//! Per-request context
//!
//! Every operation takes an explicit [`RequestContext`] instead of reading
//! ambient per-league state. The dispatch layer builds one per request after
//! tenant resolution and authentication; tests build them directly.

use crate::types::{ClientId, LeagueId};
use chrono::{DateTime, NaiveDate, Utc};

/// What the presented credentials grant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    /// League access code presented: ordinary member operations
    Member,
    /// Admin code presented: may act on entries bound to other clients
    Admin,
}

/// Explicit request-scoped inputs for every operation
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Tenant the request resolved to
    pub league: LeagueId,
    /// Stable per-browser client identity
    pub client_id: ClientId,
    /// Granted access level
    pub access: AccessLevel,
    /// Request arrival time; domain code never calls the clock itself
    pub now: DateTime<Utc>,
}

impl RequestContext {
    /// Build a context
    pub fn new(
        league: LeagueId,
        client_id: ClientId,
        access: AccessLevel,
        now: DateTime<Utc>,
    ) -> Self {
        RequestContext {
            league,
            client_id,
            access,
            now,
        }
    }

    /// True when the admin code was presented
    pub fn is_admin(&self) -> bool {
        self.access == AccessLevel::Admin
    }

    /// Calendar date of the request
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }
}
