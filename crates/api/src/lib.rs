//! Public operation surface for the Matchday engine
//!
//! This crate is what the HTTP dispatch layer links against: the
//! [`Matchday`] facade (one method per endpoint operation), request
//! authentication helpers, the environment configuration and the
//! rate limiter component.
//!
//! The dispatch layer itself (routing, body parsing, response encoding)
//! lives outside the core; its contract is:
//!
//! 1. [`auth::verify_api_key`], [`auth::check_origin`],
//!    [`auth::check_body_size`] on every request
//! 2. [`RateLimiter::check`] before any side effect
//! 3. [`Matchday::authenticate_request`] to build the per-request context
//! 4. one facade call, mapping [`Error::status_code`] onto the response
//!
//! [`Error::status_code`]: matchday_core::Error::status_code

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod config;
pub mod facade;
pub mod ratelimit;

pub use config::AppConfig;
pub use facade::Matchday;
pub use ratelimit::{KeyDimension, RateLimiter, RateRule};

// Re-export the types a caller needs to drive the facade.
pub use matchday_core::context::{AccessLevel, RequestContext};
pub use matchday_core::error::{Error, Result};
pub use matchday_core::settings::{GenerationMethod, LeagueSettings, SettingsPatch};
pub use matchday_core::types::{
    ClientId, KnockoutRound, LeagueId, PlayerName, Scorer, SessionDate,
};
pub use matchday_engine::knockout::KnockoutEntry;
pub use matchday_storage::{DocumentName, JsonStore, PathLocks, RemoveSelector, SetOptions, StoreOp};
pub use matchday_engine::leagues::{league_from_host, League};
pub use matchday_engine::players::{RemoveAction, TeamRemoveAction};
pub use matchday_engine::rankings::RankingsFile;
pub use matchday_engine::session::{
    DrawTrace, Fixture, Games, ListKind, MatchEntry, PlayerLists, SessionDocument, Team,
};
pub use matchday_engine::teams::TeamConfig;
