//! Domain engine for Matchday
//!
//! The per-league managers over the JSON store: session documents,
//! player lists, round-robin scheduling, pot-seeded team generation, the
//! knockout bracket, the ranking/ELO replay and the league directory.
//!
//! Everything takes an explicit request context; the only process-wide
//! state is the store's mutex registry, the settings cache and the
//! directory's existence cache.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod knockout;
pub mod leagues;
pub mod players;
pub mod rankings;
pub mod schedule;
pub mod session;
pub mod teams;

pub use knockout::{KnockoutEntry, KnockoutMatch};
pub use leagues::{league_from_host, League, LeagueDirectory};
pub use players::{DisciplineLedger, Players, RemoveAction, TeamRemoveAction};
pub use rankings::{PlayerRanking, RankingEngine, RankingsFile};
pub use schedule::Standing;
pub use session::{DrawTrace, Fixture, ListKind, MatchEntry, SessionDocument, Sessions, Team};
pub use teams::{GeneratedTeams, TeamConfig};
