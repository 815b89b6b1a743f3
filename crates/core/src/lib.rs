//! Core types for the Matchday session engine
//!
//! This crate holds everything the other crates agree on and nothing else:
//! identity types (league, player, client, session date), the unified error
//! enum, league settings with overlay resolution, and the per-request
//! context value.
//!
//! No I/O happens here. The storage and engine crates depend on this one;
//! it depends on nobody.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod settings;
pub mod types;

pub use context::{AccessLevel, RequestContext};
pub use error::{Error, Result};
pub use settings::{GenerationMethod, LeagueSettings, SettingsPatch};
pub use types::{ClientId, KnockoutRound, LeagueId, PlayerName, Scorer, SessionDate};
