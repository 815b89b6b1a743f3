//! # Matchday
//!
//! A concurrent, file-backed session engine for recurring small-sided
//! football leagues sharing one process. Each league is a directory of
//! plain JSON documents; every mutation runs under a per-file mutex and
//! lands via temp-file-then-rename, so readers never see a torn document.
//!
//! # Quick Start
//!
//! ```no_run
//! use matchday::{AppConfig, Matchday, ListKind, SessionDate};
//! use chrono::Utc;
//!
//! fn main() -> matchday::Result<()> {
//!     let config = AppConfig::new("./data", "api-key");
//!     let db = Matchday::open(&config)?;
//!
//!     // create a league and authenticate a client
//!     let id = matchday::LeagueId::new("sunday-league")?;
//!     let league = db.create_league(&id, "Sunday League", "owner@example.com", None, Utc::now())?;
//!     let ctx = db.authenticate_request(
//!         "sunday-league.example.com",
//!         "550e8400-e29b-41d4-a716-446655440000",
//!         &league.access_code,
//!         None,
//!         Utc::now(),
//!     )?;
//!
//!     // sign a player up for Saturday's session
//!     let date = SessionDate::parse("2025-01-04")?;
//!     let lists = db.add_player(&ctx, date, "Ann", ListKind::Available)?;
//!     assert_eq!(lists.available.len(), 1);
//!     Ok(())
//! }
//! ```
//!
//! # Subsystems
//!
//! | Subsystem | Purpose | Entry points |
//! |-----------|---------|--------------|
//! | **Store** | per-file mutual exclusion, atomic JSON writes | `Matchday::store` |
//! | **Players** | lists, waiting-list overflow, ownership | `add_player`, `move_player`, … |
//! | **Teams** | pot-seeded ELO-balanced draws with replay traces | `generate_teams` |
//! | **Games** | anchor-rotation double round robin, knockout | `generate_games`, `advance_knockout` |
//! | **Rankings** | deterministic replay, hybrid rating, decayed ELO | `recompute_rankings` |
//! | **Leagues** | tenancy, access codes, resets | `create_league`, `authenticate_request` |
//!
//! The HTTP dispatch layer is not part of this crate; see the
//! `matchday-api` docs for the contract it implements.

// Re-export the public API from matchday-api
pub use matchday_api::*;
