//! The Matchday facade
//!
//! [`Matchday`] is the single entry point the dispatch layer calls into:
//! one method per operation of the public surface, grouped into one file
//! per resource. Every method takes an explicit [`RequestContext`] built
//! by the authentication layer; the facade itself holds only the store
//! and the managers over it.

mod games;
mod leagues;
mod players;
mod rankings;
mod teams;

use crate::config::AppConfig;
use matchday_core::error::Result;
use matchday_engine::leagues::LeagueDirectory;
use matchday_engine::players::Players;
use matchday_engine::rankings::RankingEngine;
use matchday_engine::session::Sessions;
use matchday_storage::JsonStore;
use std::sync::Arc;

pub use matchday_core::context::RequestContext;

/// Operation surface over one data directory
pub struct Matchday {
    store: Arc<JsonStore>,
    sessions: Sessions,
    players: Players,
    rankings: RankingEngine,
    directory: LeagueDirectory,
}

impl Matchday {
    /// Open the facade over the configured data directory
    pub fn open(config: &AppConfig) -> Result<Self> {
        let store = Arc::new(JsonStore::open(&config.data_dir)?);
        Ok(Self::with_store(store))
    }

    /// Build the facade over an existing store (embedding and tests)
    pub fn with_store(store: Arc<JsonStore>) -> Self {
        let sessions = Sessions::new(Arc::clone(&store));
        let players = Players::new(sessions.clone());
        let rankings = RankingEngine::new(Arc::clone(&store), sessions.clone());
        let directory = LeagueDirectory::new(Arc::clone(&store), sessions.clone());
        Matchday {
            store,
            sessions,
            players,
            rankings,
            directory,
        }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<JsonStore> {
        &self.store
    }

    /// The sessions handle
    pub fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    /// The league directory
    pub fn directory(&self) -> &LeagueDirectory {
        &self.directory
    }
}
