//! Schedule and knockout operations

use super::Matchday;
use matchday_core::context::RequestContext;
use matchday_core::error::{Error, Result};
use matchday_core::types::SessionDate;
use matchday_engine::knockout::{self, KnockoutEntry};
use matchday_engine::schedule;
use matchday_engine::session::{Fixture, Games};
use tracing::info;

impl Matchday {
    /// `GET /api/games?date=…`: rounds and knockout bracket
    pub fn games(&self, ctx: &RequestContext, date: SessionDate) -> Result<Games> {
        self.sessions.resolved_settings(&ctx.league, date)?;
        Ok(self.sessions.load(&ctx.league, date)?.games)
    }

    /// `POST /api/games?date=…`: build the double round robin for the
    /// drawn teams, or append another swapped pass with `add_more`.
    ///
    /// The anchor index is chosen uniformly at random when unspecified.
    /// The first schedule of a session folds the current team pairings
    /// into the teammate history.
    pub fn generate_games(
        &self,
        ctx: &RequestContext,
        date: SessionDate,
        anchor_index: Option<usize>,
        add_more: bool,
    ) -> Result<Games> {
        self.sessions.resolved_settings(&ctx.league, date)?;
        let mut rng = rand::thread_rng();

        let games = self.sessions.update(&ctx.league, date, |doc| {
            if doc.teams.len() < 2 {
                return Err(Error::conflict("draw teams before generating games"));
            }
            let names = doc.team_names();
            let anchor = match anchor_index {
                Some(anchor) if anchor >= names.len() => {
                    return Err(Error::validation(format!(
                        "anchor index {anchor} out of range for {} teams",
                        names.len()
                    )));
                }
                Some(anchor) => anchor,
                None => schedule::random_anchor(names.len(), &mut rng),
            };

            if add_more {
                if doc.games.rounds.is_empty() {
                    return Err(Error::conflict("no schedule to extend"));
                }
                let extra = schedule::additional_rounds(&names, anchor)?;
                doc.games.rounds.extend(extra);
            } else {
                let first_schedule = doc.games.is_empty();
                doc.games.rounds = schedule::generate_full_schedule(&names, anchor)?;
                doc.games.knockout.clear();
                if first_schedule {
                    // the competition starts here: these pairings now
                    // count as shared sessions
                    for team in &doc.teams {
                        let members: Vec<_> = team.members().cloned().collect();
                        for i in 0..members.len() {
                            for j in i + 1..members.len() {
                                doc.teammate_history.record(&members[i], &members[j]);
                            }
                        }
                    }
                }
            }
            Ok(doc.games.clone())
        })?;
        info!(league = %ctx.league, %date, rounds = games.rounds.len(), "schedule generated");
        Ok(games)
    }

    /// `POST /api/games?date=…` with `existingRounds`: record scores and
    /// scorers.
    ///
    /// The submitted rounds replace the stored ones after full
    /// validation: schedule shape, score range, scorer membership and
    /// own-goal caps.
    pub fn record_results(
        &self,
        ctx: &RequestContext,
        date: SessionDate,
        rounds: Vec<Vec<Fixture>>,
    ) -> Result<Games> {
        self.sessions.resolved_settings(&ctx.league, date)?;
        self.sessions.update(&ctx.league, date, |doc| {
            if doc.games.rounds.is_empty() {
                return Err(Error::conflict("no schedule to record results against"));
            }
            schedule::validate_results(&doc.teams, &rounds)?;
            doc.games.rounds = rounds;
            Ok(doc.games.clone())
        })
    }

    /// Seed the knockout bracket from the current league standings
    pub fn generate_knockout(&self, ctx: &RequestContext, date: SessionDate) -> Result<Games> {
        self.sessions.resolved_settings(&ctx.league, date)?;
        self.sessions.update(&ctx.league, date, |doc| {
            if !doc.games.knockout.is_empty() {
                return Err(Error::conflict("knockout bracket already exists"));
            }
            let names = doc.team_names();
            let table = schedule::league_standings(&names, &doc.games.rounds);
            if table.iter().all(|s| s.played == 0) {
                return Err(Error::conflict("league games have not been played yet"));
            }
            let standings: Vec<String> = table.into_iter().map(|s| s.team).collect();
            doc.games.knockout = knockout::seed_bracket(&standings)?;
            Ok(doc.games.clone())
        })
    }

    /// Record knockout scores; the submitted entries replace the bracket
    /// after validation
    pub fn record_knockout(
        &self,
        ctx: &RequestContext,
        date: SessionDate,
        entries: Vec<KnockoutEntry>,
    ) -> Result<Games> {
        self.sessions.resolved_settings(&ctx.league, date)?;
        self.sessions.update(&ctx.league, date, |doc| {
            if doc.games.knockout.is_empty() {
                return Err(Error::conflict("no knockout bracket to record against"));
            }
            knockout::validate_knockout_results(&doc.teams, &entries)?;
            doc.games.knockout = entries;
            Ok(doc.games.clone())
        })
    }

    /// Advance the knockout bracket one stage.
    ///
    /// Requires every match of the current stage to be decided; drawn
    /// matches need an explicit tiebreak score.
    pub fn advance_knockout(&self, ctx: &RequestContext, date: SessionDate) -> Result<Games> {
        self.sessions.resolved_settings(&ctx.league, date)?;
        self.sessions.update(&ctx.league, date, |doc| {
            let next = knockout::advance(&doc.games.knockout)?;
            doc.games.knockout.extend(next);
            Ok(doc.games.clone())
        })
    }
}
