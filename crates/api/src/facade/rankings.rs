//! Ranking and archive queries

use super::Matchday;
use matchday_core::context::RequestContext;
use matchday_core::error::Result;
use matchday_core::types::PlayerName;
use matchday_engine::rankings::{
    ChampionsEntry, GoldenBootEntry, PlayerRanking, RankingsFile, YearInReview,
};

impl Matchday {
    /// `GET /api/rankings?year=…`: the year's ranking document
    pub fn rankings(&self, ctx: &RequestContext, year: i32) -> Result<RankingsFile> {
        self.rankings.load(&ctx.league, year)
    }

    /// `POST /api/rankings?year=…`: recompute from the session archive
    pub fn recompute_rankings(&self, ctx: &RequestContext, year: i32) -> Result<RankingsFile> {
        self.rankings.recompute(&ctx.league, year, ctx.now)
    }

    /// `GET /api/rankings/{player}?year=…&limit=…`: one player's row with
    /// a trimmed per-session breakdown
    pub fn player_ranking(
        &self,
        ctx: &RequestContext,
        player_name: &str,
        year: i32,
        limit: Option<usize>,
    ) -> Result<PlayerRanking> {
        let name = PlayerName::sanitize(player_name)?;
        self.rankings.player_detail(&ctx.league, &name, year, limit)
    }

    /// `GET /api/champions?year=YYYY|all`
    pub fn champions(
        &self,
        ctx: &RequestContext,
        year: Option<i32>,
    ) -> Result<Vec<ChampionsEntry>> {
        self.rankings.champions(&ctx.league, year)
    }

    /// `GET /api/golden-boot?year=YYYY|all`
    pub fn golden_boot(
        &self,
        ctx: &RequestContext,
        year: Option<i32>,
    ) -> Result<Vec<GoldenBootEntry>> {
        self.rankings.golden_boot(&ctx.league, year)
    }

    /// `GET /api/year-in-review/{year}`
    pub fn year_in_review(&self, ctx: &RequestContext, year: i32) -> Result<YearInReview> {
        self.rankings.year_in_review(&ctx.league, year)
    }
}
