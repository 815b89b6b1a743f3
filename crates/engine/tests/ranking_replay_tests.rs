//! Ranking replay over a real session archive
//!
//! These tests drive the engine against store-backed leagues: sessions
//! written to disk, rankings recomputed from them, and the yearly file
//! checked as the pure function of the archive it claims to be.

use chrono::{TimeZone, Utc};
use matchday_core::settings::LeagueSettings;
use matchday_core::types::{LeagueId, PlayerName, Scorer, SessionDate};
use matchday_engine::rankings::{RankingEngine, RankingsFile};
use matchday_engine::session::{Fixture, Games, MatchEntry, PlayerLists, SessionDocument, Sessions, Team};
use matchday_storage::{DocumentName, JsonStore, SetOptions};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;

fn name(s: &str) -> PlayerName {
    PlayerName::sanitize(s).unwrap()
}

fn date(s: &str) -> SessionDate {
    SessionDate::parse(s).unwrap()
}

fn setup() -> (TempDir, Arc<JsonStore>, Sessions, RankingEngine, LeagueId) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(JsonStore::open(dir.path().join("data")).unwrap());
    let league = LeagueId::new("replay-league").unwrap();
    store
        .set(
            &league,
            &DocumentName::Info,
            "settings",
            serde_json::to_value(LeagueSettings::default()).unwrap(),
            SetOptions::default(),
        )
        .unwrap();
    store
        .set(
            &league,
            &DocumentName::Info,
            "ownershipSecret",
            json!("test-secret"),
            SetOptions::default(),
        )
        .unwrap();
    let sessions = Sessions::new(Arc::clone(&store));
    let engine = RankingEngine::new(Arc::clone(&store), sessions.clone());
    (dir, store, sessions, engine, league)
}

fn team(name_: &str, members: &[&str]) -> Team {
    Team {
        name: name_.to_string(),
        players: members.iter().map(|m| Some(name(m))).collect(),
    }
}

fn played(home: &str, away: &str, h: u32, a: u32) -> Fixture {
    let mut m = MatchEntry::new(home, away);
    m.home_score = Some(h);
    m.away_score = Some(a);
    Fixture::Match(m)
}

/// One session: red lions (Ann, Ben) beat blue wolves (Cal, Dan) 3–1.
fn write_basic_session(sessions: &Sessions, league: &LeagueId, day: SessionDate) {
    sessions
        .update(league, day, |doc| {
            *doc = SessionDocument {
                players: PlayerLists {
                    available: vec![name("Ann"), name("Ben"), name("Cal"), name("Dan")],
                    waiting_list: vec![],
                },
                teams: vec![
                    team("red lions", &["Ann", "Ben"]),
                    team("blue wolves", &["Cal", "Dan"]),
                ],
                games: Games {
                    rounds: vec![vec![{
                        let mut m = MatchEntry::new("red lions", "blue wolves");
                        m.home_score = Some(3);
                        m.away_score = Some(1);
                        m.home_scorers.insert(Scorer::Player(name("Ann")), 2);
                        m.home_scorers.insert(Scorer::Player(name("Ben")), 1);
                        m.away_scorers.insert(Scorer::Player(name("Cal")), 1);
                        Fixture::Match(m)
                    }]],
                    knockout: vec![],
                },
                ..Default::default()
            };
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_points_and_elo_for_one_session() {
    let (_dir, _store, sessions, engine, league) = setup();
    write_basic_session(&sessions, &league, date("2025-01-04"));

    let now = Utc.with_ymd_and_hms(2025, 1, 5, 8, 0, 0).unwrap();
    let file = engine.recompute(&league, 2025, now).unwrap();

    // winners: 1 appearance + 3 win + 3 top-of-table bonus
    let ann = &file.players[&name("Ann")];
    assert_eq!(ann.points, 7);
    assert_eq!(ann.appearances, 1);
    assert_eq!(ann.league_wins, 1);
    // 1000-rated teams, K=24: winner delta is 24·(1−0.5) = +12
    assert!((ann.elo.rating - 1012.0).abs() < 1e-9);
    assert_eq!(ann.elo.games_played, 1);

    // losers: 1 appearance + 0 match points + 2 runner-up bonus
    let cal = &file.players[&name("Cal")];
    assert_eq!(cal.points, 3);
    assert_eq!(cal.league_wins, 0);
    assert!((cal.elo.rating - 988.0).abs() < 1e-9);

    // hybrid rating: global average is (7+7+3+3)/4 = 5
    assert!((file.ranking_metadata.global_average - 5.0).abs() < 1e-9);
    // Ann: (7 + 5·5)/(1+5) = 5.333… → 5.3; Cal: (3 + 25)/6 = 4.666… → 4.7
    assert!((ann.ranking_points - 5.3).abs() < 1e-9);
    assert!((cal.ranking_points - 4.7).abs() < 1e-9);
    assert!(!ann.has_full_confidence);
    assert_eq!(ann.games_until_full_confidence, Some(4));

    // ranks: winners above losers, names break the tie inside a team
    assert_eq!(ann.rank, 1);
    assert_eq!(file.players[&name("Ben")].rank, 2);
    assert_eq!(cal.rank, 3);

    // the per-date breakdown adds up
    let detail = &ann.ranking_detail["2025-01-04"];
    assert_eq!(detail.appearance, 1);
    assert_eq!(detail.match_points, 3);
    assert_eq!(detail.bonus_points, 3);
    assert_eq!(detail.total, 7);
}

#[test]
fn test_recompute_is_idempotent_modulo_last_updated() {
    let (_dir, _store, sessions, engine, league) = setup();
    write_basic_session(&sessions, &league, date("2025-01-04"));
    write_basic_session(&sessions, &league, date("2025-01-11"));

    let first = engine
        .recompute(&league, 2025, Utc.with_ymd_and_hms(2025, 1, 12, 8, 0, 0).unwrap())
        .unwrap();
    let second = engine
        .recompute(&league, 2025, Utc.with_ymd_and_hms(2025, 2, 1, 9, 30, 0).unwrap())
        .unwrap();

    let mut a = serde_json::to_value(&first).unwrap();
    let mut b = serde_json::to_value(&second).unwrap();
    a.as_object_mut().unwrap().remove("lastUpdated");
    b.as_object_mut().unwrap().remove("lastUpdated");
    assert_eq!(a, b);
}

#[test]
fn test_year_rollover_carries_elo_only() {
    let (_dir, store, sessions, engine, league) = setup();

    // hand-written previous-year file: Zed finished 2025 at 1300 over 40 games
    let mut previous = RankingsFile::default();
    let mut zed = matchday_engine::rankings::PlayerRanking::default();
    zed.points = 99;
    zed.appearances = 30;
    zed.league_wins = 7;
    zed.elo.rating = 1300.0;
    zed.elo.games_played = 40;
    previous.players.insert(name("Zed"), zed);
    store
        .update(&league, &DocumentName::Rankings(2025), |map| {
            *map = match serde_json::to_value(&previous).unwrap() {
                serde_json::Value::Object(m) => m,
                _ => unreachable!(),
            };
            Ok(())
        })
        .unwrap();

    // 2026 session where Zed appears but nothing is played yet
    sessions
        .update(&league, date("2026-01-10"), |doc| {
            doc.players.available = vec![name("Zed"), name("Ann")];
            doc.teams = vec![team("red lions", &["Zed"]), team("blue wolves", &["Ann"])];
            Ok(())
        })
        .unwrap();

    let file = engine
        .recompute(&league, 2026, Utc.with_ymd_and_hms(2026, 1, 10, 20, 0, 0).unwrap())
        .unwrap();

    let zed = &file.players[&name("Zed")];
    assert!((zed.elo.rating - 1300.0).abs() < 1e-9);
    assert_eq!(zed.elo.games_played, 40);
    // 2025 counters do not carry
    assert_eq!(zed.points, 1); // this year's appearance only
    assert_eq!(zed.appearances, 1);
    assert_eq!(zed.league_wins, 0);

    // a fresh player starts at the baseline
    assert!((file.players[&name("Ann")].elo.rating - 1000.0).abs() < 1e-9);
}

#[test]
fn test_missed_weeks_decay_toward_baseline() {
    let (_dir, _store, sessions, engine, league) = setup();
    // Ann and friends play on Jan 4; a later session three weeks on
    // happens without Ann's team
    write_basic_session(&sessions, &league, date("2025-01-04"));
    sessions
        .update(&league, date("2025-01-25"), |doc| {
            doc.players.available = vec![name("Eve"), name("Fay")];
            doc.teams = vec![team("green bears", &["Eve"]), team("white owls", &["Fay"])];
            doc.games.rounds = vec![vec![played("green bears", "white owls", 1, 0)]];
            Ok(())
        })
        .unwrap();

    let file = engine
        .recompute(&league, 2025, Utc.with_ymd_and_hms(2025, 1, 26, 8, 0, 0).unwrap())
        .unwrap();

    // Ann won to 1012 on Jan 4, then missed the gap to Jan 25:
    // 21 days → 21/7 − 1 = 2 missed weeks → delta · 0.98²
    let ann = &file.players[&name("Ann")];
    let expected = 1000.0 + 12.0 * 0.98f64.powi(2);
    assert!(
        (ann.elo.rating - expected).abs() < 1e-9,
        "rating {} expected {expected}",
        ann.elo.rating
    );

    // weekly cadence players see no decay
    let eve = &file.players[&name("Eve")];
    assert!(eve.elo.rating > 1000.0);
}

#[test]
fn test_rank_movement_tracks_the_latest_session() {
    let (_dir, _store, sessions, engine, league) = setup();
    write_basic_session(&sessions, &league, date("2025-01-04"));
    // second session: Cal and Dan win big, overtaking on points
    sessions
        .update(&league, date("2025-01-11"), |doc| {
            doc.players.available = vec![name("Ann"), name("Ben"), name("Cal"), name("Dan")];
            doc.teams = vec![
                team("red lions", &["Ann", "Ben"]),
                team("blue wolves", &["Cal", "Dan"]),
            ];
            doc.games.rounds = vec![vec![played("blue wolves", "red lions", 4, 0)]];
            Ok(())
        })
        .unwrap();

    let file = engine
        .recompute(&league, 2025, Utc.with_ymd_and_hms(2025, 1, 12, 8, 0, 0).unwrap())
        .unwrap();

    let cal = &file.players[&name("Cal")];
    let ann = &file.players[&name("Ann")];
    // both sessions award 10 points total to each pair, so the table is
    // level again; movement reflects the swing from the first-session
    // table where Ann led
    assert_eq!(cal.points, ann.points);
    assert!(cal.rank_movement >= 0);
    assert!(ann.rank_movement <= 0);
    assert_eq!(file.calculated_dates.len(), 2);
}

#[test]
fn test_golden_boot_and_champions() {
    let (_dir, _store, sessions, engine, league) = setup();
    write_basic_session(&sessions, &league, date("2025-01-04"));
    engine
        .recompute(&league, 2025, Utc.with_ymd_and_hms(2025, 1, 5, 8, 0, 0).unwrap())
        .unwrap();

    let boot = engine.golden_boot(&league, Some(2025)).unwrap();
    assert_eq!(boot[0].player, name("Ann"));
    assert_eq!(boot[0].goals, 2);
    let total: u32 = boot.iter().map(|e| e.goals).sum();
    assert_eq!(total, 4); // own goals would be excluded

    let champions = engine.champions(&league, None).unwrap();
    assert_eq!(champions.len(), 1);
    assert_eq!(champions[0].year, 2025);
    // Ann and Ben tie at the top and are both listed
    assert_eq!(
        champions[0].league_champions,
        vec![name("Ann"), name("Ben")]
    );
    assert!(champions[0].cup_champions.is_empty());

    let review = engine.year_in_review(&league, 2025).unwrap();
    assert_eq!(review.sessions, 1);
    assert_eq!(review.players, 4);
    assert_eq!(review.goals, 4);
    let big = review.biggest_win.unwrap();
    assert_eq!(big.margin, 2);
    assert_eq!(big.home, "red lions");
}

#[test]
fn test_elo_snapshot_prefers_current_year() {
    let (_dir, _store, sessions, engine, league) = setup();
    write_basic_session(&sessions, &league, date("2025-01-04"));
    engine
        .recompute(&league, 2025, Utc.with_ymd_and_hms(2025, 1, 5, 8, 0, 0).unwrap())
        .unwrap();

    let snapshot: BTreeMap<PlayerName, f64> = engine.elo_snapshot(&league, 2025).unwrap();
    assert!((snapshot[&name("Ann")] - 1012.0).abs() < 1e-9);

    // next January falls back to the previous year's file
    let snapshot = engine.elo_snapshot(&league, 2026).unwrap();
    assert!((snapshot[&name("Cal")] - 988.0).abs() < 1e-9);

    // nothing on disk at all: empty map, callers default to 1000
    let ghost = LeagueId::new("ghost-league").unwrap();
    assert!(engine.elo_snapshot(&ghost, 2025).unwrap().is_empty());
}
