//! Player manager
//!
//! Add, remove, move and team-assignment operations over a session's two
//! ordered player lists. Every operation runs inside one
//! [`Sessions::update`] call, so all touched keys of the session document
//! (lists, teams, ownership) commit in a single atomic write under the
//! session file mutex.
//!
//! ## Ownership
//!
//! Adding a player binds the entry to the caller:
//! `ownership[name] = hex(hmac_sha256(client_id, league_secret))`. Only
//! the binding client, or a caller holding the admin code, may later move
//! or remove that entry. Unbound entries (legacy data) are open to anyone.

use crate::session::{ListKind, SessionDocument, Sessions};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use matchday_core::context::RequestContext;
use matchday_core::error::{Error, Result};
use matchday_core::types::{ClientId, PlayerName, SessionDate};
use matchday_storage::DocumentName;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// What happens to a player removed from the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RemoveAction {
    /// Plain removal
    Remove,
    /// Removal plus a no-show entry in the discipline ledger
    NoShow,
}

/// What happens to a player taken off a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TeamRemoveAction {
    /// Slot opens; player drops back to the waiting list
    WaitingList,
    /// Slot opens; player leaves the session entirely
    Remove,
    /// As `Remove`, plus a no-show ledger entry
    NoShow,
}

/// One recorded no-show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoShowEntry {
    /// Who failed to show
    pub player: PlayerName,
    /// Session the no-show belongs to
    pub date: SessionDate,
    /// When it was recorded
    pub recorded_at: DateTime<Utc>,
}

/// The `discipline.json` document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisciplineLedger {
    /// No-show entries, append-only
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub no_shows: Vec<NoShowEntry>,
    /// Unknown keys, preserved on write
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Ownership binding for a client under a league secret
pub fn ownership_token(secret: &str, client: &ClientId) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts keys of any length");
    mac.update(client.as_str().as_bytes());
    hex_encode(&mac.finalize().into_bytes())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Player operations over session documents
#[derive(Clone)]
pub struct Players {
    sessions: Sessions,
}

impl Players {
    /// Create the manager over a sessions handle
    pub fn new(sessions: Sessions) -> Self {
        Players { sessions }
    }

    fn league_secret(&self, ctx: &RequestContext) -> Result<String> {
        match self
            .sessions
            .store()
            .get(&ctx.league, &DocumentName::Info, "ownershipSecret")?
        {
            Some(Value::String(secret)) => Ok(secret),
            Some(_) => Err(Error::io("league ownership secret is not a string")),
            None => Err(Error::not_found(format!("league {}", ctx.league))),
        }
    }

    /// May this caller act on the named entry?
    fn authorize(
        doc: &SessionDocument,
        ctx: &RequestContext,
        secret: &str,
        name: &PlayerName,
    ) -> Result<()> {
        if ctx.is_admin() {
            return Ok(());
        }
        match doc.ownership.get(name) {
            None => Ok(()),
            Some(bound) if *bound == ownership_token(secret, &ctx.client_id) => Ok(()),
            Some(_) => Err(Error::forbidden(format!(
                "{name} was added by another client"
            ))),
        }
    }

    /// Clear any team slot the player occupies
    fn vacate_team_slot(doc: &mut SessionDocument, name: &PlayerName) {
        for team in doc.teams.iter_mut() {
            for slot in team.players.iter_mut() {
                if slot.as_ref() == Some(name) {
                    *slot = None;
                }
            }
        }
    }

    /// Drop the player from both lists and release ownership
    fn drop_from_session(doc: &mut SessionDocument, name: &PlayerName) {
        doc.players.available.retain(|p| p != name);
        doc.players.waiting_list.retain(|p| p != name);
        doc.ownership.remove(name);
        Self::vacate_team_slot(doc, name);
    }

    /// Add a player to a list.
    ///
    /// Duplicates across both lists are a `Conflict`. Adding to a full
    /// `available` list implicitly demotes the newcomer to the waiting
    /// list.
    pub fn add(
        &self,
        ctx: &RequestContext,
        date: SessionDate,
        raw_name: &str,
        list: ListKind,
    ) -> Result<SessionDocument> {
        let name = PlayerName::sanitize(raw_name)?;
        let settings = self.sessions.resolved_settings(&ctx.league, date)?;
        let secret = self.league_secret(ctx)?;
        let token = ownership_token(&secret, &ctx.client_id);

        self.sessions.update(&ctx.league, date, |doc| {
            if doc.players.contains(&name) {
                return Err(Error::conflict(format!("{name} is already on the list")));
            }
            let target = match list {
                ListKind::Available
                    if doc.players.available.len() >= settings.player_limit =>
                {
                    debug!(player = %name, "available list full, demoting to waiting list");
                    ListKind::WaitingList
                }
                other => other,
            };
            doc.players.list_mut(target).push(name.clone());
            doc.ownership.insert(name.clone(), token.clone());
            Ok(doc.clone())
        })
    }

    /// Remove a player from whichever list holds them.
    ///
    /// A `NoShow` action also appends to the discipline ledger; the
    /// session and ledger files are locked together in lexical order.
    pub fn remove(
        &self,
        ctx: &RequestContext,
        date: SessionDate,
        name: &PlayerName,
        action: RemoveAction,
    ) -> Result<SessionDocument> {
        // tenant existence check before touching files
        self.sessions.resolved_settings(&ctx.league, date)?;
        let secret = self.league_secret(ctx)?;

        match action {
            RemoveAction::Remove => self.sessions.update(&ctx.league, date, |doc| {
                Self::authorize(doc, ctx, &secret, name)?;
                if !doc.players.contains(name) {
                    return Err(Error::not_found(format!("player {name}")));
                }
                Self::drop_from_session(doc, name);
                Ok(doc.clone())
            }),
            RemoveAction::NoShow => self.remove_with_no_show(ctx, date, name, &secret),
        }
    }

    fn remove_with_no_show(
        &self,
        ctx: &RequestContext,
        date: SessionDate,
        name: &PlayerName,
        secret: &str,
    ) -> Result<SessionDocument> {
        let store = self.sessions.store().clone();
        let out = store.update_pair(
            &ctx.league,
            &DocumentName::Session(date),
            &DocumentName::Discipline,
            |session_map, discipline_map| {
                let mut doc: SessionDocument = from_map(session_map)?;
                Self::authorize(&doc, ctx, secret, name)?;
                if !doc.players.contains(name) {
                    return Err(Error::not_found(format!("player {name}")));
                }
                Self::drop_from_session(&mut doc, name);

                let mut ledger: DisciplineLedger = from_map(discipline_map)?;
                ledger.no_shows.push(NoShowEntry {
                    player: name.clone(),
                    date,
                    recorded_at: ctx.now,
                });

                *session_map = to_map(&doc)?;
                *discipline_map = to_map(&ledger)?;
                Ok(doc)
            },
        )?;
        Ok(out)
    }

    /// Explicit cross-list move.
    ///
    /// Moving into a full `available` list would break the limit
    /// invariant, so it fails with `Conflict` rather than silently
    /// demoting an explicit request.
    pub fn move_between(
        &self,
        ctx: &RequestContext,
        date: SessionDate,
        name: &PlayerName,
        from: ListKind,
        to: ListKind,
    ) -> Result<SessionDocument> {
        let settings = self.sessions.resolved_settings(&ctx.league, date)?;
        let secret = self.league_secret(ctx)?;

        self.sessions.update(&ctx.league, date, |doc| {
            Self::authorize(doc, ctx, &secret, name)?;
            if doc.players.find(name) != Some(from) {
                return Err(Error::not_found(format!("player {name} in {from:?}")));
            }
            if from == to {
                return Ok(doc.clone());
            }
            if to == ListKind::Available
                && doc.players.available.len() >= settings.player_limit
            {
                return Err(Error::conflict("available list is full"));
            }
            doc.players.list_mut(from).retain(|p| p != name);
            if from == ListKind::Available {
                Self::vacate_team_slot(doc, name);
            }
            doc.players.list_mut(to).push(name.clone());
            Ok(doc.clone())
        })
    }

    /// Put an available player into a team slot.
    ///
    /// The player must be on `available` and not already placed; the team
    /// must have an open slot or room to grow under
    /// `maxPlayersPerTeam`. Teams, lists and ownership commit in one
    /// write.
    pub fn assign_to_team(
        &self,
        ctx: &RequestContext,
        date: SessionDate,
        name: &PlayerName,
        team_name: &str,
    ) -> Result<SessionDocument> {
        let settings = self.sessions.resolved_settings(&ctx.league, date)?;
        let secret = self.league_secret(ctx)?;

        self.sessions.update(&ctx.league, date, |doc| {
            Self::authorize(doc, ctx, &secret, name)?;
            if doc.players.find(name) != Some(ListKind::Available) {
                return Err(Error::conflict(format!("{name} is not available")));
            }
            if doc.team_of(name).is_some() {
                return Err(Error::conflict(format!("{name} is already on a team")));
            }
            let team = doc
                .teams
                .iter_mut()
                .find(|t| t.name == team_name)
                .ok_or_else(|| Error::not_found(format!("team {team_name}")))?;
            match team.open_slot() {
                Some(slot) => team.players[slot] = Some(name.clone()),
                None if team.players.len() < settings.max_players_per_team => {
                    team.players.push(Some(name.clone()));
                }
                None => {
                    return Err(Error::conflict(format!("team {team_name} is full")));
                }
            }
            Ok(doc.clone())
        })
    }

    /// Take a player off a team.
    ///
    /// `WaitingList` opens the slot and drops the player to the waiting
    /// list; `Remove` and `NoShow` open the slot and remove the player
    /// from the session entirely.
    pub fn remove_from_team(
        &self,
        ctx: &RequestContext,
        date: SessionDate,
        name: &PlayerName,
        team_name: &str,
        action: TeamRemoveAction,
    ) -> Result<SessionDocument> {
        self.sessions.resolved_settings(&ctx.league, date)?;
        let secret = self.league_secret(ctx)?;

        let detach = |doc: &mut SessionDocument| -> Result<()> {
            let team = doc
                .teams
                .iter_mut()
                .find(|t| t.name == team_name)
                .ok_or_else(|| Error::not_found(format!("team {team_name}")))?;
            let slot = team
                .players
                .iter()
                .position(|p| p.as_ref() == Some(name))
                .ok_or_else(|| Error::conflict(format!("{name} is not on {team_name}")))?;
            team.players[slot] = None;
            Ok(())
        };

        match action {
            TeamRemoveAction::WaitingList => self.sessions.update(&ctx.league, date, |doc| {
                Self::authorize(doc, ctx, &secret, name)?;
                detach(doc)?;
                doc.players.available.retain(|p| p != name);
                if !doc.players.waiting_list.contains(name) {
                    doc.players.waiting_list.push(name.clone());
                }
                Ok(doc.clone())
            }),
            TeamRemoveAction::Remove => self.sessions.update(&ctx.league, date, |doc| {
                Self::authorize(doc, ctx, &secret, name)?;
                detach(doc)?;
                Self::drop_from_session(doc, name);
                Ok(doc.clone())
            }),
            TeamRemoveAction::NoShow => {
                let store = self.sessions.store().clone();
                store.update_pair(
                    &ctx.league,
                    &DocumentName::Session(date),
                    &DocumentName::Discipline,
                    |session_map, discipline_map| {
                        let mut doc: SessionDocument = from_map(session_map)?;
                        Self::authorize(&doc, ctx, &secret, name)?;
                        detach(&mut doc)?;
                        Self::drop_from_session(&mut doc, name);

                        let mut ledger: DisciplineLedger = from_map(discipline_map)?;
                        ledger.no_shows.push(NoShowEntry {
                            player: name.clone(),
                            date,
                            recorded_at: ctx.now,
                        });

                        *session_map = to_map(&doc)?;
                        *discipline_map = to_map(&ledger)?;
                        Ok(doc)
                    },
                )
            }
        }
    }
}

fn from_map<T: Default + serde::de::DeserializeOwned>(map: &Map<String, Value>) -> Result<T> {
    if map.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_value(Value::Object(map.clone()))
        .map_err(|e| Error::io(format!("document model mismatch: {e}")))
}

fn to_map<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::io("document model is not a JSON object")),
        Err(e) => Err(Error::io(format!("document serialization failed: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Team;
    use chrono::TimeZone;
    use matchday_core::context::AccessLevel;
    use matchday_core::settings::LeagueSettings;
    use matchday_core::types::LeagueId;
    use matchday_storage::{JsonStore, SetOptions};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Players, RequestContext, SessionDate) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonStore::open(dir.path().join("data")).unwrap());
        let league = LeagueId::new("test-league").unwrap();

        let mut settings = LeagueSettings::default();
        settings.player_limit = 3;
        store
            .set(
                &league,
                &DocumentName::Info,
                "settings",
                serde_json::to_value(&settings).unwrap(),
                SetOptions::default(),
            )
            .unwrap();
        store
            .set(
                &league,
                &DocumentName::Info,
                "ownershipSecret",
                json!("0123456789abcdef"),
                SetOptions::default(),
            )
            .unwrap();

        let players = Players::new(Sessions::new(store));
        let ctx = RequestContext::new(
            league,
            ClientId::new("client-aaaa-0001").unwrap(),
            AccessLevel::Member,
            Utc.with_ymd_and_hms(2025, 1, 4, 9, 0, 0).unwrap(),
        );
        let date = SessionDate::parse("2025-01-04").unwrap();
        (dir, players, ctx, date)
    }

    fn other_client(ctx: &RequestContext) -> RequestContext {
        let mut other = ctx.clone();
        other.client_id = ClientId::new("client-bbbb-0002").unwrap();
        other
    }

    fn name(s: &str) -> PlayerName {
        PlayerName::sanitize(s).unwrap()
    }

    #[test]
    fn test_add_and_overflow_to_waiting_list() {
        let (_dir, players, ctx, date) = fixture();
        for p in ["Ann", "Ben", "Cal"] {
            players.add(&ctx, date, p, ListKind::Available).unwrap();
        }
        let doc = players.add(&ctx, date, "Dee", ListKind::Available).unwrap();
        assert_eq!(doc.players.available, vec![name("Ann"), name("Ben"), name("Cal")]);
        assert_eq!(doc.players.waiting_list, vec![name("Dee")]);
    }

    #[test]
    fn test_duplicate_across_lists_is_conflict() {
        let (_dir, players, ctx, date) = fixture();
        players.add(&ctx, date, "Ann", ListKind::Available).unwrap();
        let err = players
            .add(&ctx, date, " Ann ", ListKind::WaitingList)
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_unknown_league_is_not_found() {
        let (_dir, players, ctx, date) = fixture();
        let mut ghost = ctx.clone();
        ghost.league = LeagueId::new("ghost-league").unwrap();
        let err = players
            .add(&ghost, date, "Ann", ListKind::Available)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_ownership_blocks_other_clients() {
        let (_dir, players, ctx, date) = fixture();
        players.add(&ctx, date, "Ann", ListKind::Available).unwrap();

        let err = players
            .remove(&other_client(&ctx), date, &name("Ann"), RemoveAction::Remove)
            .unwrap_err();
        assert!(err.is_auth());

        // the binding client may remove
        players
            .remove(&ctx, date, &name("Ann"), RemoveAction::Remove)
            .unwrap();
    }

    #[test]
    fn test_admin_overrides_ownership() {
        let (_dir, players, ctx, date) = fixture();
        players.add(&ctx, date, "Ann", ListKind::Available).unwrap();

        let mut admin = other_client(&ctx);
        admin.access = AccessLevel::Admin;
        let doc = players
            .remove(&admin, date, &name("Ann"), RemoveAction::Remove)
            .unwrap();
        assert!(doc.players.available.is_empty());
        assert!(doc.ownership.is_empty());
    }

    #[test]
    fn test_no_show_appends_to_discipline_ledger() {
        let (_dir, players, ctx, date) = fixture();
        players.add(&ctx, date, "Ann", ListKind::Available).unwrap();
        players
            .remove(&ctx, date, &name("Ann"), RemoveAction::NoShow)
            .unwrap();

        let ledger: DisciplineLedger = players
            .sessions
            .store()
            .read_typed(&ctx.league, &DocumentName::Discipline)
            .unwrap()
            .unwrap();
        assert_eq!(ledger.no_shows.len(), 1);
        assert_eq!(ledger.no_shows[0].player, name("Ann"));
        assert_eq!(ledger.no_shows[0].date, date);
    }

    #[test]
    fn test_move_between_lists() {
        let (_dir, players, ctx, date) = fixture();
        players.add(&ctx, date, "Ann", ListKind::Available).unwrap();
        let doc = players
            .move_between(&ctx, date, &name("Ann"), ListKind::Available, ListKind::WaitingList)
            .unwrap();
        assert!(doc.players.available.is_empty());
        assert_eq!(doc.players.waiting_list, vec![name("Ann")]);

        // wrong source list
        let err = players
            .move_between(&ctx, date, &name("Ann"), ListKind::Available, ListKind::WaitingList)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_move_into_full_available_is_conflict() {
        let (_dir, players, ctx, date) = fixture();
        for p in ["Ann", "Ben", "Cal"] {
            players.add(&ctx, date, p, ListKind::Available).unwrap();
        }
        players.add(&ctx, date, "Dee", ListKind::WaitingList).unwrap();
        let err = players
            .move_between(&ctx, date, &name("Dee"), ListKind::WaitingList, ListKind::Available)
            .unwrap_err();
        assert!(err.is_conflict());
    }

    fn seed_team(players: &Players, ctx: &RequestContext, date: SessionDate) {
        players
            .sessions
            .update(&ctx.league, date, |doc| {
                doc.teams = vec![Team {
                    name: "red lions".to_string(),
                    players: vec![None, None],
                }];
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_assign_to_team() {
        let (_dir, players, ctx, date) = fixture();
        players.add(&ctx, date, "Ann", ListKind::Available).unwrap();
        players.add(&ctx, date, "Ben", ListKind::WaitingList).unwrap();
        seed_team(&players, &ctx, date);

        let doc = players
            .assign_to_team(&ctx, date, &name("Ann"), "red lions")
            .unwrap();
        assert_eq!(doc.teams[0].players[0], Some(name("Ann")));

        // waiting players are not assignable
        let err = players
            .assign_to_team(&ctx, date, &name("Ben"), "red lions")
            .unwrap_err();
        assert!(err.is_conflict());

        // double assignment is a conflict
        let err = players
            .assign_to_team(&ctx, date, &name("Ann"), "red lions")
            .unwrap_err();
        assert!(err.is_conflict());

        let err = players
            .assign_to_team(&ctx, date, &name("Ann"), "blue wolves")
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_remove_from_team_to_waiting_list() {
        let (_dir, players, ctx, date) = fixture();
        players.add(&ctx, date, "Ann", ListKind::Available).unwrap();
        seed_team(&players, &ctx, date);
        players
            .assign_to_team(&ctx, date, &name("Ann"), "red lions")
            .unwrap();

        let doc = players
            .remove_from_team(&ctx, date, &name("Ann"), "red lions", TeamRemoveAction::WaitingList)
            .unwrap();
        assert_eq!(doc.teams[0].players[0], None);
        assert_eq!(doc.players.waiting_list, vec![name("Ann")]);
        assert!(doc.players.available.is_empty());
    }

    #[test]
    fn test_remove_from_team_no_show_clears_session() {
        let (_dir, players, ctx, date) = fixture();
        players.add(&ctx, date, "Ann", ListKind::Available).unwrap();
        seed_team(&players, &ctx, date);
        players
            .assign_to_team(&ctx, date, &name("Ann"), "red lions")
            .unwrap();

        let doc = players
            .remove_from_team(&ctx, date, &name("Ann"), "red lions", TeamRemoveAction::NoShow)
            .unwrap();
        assert_eq!(doc.teams[0].players[0], None);
        assert!(doc.players.available.is_empty());
        assert!(doc.ownership.is_empty());

        let ledger: DisciplineLedger = players
            .sessions
            .store()
            .read_typed(&ctx.league, &DocumentName::Discipline)
            .unwrap()
            .unwrap();
        assert_eq!(ledger.no_shows.len(), 1);
    }

    #[test]
    fn test_removing_assigned_player_vacates_slot() {
        let (_dir, players, ctx, date) = fixture();
        players.add(&ctx, date, "Ann", ListKind::Available).unwrap();
        seed_team(&players, &ctx, date);
        players
            .assign_to_team(&ctx, date, &name("Ann"), "red lions")
            .unwrap();

        let doc = players
            .remove(&ctx, date, &name("Ann"), RemoveAction::Remove)
            .unwrap();
        assert_eq!(doc.teams[0].players, vec![None, None]);
    }

    #[test]
    fn test_ownership_token_is_stable_per_client() {
        let a = ClientId::new("client-aaaa-0001").unwrap();
        let b = ClientId::new("client-bbbb-0002").unwrap();
        assert_eq!(ownership_token("secret", &a), ownership_token("secret", &a));
        assert_ne!(ownership_token("secret", &a), ownership_token("secret", &b));
        assert_ne!(ownership_token("secret", &a), ownership_token("other", &a));
    }
}
