//! League directory
//!
//! Tenant resolution, league creation and credential management. A league
//! is a directory under the data root with an `info.json` document; the
//! first label of the request host names it.
//!
//! Access codes are `XXXX-XXXX-XXXX` groups of uppercase alphanumerics.
//! Rotation goes through a single-use reset code that is stored hashed and
//! handed back to the caller for email delivery (the mailer is outside the
//! core).

use crate::players::ownership_token;
use crate::session::Sessions;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use matchday_core::context::{AccessLevel, RequestContext};
use matchday_core::error::{Error, Result};
use matchday_core::settings::LeagueSettings;
use matchday_core::types::{ClientId, LeagueId};
use matchday_storage::{DocumentName, JsonStore};
use once_cell::sync::Lazy;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

/// Subdomain labels that can never be leagues
pub static RESERVED_NAMES: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    [
        "www", "api", "admin", "app", "mail", "smtp", "data", "static", "assets", "cdn", "test",
        "staging", "dev", "support", "help", "status",
    ]
    .into_iter()
    .collect()
});

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// How long an issued reset code stays redeemable
const RESET_CODE_TTL_MINUTES: i64 = 60;

/// Pending access-code reset, stored hashed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetCode {
    /// SHA-256 hex of the issued code
    pub code_hash: String,
    /// Issue time; codes expire after an hour
    pub issued_at: DateTime<Utc>,
}

/// The `info.json` league document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct League {
    /// Tenant id and subdomain label
    pub id: LeagueId,
    /// Human-facing name
    pub display_name: String,
    /// Optional emoji or short icon string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Member credential
    pub access_code: String,
    /// Admin credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_code: Option<String>,
    /// Owner contact for access-code resets
    pub owner_email: String,
    /// Secret keying the player ownership HMAC
    pub ownership_secret: String,
    /// Pending reset, if one was issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_code: Option<ResetCode>,
    /// Creation time
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    /// League default settings
    #[serde(default)]
    pub settings: LeagueSettings,
    /// Unknown keys, preserved on write
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Compare two byte strings without an early exit on the first mismatch
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Resolve the tenant from a request host.
///
/// The first DNS label is the league id; it must be a valid subdomain
/// shape and not a reserved name. The port, if any, is ignored.
pub fn league_from_host(host: &str) -> Result<LeagueId> {
    let without_port = host.split(':').next().unwrap_or_default();
    let label = without_port
        .split('.')
        .next()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| Error::validation(format!("host {host:?} has no league label")))?;
    let label = label.to_ascii_lowercase();
    if RESERVED_NAMES.contains(label.as_str()) {
        return Err(Error::validation(format!("league name {label:?} is reserved")));
    }
    LeagueId::new(label)
}

fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn generate_code(rng: &mut impl Rng) -> String {
    (0..3)
        .map(|_| {
            (0..4)
                .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn generate_secret(rng: &mut impl Rng) -> String {
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes[..]);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Directory of leagues under the data root
pub struct LeagueDirectory {
    store: Arc<JsonStore>,
    sessions: Sessions,
    /// Positive existence cache; the info file is only locked during
    /// create and reset
    existence: DashMap<LeagueId, ()>,
}

impl LeagueDirectory {
    /// Create the directory over the store
    pub fn new(store: Arc<JsonStore>, sessions: Sessions) -> Self {
        LeagueDirectory {
            store,
            sessions,
            existence: DashMap::new(),
        }
    }

    /// True when the league has an `info.json`
    pub fn exists(&self, league: &LeagueId) -> bool {
        if self.existence.contains_key(league) {
            return true;
        }
        let present = self.store.exists(league, &DocumentName::Info);
        if present {
            self.existence.insert(league.clone(), ());
        }
        present
    }

    /// Load a league document
    pub fn load(&self, league: &LeagueId) -> Result<League> {
        self.store
            .read_typed(league, &DocumentName::Info)?
            .ok_or_else(|| Error::not_found(format!("league {league}")))
    }

    /// Create a league with fresh credentials.
    ///
    /// Returns the stored document; `access_code` and `admin_code` in it
    /// are the only copies the caller will ever see in plain text.
    pub fn create(
        &self,
        id: &LeagueId,
        display_name: &str,
        owner_email: &str,
        icon: Option<String>,
        now: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> Result<League> {
        if RESERVED_NAMES.contains(id.as_str()) {
            return Err(Error::validation(format!("league name {id:?} is reserved")));
        }
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(Error::validation("display name is empty"));
        }
        if !owner_email.contains('@') {
            return Err(Error::validation("owner email is invalid"));
        }

        let league = League {
            id: id.clone(),
            display_name: display_name.to_string(),
            icon,
            access_code: generate_code(rng),
            admin_code: Some(generate_code(rng)),
            owner_email: owner_email.to_string(),
            ownership_secret: generate_secret(rng),
            reset_code: None,
            created_at: now,
            settings: LeagueSettings::default(),
            extra: Map::new(),
        };

        // existence check and write under the info-file mutex so two
        // concurrent creates cannot both win
        let stored = league.clone();
        self.store.update(id, &DocumentName::Info, move |map| {
            if !map.is_empty() {
                return Err(Error::conflict(format!("league {} already exists", stored.id)));
            }
            *map = league_to_map(&stored)?;
            Ok(())
        })?;

        self.existence.insert(id.clone(), ());
        info!(league = %id, "league created");
        Ok(league)
    }

    /// Check a presented code and grant an access level.
    ///
    /// The admin code, when configured, grants `Admin`; the access code
    /// grants `Member`; anything else is `Forbidden`. Comparisons are
    /// constant-time.
    pub fn authenticate(&self, league: &LeagueId, code: &str) -> Result<AccessLevel> {
        let doc = self.load(league)?;
        if let Some(admin) = &doc.admin_code {
            if constant_time_eq(admin.as_bytes(), code.as_bytes()) {
                return Ok(AccessLevel::Admin);
            }
        }
        if constant_time_eq(doc.access_code.as_bytes(), code.as_bytes()) {
            return Ok(AccessLevel::Member);
        }
        Err(Error::forbidden("invalid access code"))
    }

    /// Ownership token for a client under this league's secret
    pub fn client_token(&self, league: &LeagueId, client: &ClientId) -> Result<String> {
        let doc = self.load(league)?;
        Ok(ownership_token(&doc.ownership_secret, client))
    }

    /// Issue a single-use reset code after verifying the owner email.
    ///
    /// The plain code is returned for delivery; only its hash is stored.
    pub fn issue_reset_code(
        &self,
        league: &LeagueId,
        owner_email: &str,
        now: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> Result<String> {
        let code = generate_code(rng);
        let hash = sha256_hex(&code);
        self.with_league(league, |doc| {
            if !doc.owner_email.eq_ignore_ascii_case(owner_email.trim()) {
                return Err(Error::forbidden("owner email does not match"));
            }
            doc.reset_code = Some(ResetCode {
                code_hash: hash.clone(),
                issued_at: now,
            });
            Ok(())
        })?;
        info!(league = %league, "reset code issued");
        Ok(code)
    }

    /// Redeem a reset code and rotate the access code.
    ///
    /// The reset code is single use and expires an hour after issue.
    /// Returns the new access code.
    pub fn reset_access_code(
        &self,
        league: &LeagueId,
        reset_code: &str,
        now: DateTime<Utc>,
        rng: &mut impl Rng,
    ) -> Result<String> {
        let new_code = generate_code(rng);
        let presented_hash = sha256_hex(reset_code);
        let rotated = new_code.clone();
        self.with_league(league, move |doc| {
            let pending = doc
                .reset_code
                .take()
                .ok_or_else(|| Error::forbidden("no reset code was issued"))?;
            if now - pending.issued_at > Duration::minutes(RESET_CODE_TTL_MINUTES) {
                return Err(Error::forbidden("reset code has expired"));
            }
            if !constant_time_eq(pending.code_hash.as_bytes(), presented_hash.as_bytes()) {
                return Err(Error::forbidden("invalid reset code"));
            }
            doc.access_code = rotated;
            Ok(())
        })?;
        info!(league = %league, "access code rotated");
        Ok(new_code)
    }

    /// Replace the league default settings (admin only)
    pub fn update_settings(
        &self,
        ctx: &RequestContext,
        settings: LeagueSettings,
    ) -> Result<League> {
        if !ctx.is_admin() {
            return Err(Error::forbidden("settings changes require the admin code"));
        }
        let updated = self.with_league(&ctx.league, move |doc| {
            doc.settings = settings;
            Ok(())
        })?;
        self.sessions.invalidate_league(&ctx.league);
        Ok(updated)
    }

    /// Read-modify-write the league document under its mutex
    fn with_league(
        &self,
        league: &LeagueId,
        f: impl FnOnce(&mut League) -> Result<()>,
    ) -> Result<League> {
        let league_id = league.clone();
        self.store.update(league, &DocumentName::Info, move |map| {
            if map.is_empty() {
                return Err(Error::not_found(format!("league {league_id}")));
            }
            let mut doc: League = serde_json::from_value(Value::Object(map.clone()))
                .map_err(|e| Error::io(format!("league document mismatch: {e}")))?;
            f(&mut doc)?;
            *map = league_to_map(&doc)?;
            Ok(doc)
        })
    }
}

fn league_to_map(league: &League) -> Result<Map<String, Value>> {
    match serde_json::to_value(league) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::io("league document is not a JSON object")),
        Err(e) => Err(Error::io(format!("league serialization failed: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn directory() -> (TempDir, LeagueDirectory) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonStore::open(dir.path().join("data")).unwrap());
        let sessions = Sessions::new(Arc::clone(&store));
        (dir, LeagueDirectory::new(store, sessions))
    }

    fn league_id(s: &str) -> LeagueId {
        LeagueId::new(s).unwrap()
    }

    #[test]
    fn test_league_from_host() {
        assert_eq!(
            league_from_host("sunday-league.example.com").unwrap(),
            league_id("sunday-league")
        );
        assert_eq!(
            league_from_host("Sunday-League.example.com:8443").unwrap(),
            league_id("sunday-league")
        );
        assert!(league_from_host("www.example.com").is_err());
        assert!(league_from_host("api.example.com").is_err());
        assert!(league_from_host("ab.example.com").is_err());
        assert!(league_from_host(".example.com").is_err());
    }

    #[test]
    fn test_access_code_format() {
        let mut rng = StdRng::seed_from_u64(1);
        let code = generate_code(&mut rng);
        assert_eq!(code.len(), 14);
        let groups: Vec<&str> = code.split('-').collect();
        assert_eq!(groups.len(), 3);
        for group in groups {
            assert_eq!(group.len(), 4);
            assert!(group
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_create_and_duplicate() {
        let (_dir, directory) = directory();
        let id = league_id("sunday-league");
        let mut rng = StdRng::seed_from_u64(2);

        let league = directory
            .create(&id, "Sunday League", "owner@example.com", None, Utc::now(), &mut rng)
            .unwrap();
        assert_eq!(league.id, id);
        assert!(directory.exists(&id));
        assert_eq!(league.ownership_secret.len(), 64);

        let err = directory
            .create(&id, "Again", "owner@example.com", None, Utc::now(), &mut rng)
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_create_validations() {
        let (_dir, directory) = directory();
        let mut rng = StdRng::seed_from_u64(3);
        assert!(directory
            .create(&league_id("www"), "X", "a@b.c", None, Utc::now(), &mut rng)
            .unwrap_err()
            .is_validation());
        assert!(directory
            .create(&league_id("ok-league"), "  ", "a@b.c", None, Utc::now(), &mut rng)
            .unwrap_err()
            .is_validation());
        assert!(directory
            .create(&league_id("ok-league"), "Ok", "not-an-email", None, Utc::now(), &mut rng)
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_authenticate_levels() {
        let (_dir, directory) = directory();
        let id = league_id("sunday-league");
        let mut rng = StdRng::seed_from_u64(4);
        let league = directory
            .create(&id, "Sunday League", "owner@example.com", None, Utc::now(), &mut rng)
            .unwrap();

        assert_eq!(
            directory.authenticate(&id, &league.access_code).unwrap(),
            AccessLevel::Member
        );
        assert_eq!(
            directory
                .authenticate(&id, league.admin_code.as_deref().unwrap())
                .unwrap(),
            AccessLevel::Admin
        );
        assert!(directory
            .authenticate(&id, "WRNG-WRNG-WRNG")
            .unwrap_err()
            .is_auth());
        assert!(directory
            .authenticate(&league_id("ghost-league"), "AAAA-BBBB-CCCC")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_reset_code_flow() {
        let (_dir, directory) = directory();
        let id = league_id("sunday-league");
        let mut rng = StdRng::seed_from_u64(5);
        let league = directory
            .create(&id, "Sunday League", "owner@example.com", None, Utc::now(), &mut rng)
            .unwrap();

        // wrong owner email is rejected
        assert!(directory
            .issue_reset_code(&id, "stranger@example.com", Utc::now(), &mut rng)
            .unwrap_err()
            .is_auth());

        let issued_at = Utc::now();
        let reset = directory
            .issue_reset_code(&id, "Owner@Example.com", issued_at, &mut rng)
            .unwrap();

        // a wrong code is rejected; the abort leaves the pending reset intact
        assert!(directory
            .reset_access_code(&id, "AAAA-BBBB-CCCC", issued_at, &mut rng)
            .unwrap_err()
            .is_auth());

        // the real code redeems and rotates
        let rotated = directory
            .reset_access_code(&id, &reset, issued_at, &mut rng)
            .unwrap();

        // single use: redeeming again fails
        assert!(directory
            .reset_access_code(&id, &reset, issued_at, &mut rng)
            .unwrap_err()
            .is_auth());
        assert_ne!(rotated, league.access_code);
        assert_eq!(
            directory.authenticate(&id, &rotated).unwrap(),
            AccessLevel::Member
        );
        assert!(directory
            .authenticate(&id, &league.access_code)
            .unwrap_err()
            .is_auth());
    }

    #[test]
    fn test_reset_code_expires() {
        let (_dir, directory) = directory();
        let id = league_id("sunday-league");
        let mut rng = StdRng::seed_from_u64(6);
        directory
            .create(&id, "Sunday League", "owner@example.com", None, Utc::now(), &mut rng)
            .unwrap();

        let issued_at = Utc::now();
        let reset = directory
            .issue_reset_code(&id, "owner@example.com", issued_at, &mut rng)
            .unwrap();
        let too_late = issued_at + Duration::minutes(RESET_CODE_TTL_MINUTES + 1);
        assert!(directory
            .reset_access_code(&id, &reset, too_late, &mut rng)
            .unwrap_err()
            .is_auth());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }
}
