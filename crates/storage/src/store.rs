//! Per-league JSON document store
//!
//! Documents are plain JSON objects on disk under `data/<leagueId>/`:
//!
//! - `info.json`: league document
//! - `YYYY-MM-DD.json`: one session per date
//! - `rankings-YYYY.json`: recomputed ranking output
//! - `discipline.json`: no-show ledger
//!
//! Every read-modify-write holds the file's mutex from [`PathLocks`] for
//! the entire operation, including the temp-file rename. Pure reads take
//! the mutex too, so a reader never observes a torn write. Writes go
//! through write-fsync-rename: either the complete new document is visible
//! or the old one still is.
//!
//! A document that fails to parse is surfaced as [`Error::Parse`] and is
//! never written over; the corrupt bytes stay on disk for inspection.

use crate::locks::PathLocks;
use matchday_core::error::{Error, Result};
use matchday_core::types::{LeagueId, SessionDate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Addressable documents within one league directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentName {
    /// `info.json`
    Info,
    /// `YYYY-MM-DD.json`
    Session(SessionDate),
    /// `rankings-YYYY.json`
    Rankings(i32),
    /// `discipline.json`
    Discipline,
}

impl DocumentName {
    /// File name of this document inside the league directory
    pub fn file_name(&self) -> String {
        match self {
            DocumentName::Info => "info.json".to_string(),
            DocumentName::Session(date) => format!("{date}.json"),
            DocumentName::Rankings(year) => format!("rankings-{year}.json"),
            DocumentName::Discipline => "discipline.json".to_string(),
        }
    }
}

/// Options for [`JsonStore::set`]
#[derive(Debug, Clone)]
pub struct SetOptions {
    /// Seed value for the key when it is absent, applied before the write
    pub default: Option<Value>,
    /// Assign the value even when the key already exists (true) or only
    /// when absent (false)
    pub overwrite: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        SetOptions {
            default: None,
            overwrite: true,
        }
    }
}

/// Selector for [`JsonStore::remove`]
#[derive(Debug, Clone)]
pub enum RemoveSelector {
    /// Remove a sub-key of an object value
    SubKey(String),
    /// Remove the element at an index of an array value
    Index(usize),
    /// Remove the first exactly-equal element of an array value
    Value(Value),
}

/// One mutation in a [`JsonStore::apply`] batch
#[derive(Debug, Clone)]
pub enum StoreOp {
    /// Set `doc[key]`, with the same semantics as [`JsonStore::set`]
    Set {
        /// Top-level key
        key: String,
        /// Value to assign
        value: Value,
        /// Seed for an absent key
        default: Option<Value>,
        /// Assign over an existing value
        overwrite: bool,
    },
    /// Remove `doc[key]` or part of it
    Remove {
        /// Top-level key
        key: String,
        /// Optional part selector; `None` removes the whole key
        selector: Option<RemoveSelector>,
    },
}

impl StoreOp {
    /// Plain overwriting set
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        StoreOp::Set {
            key: key.into(),
            value,
            default: None,
            overwrite: true,
        }
    }

    /// Set only when the key is absent
    pub fn set_if_absent(key: impl Into<String>, value: Value) -> Self {
        StoreOp::Set {
            key: key.into(),
            value,
            default: None,
            overwrite: false,
        }
    }

    /// Remove a whole key
    pub fn remove(key: impl Into<String>) -> Self {
        StoreOp::Remove {
            key: key.into(),
            selector: None,
        }
    }

    /// Remove part of a key's value
    pub fn remove_selected(key: impl Into<String>, selector: RemoveSelector) -> Self {
        StoreOp::Remove {
            key: key.into(),
            selector: Some(selector),
        }
    }
}

/// File-backed JSON store rooted at the data directory
pub struct JsonStore {
    root: PathBuf,
    locks: PathLocks,
}

impl JsonStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(JsonStore {
            root,
            locks: PathLocks::new(),
        })
    }

    /// Data root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The keyed mutex registry backing this store
    pub fn locks(&self) -> &PathLocks {
        &self.locks
    }

    /// Directory holding one league's documents
    pub fn league_dir(&self, league: &LeagueId) -> PathBuf {
        self.root.join(league.as_str())
    }

    /// Absolute path of a document
    pub fn document_path(&self, league: &LeagueId, doc: &DocumentName) -> PathBuf {
        self.league_dir(league).join(doc.file_name())
    }

    /// True when the document file exists
    pub fn exists(&self, league: &LeagueId, doc: &DocumentName) -> bool {
        self.document_path(league, doc).is_file()
    }

    // =========================================================================
    // Key-level operations
    // =========================================================================

    /// Read one top-level key; `None` when the document or key is absent
    pub fn get(&self, league: &LeagueId, doc: &DocumentName, key: &str) -> Result<Option<Value>> {
        let path = self.document_path(league, doc);
        self.locks.with_lock(&path, || {
            Ok(read_map(&path)?.and_then(|map| map.get(key).cloned()))
        })
    }

    /// Set one top-level key and write the document atomically
    pub fn set(
        &self,
        league: &LeagueId,
        doc: &DocumentName,
        key: &str,
        value: Value,
        options: SetOptions,
    ) -> Result<()> {
        self.apply(
            league,
            doc,
            vec![StoreOp::Set {
                key: key.to_string(),
                value,
                default: options.default,
                overwrite: options.overwrite,
            }],
        )
    }

    /// Remove a key, an indexed element, or an exact value; no-op if absent
    pub fn remove(
        &self,
        league: &LeagueId,
        doc: &DocumentName,
        key: &str,
        selector: Option<RemoveSelector>,
    ) -> Result<()> {
        self.apply(
            league,
            doc,
            vec![StoreOp::Remove {
                key: key.to_string(),
                selector,
            }],
        )
    }

    /// Apply an ordered list of mutations under one mutex hold and one
    /// atomic write.
    ///
    /// This is the only race-free way to mutate multiple related keys of
    /// the same document. Failure at any step aborts the whole batch and
    /// leaves the file unchanged.
    pub fn apply(&self, league: &LeagueId, doc: &DocumentName, ops: Vec<StoreOp>) -> Result<()> {
        self.update(league, doc, |map| {
            for op in &ops {
                apply_op(map, op);
            }
            Ok(())
        })
    }

    // =========================================================================
    // Document-level operations
    // =========================================================================

    /// Read a whole document under its mutex; `None` when absent
    pub fn read_document(
        &self,
        league: &LeagueId,
        doc: &DocumentName,
    ) -> Result<Option<Map<String, Value>>> {
        let path = self.document_path(league, doc);
        self.locks.with_lock(&path, || read_map(&path))
    }

    /// Read a whole document into a typed model; `None` when absent
    pub fn read_typed<D: DeserializeOwned>(
        &self,
        league: &LeagueId,
        doc: &DocumentName,
    ) -> Result<Option<D>> {
        let path = self.document_path(league, doc);
        self.locks.with_lock(&path, || {
            read_map(&path)?
                .map(|map| {
                    serde_json::from_value(Value::Object(map))
                        .map_err(|e| Error::parse(&path, e.to_string()))
                })
                .transpose()
        })
    }

    /// Read-modify-write a whole document under its mutex.
    ///
    /// The document is loaded (or starts as `{}`), `f` mutates it, and the
    /// result is written atomically. An error from `f` aborts without
    /// writing.
    pub fn update<T>(
        &self,
        league: &LeagueId,
        doc: &DocumentName,
        f: impl FnOnce(&mut Map<String, Value>) -> Result<T>,
    ) -> Result<T> {
        let path = self.document_path(league, doc);
        self.locks.with_lock(&path, || {
            let mut map = read_map(&path)?.unwrap_or_default();
            let out = f(&mut map)?;
            write_map_atomic(&path, &map)?;
            Ok(out)
        })
    }

    /// Typed variant of [`JsonStore::update`].
    ///
    /// `D` should carry a `#[serde(flatten)]` map when unknown top-level
    /// keys must round-trip.
    pub fn update_typed<D, T>(
        &self,
        league: &LeagueId,
        doc: &DocumentName,
        f: impl FnOnce(&mut D) -> Result<T>,
    ) -> Result<T>
    where
        D: Default + Serialize + DeserializeOwned,
    {
        let path = self.document_path(league, doc);
        self.update(league, doc, |map| {
            let mut model: D = if map.is_empty() {
                D::default()
            } else {
                serde_json::from_value(Value::Object(map.clone()))
                    .map_err(|e| Error::parse(&path, e.to_string()))?
            };
            let out = f(&mut model)?;
            match serde_json::to_value(&model) {
                Ok(Value::Object(updated)) => {
                    *map = updated;
                    Ok(out)
                }
                Ok(_) => Err(Error::io("document model is not a JSON object")),
                Err(e) => Err(Error::io(format!("document serialization failed: {e}"))),
            }
        })
    }

    /// Read-modify-write two documents of one league, mutexes acquired in
    /// lexical path order.
    ///
    /// No atomicity is promised across the two files; each file is still
    /// written atomically on its own.
    pub fn update_pair<T>(
        &self,
        league: &LeagueId,
        doc_a: &DocumentName,
        doc_b: &DocumentName,
        f: impl FnOnce(&mut Map<String, Value>, &mut Map<String, Value>) -> Result<T>,
    ) -> Result<T> {
        let path_a = self.document_path(league, doc_a);
        let path_b = self.document_path(league, doc_b);
        self.locks.with_lock_pair(&path_a, &path_b, || {
            let mut map_a = read_map(&path_a)?.unwrap_or_default();
            let mut map_b = read_map(&path_b)?.unwrap_or_default();
            let out = f(&mut map_a, &mut map_b)?;
            write_map_atomic(&path_a, &map_a)?;
            write_map_atomic(&path_b, &map_b)?;
            Ok(out)
        })
    }

    /// Session dates present in a league directory, ascending.
    ///
    /// Only file names matching the canonical `YYYY-MM-DD.json` shape are
    /// considered; everything else in the directory is ignored.
    pub fn list_session_dates(&self, league: &LeagueId) -> Result<Vec<SessionDate>> {
        let dir = self.league_dir(league);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut dates = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(stem) = name.strip_suffix(".json") {
                if let Ok(date) = SessionDate::parse(stem) {
                    dates.push(date);
                }
            }
        }
        dates.sort();
        Ok(dates)
    }

    /// Years with a `rankings-YYYY.json` in a league directory, ascending
    pub fn list_ranking_years(&self, league: &LeagueId) -> Result<Vec<i32>> {
        let dir = self.league_dir(league);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut years = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(year) = name
                .strip_prefix("rankings-")
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|y| y.parse::<i32>().ok())
            {
                years.push(year);
            }
        }
        years.sort_unstable();
        Ok(years)
    }
}

fn apply_op(map: &mut Map<String, Value>, op: &StoreOp) {
    match op {
        StoreOp::Set {
            key,
            value,
            default,
            overwrite,
        } => {
            if let Some(default) = default {
                if !map.contains_key(key) {
                    map.insert(key.clone(), default.clone());
                }
            }
            if *overwrite || !map.contains_key(key) {
                map.insert(key.clone(), value.clone());
            }
        }
        StoreOp::Remove { key, selector } => match selector {
            None => {
                map.remove(key);
            }
            Some(RemoveSelector::SubKey(sub)) => {
                if let Some(Value::Object(obj)) = map.get_mut(key) {
                    obj.remove(sub);
                }
            }
            Some(RemoveSelector::Index(index)) => {
                if let Some(Value::Array(arr)) = map.get_mut(key) {
                    if *index < arr.len() {
                        arr.remove(*index);
                    }
                }
            }
            Some(RemoveSelector::Value(needle)) => {
                if let Some(Value::Array(arr)) = map.get_mut(key) {
                    if let Some(pos) = arr.iter().position(|v| v == needle) {
                        arr.remove(pos);
                    }
                }
            }
        },
    }
}

/// Load a document as a JSON object map.
///
/// Missing file is `None`. A file that exists but does not parse as a JSON
/// object is a `Parse` error; callers must not write over it.
fn read_map(path: &Path) -> Result<Option<Map<String, Value>>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(_) => {
            warn!(path = %path.display(), "document is not a JSON object");
            Err(Error::parse(path, "top-level value is not an object"))
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt document");
            Err(Error::parse(path, e.to_string()))
        }
    }
}

/// Removes the temp file on drop unless the rename happened.
struct TempGuard<'a> {
    path: &'a Path,
    armed: bool,
}

impl Drop for TempGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(self.path);
        }
    }
}

/// Write a document via write-fsync-rename.
///
/// Either the complete new document is visible at `path` or the previous
/// bytes still are. The temp file is deleted on every failure path after
/// its creation.
fn write_map_atomic(path: &Path, map: &Map<String, Value>) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::io(format!("document path has no parent: {}", path.display())))?;
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::io(format!("bad document path: {}", path.display())))?;
    let temp_path = parent.join(format!(".{file_name}.tmp"));

    let mut guard = TempGuard {
        path: &temp_path,
        armed: true,
    };

    // File::create truncates a stale temp left behind by a crashed
    // process; the path mutex excludes a live concurrent writer.
    let bytes = serde_json::to_vec_pretty(&Value::Object(map.clone()))
        .map_err(|e| Error::io(format!("document serialization failed: {e}")))?;
    let mut file = File::create(&temp_path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)?;
    guard.armed = false;

    // Durability of the rename itself; best-effort on platforms where
    // directories cannot be opened.
    if let Ok(dir) = File::open(parent) {
        let _ = dir.sync_all();
    }

    debug!(path = %path.display(), bytes = bytes.len(), "document written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, JsonStore, LeagueId) {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path().join("data")).unwrap();
        let league = LeagueId::new("test-league").unwrap();
        (dir, store, league)
    }

    fn session_doc() -> DocumentName {
        DocumentName::Session(SessionDate::parse("2025-01-04").unwrap())
    }

    #[test]
    fn test_get_missing_document_is_none() {
        let (_dir, store, league) = store();
        assert_eq!(store.get(&league, &session_doc(), "players").unwrap(), None);
    }

    #[test]
    fn test_set_then_get_roundtrip() {
        let (_dir, store, league) = store();
        let doc = session_doc();
        store
            .set(
                &league,
                &doc,
                "players",
                json!({"available": ["Ann"], "waitingList": []}),
                SetOptions::default(),
            )
            .unwrap();
        let value = store.get(&league, &doc, "players").unwrap().unwrap();
        assert_eq!(value["available"][0], "Ann");
    }

    #[test]
    fn test_set_if_absent_does_not_overwrite() {
        let (_dir, store, league) = store();
        let doc = session_doc();
        store
            .set(&league, &doc, "k", json!(1), SetOptions::default())
            .unwrap();
        store
            .set(
                &league,
                &doc,
                "k",
                json!(2),
                SetOptions {
                    default: None,
                    overwrite: false,
                },
            )
            .unwrap();
        assert_eq!(store.get(&league, &doc, "k").unwrap().unwrap(), json!(1));
    }

    #[test]
    fn test_default_seeds_missing_key() {
        let (_dir, store, league) = store();
        let doc = session_doc();
        // default seeds, overwrite=false keeps the seed
        store
            .set(
                &league,
                &doc,
                "settings",
                json!({"playerLimit": 10}),
                SetOptions {
                    default: Some(json!({})),
                    overwrite: false,
                },
            )
            .unwrap();
        assert_eq!(
            store.get(&league, &doc, "settings").unwrap().unwrap(),
            json!({})
        );
    }

    #[test]
    fn test_remove_selectors() {
        let (_dir, store, league) = store();
        let doc = session_doc();
        store
            .set(
                &league,
                &doc,
                "ownership",
                json!({"Ann": "aa", "Ben": "bb"}),
                SetOptions::default(),
            )
            .unwrap();
        store
            .set(
                &league,
                &doc,
                "list",
                json!(["a", "b", "c"]),
                SetOptions::default(),
            )
            .unwrap();

        store
            .remove(
                &league,
                &doc,
                "ownership",
                Some(RemoveSelector::SubKey("Ann".into())),
            )
            .unwrap();
        assert_eq!(
            store.get(&league, &doc, "ownership").unwrap().unwrap(),
            json!({"Ben": "bb"})
        );

        store
            .remove(&league, &doc, "list", Some(RemoveSelector::Index(1)))
            .unwrap();
        assert_eq!(
            store.get(&league, &doc, "list").unwrap().unwrap(),
            json!(["a", "c"])
        );

        store
            .remove(
                &league,
                &doc,
                "list",
                Some(RemoveSelector::Value(json!("c"))),
            )
            .unwrap();
        assert_eq!(
            store.get(&league, &doc, "list").unwrap().unwrap(),
            json!(["a"])
        );

        // removing something absent is a no-op
        store
            .remove(&league, &doc, "nope", None)
            .unwrap();
        store
            .remove(&league, &doc, "list", Some(RemoveSelector::Index(99)))
            .unwrap();
    }

    #[test]
    fn test_apply_batch_is_ordered() {
        let (_dir, store, league) = store();
        let doc = session_doc();
        store
            .apply(
                &league,
                &doc,
                vec![
                    StoreOp::set("k", json!(1)),
                    StoreOp::set("k", json!(2)),
                    StoreOp::remove("gone"),
                ],
            )
            .unwrap();
        assert_eq!(store.get(&league, &doc, "k").unwrap().unwrap(), json!(2));
    }

    #[test]
    fn test_update_failure_leaves_file_unchanged() {
        let (_dir, store, league) = store();
        let doc = session_doc();
        store
            .set(&league, &doc, "k", json!("before"), SetOptions::default())
            .unwrap();
        let path = store.document_path(&league, &doc);
        let before = fs::read(&path).unwrap();

        let result: Result<()> = store.update(&league, &doc, |map| {
            map.insert("k".into(), json!("after"));
            Err(Error::conflict("abort the batch"))
        });
        assert!(result.is_err());
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_corrupt_document_surfaces_parse_and_is_preserved() {
        let (_dir, store, league) = store();
        let doc = session_doc();
        let path = store.document_path(&league, &doc);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"{ not json").unwrap();

        let err = store.get(&league, &doc, "k").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));

        // a write attempt must not clobber the corrupt file
        let err = store
            .set(&league, &doc, "k", json!(1), SetOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"{ not json");
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let (_dir, store, league) = store();
        let doc = session_doc();
        store
            .set(&league, &doc, "k", json!(1), SetOptions::default())
            .unwrap();
        let dir = store.league_dir(&league);
        let leftovers: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_update_typed_preserves_unknown_keys() {
        #[derive(Default, Serialize, Deserialize)]
        struct Partial {
            #[serde(default)]
            count: u32,
            #[serde(flatten)]
            extra: Map<String, Value>,
        }

        let (_dir, store, league) = store();
        let doc = session_doc();
        store
            .set(&league, &doc, "mystery", json!({"kept": true}), SetOptions::default())
            .unwrap();
        store
            .update_typed::<Partial, _>(&league, &doc, |p| {
                p.count += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(
            store.get(&league, &doc, "mystery").unwrap().unwrap(),
            json!({"kept": true})
        );
        assert_eq!(store.get(&league, &doc, "count").unwrap().unwrap(), json!(1));
    }

    #[test]
    fn test_list_session_dates_filters_and_sorts() {
        let (_dir, store, league) = store();
        for date in ["2025-03-01", "2025-01-04", "2025-02-08"] {
            store
                .set(
                    &league,
                    &DocumentName::Session(SessionDate::parse(date).unwrap()),
                    "k",
                    json!(1),
                    SetOptions::default(),
                )
                .unwrap();
        }
        // non-session files in the same directory are ignored
        store
            .set(&league, &DocumentName::Info, "id", json!("x"), SetOptions::default())
            .unwrap();
        store
            .set(&league, &DocumentName::Rankings(2025), "players", json!({}), SetOptions::default())
            .unwrap();

        let dates: Vec<String> = store
            .list_session_dates(&league)
            .unwrap()
            .iter()
            .map(|d| d.to_string())
            .collect();
        assert_eq!(dates, vec!["2025-01-04", "2025-02-08", "2025-03-01"]);
    }

    #[test]
    fn test_list_session_dates_missing_league_is_empty() {
        let (_dir, store, _league) = store();
        let ghost = LeagueId::new("ghost-league").unwrap();
        assert!(store.list_session_dates(&ghost).unwrap().is_empty());
    }
}
