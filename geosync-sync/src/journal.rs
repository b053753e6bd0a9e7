//! Journal store: the last confirmed remote state per unique id.
//!
//! Persists a [`Journal`] JSON document next to the record source, by default
//! at `<csv_file>.log`. Writes use an atomic `.tmp` + rename.
//!
//! Journals written by the original GeoSync tool are a flat map of
//! `{"UniqueID", "Name", "Amenity", "Building", "LatLng", "OsmId"}` objects
//! with string ids; they are read transparently and rewritten in the current
//! format on the next save.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use geosync_core::{JournalEntry, NodeId, Position, UniqueId};

use crate::error::{io_err, SyncError};

/// On-disk journal payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Journal {
    pub synced_at: DateTime<Utc>,
    pub entries: BTreeMap<UniqueId, JournalEntry>,
}

impl Default for Journal {
    fn default() -> Self {
        Self {
            synced_at: Utc::now(),
            entries: BTreeMap::new(),
        }
    }
}

impl Journal {
    pub fn get(&self, id: &UniqueId) -> Option<&JournalEntry> {
        self.entries.get(id)
    }

    /// Insert or replace the entry for `entry.unique_id`.
    pub fn upsert(&mut self, entry: JournalEntry) {
        self.entries.insert(entry.unique_id.clone(), entry);
    }

    pub fn remove(&mut self, id: &UniqueId) -> Option<JournalEntry> {
        self.entries.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JournalCompat {
    Structured(JournalStructuredCompat),
    Legacy(BTreeMap<String, LegacyEntry>),
}

#[derive(Debug, Deserialize)]
struct JournalStructuredCompat {
    pub synced_at: Option<DateTime<Utc>>,
    pub entries: BTreeMap<UniqueId, JournalEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LegacyEntry {
    #[serde(rename = "UniqueID")]
    unique_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    amenity: String,
    #[serde(default)]
    building: String,
    #[serde(default)]
    lat_lng: String,
    #[serde(default)]
    osm_id: String,
}

impl LegacyEntry {
    /// Older releases journaled inserts even when the server never confirmed
    /// them, leaving an empty or placeholder id behind. Those entries are
    /// dropped so the record is classified as an insert again.
    fn into_entry(self, key: String) -> Option<JournalEntry> {
        let remote_id = match self.osm_id.trim().parse::<i64>() {
            Ok(id) if id > 0 => NodeId(id),
            _ => {
                tracing::warn!(
                    "dropping legacy journal entry '{key}' with unconfirmed id {:?}",
                    self.osm_id
                );
                return None;
            }
        };
        let unique_id = if self.unique_id.is_empty() {
            key
        } else {
            self.unique_id
        };
        Some(JournalEntry {
            unique_id: UniqueId(unique_id),
            name: self.name,
            amenity: self.amenity,
            building: self.building,
            position: Position(self.lat_lng),
            remote_id,
        })
    }
}

/// Default journal path for a record source: `<source>.log`.
pub fn default_path_for(source: &Path) -> PathBuf {
    let mut path = OsString::from(source.as_os_str());
    path.push(".log");
    PathBuf::from(path)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Load the journal at `path`.
///
/// Returns an empty journal if the file does not yet exist.
pub fn load(path: &Path) -> Result<Journal, SyncError> {
    if !path.exists() {
        return Ok(Journal::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let parsed = serde_json::from_str::<JournalCompat>(&contents).map_err(|source| {
        SyncError::JournalParse {
            path: path.to_path_buf(),
            source,
        }
    })?;
    match parsed {
        JournalCompat::Structured(journal) => Ok(Journal {
            synced_at: journal.synced_at.unwrap_or_else(Utc::now),
            entries: journal.entries,
        }),
        JournalCompat::Legacy(legacy) => {
            tracing::info!(
                "migrating legacy journal {} ({} entries)",
                path.display(),
                legacy.len()
            );
            let entries = legacy
                .into_iter()
                .filter_map(|(key, entry)| entry.into_entry(key))
                .map(|entry| (entry.unique_id.clone(), entry))
                .collect();
            Ok(Journal {
                synced_at: Utc::now(),
                entries,
            })
        }
    }
}

/// Save the journal to `path` atomically.
///
/// Writes to `<path>.tmp` then renames to `<path>`.
pub fn save(path: &Path, journal: &Journal) -> Result<(), SyncError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }

    let json = serde_json::to_string_pretty(journal)?;
    let tmp = tmp_path(path);
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    tracing::debug!("journal saved: {} ({} entries)", path.display(), journal.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(uid: &str, remote_id: i64) -> JournalEntry {
        JournalEntry {
            unique_id: UniqueId::from(uid),
            name: "X".to_string(),
            amenity: String::new(),
            building: String::new(),
            position: Position::from("1,1"),
            remote_id: NodeId(remote_id),
        }
    }

    #[test]
    fn empty_journal_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let journal = load(&tmp.path().join("places.csv.log")).unwrap();
        assert!(journal.is_empty());
    }

    #[test]
    fn default_path_appends_log_suffix() {
        assert_eq!(
            default_path_for(Path::new("/data/places.csv")),
            PathBuf::from("/data/places.csv.log")
        );
    }

    #[test]
    fn save_then_load_keeps_entries() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("places.csv.log");
        let mut journal = Journal::default();
        journal.upsert(entry("A", 100));
        journal.upsert(entry("B", 101));

        save(&path, &journal).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.entries, journal.entries);
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("clean.log");
        save(&path, &Journal::default()).unwrap();
        assert!(
            !tmp_path(&path).exists(),
            "tmp file should be removed after atomic rename"
        );
    }

    #[test]
    fn upsert_replaces_and_remove_deletes() {
        let mut journal = Journal::default();
        journal.upsert(entry("A", 100));
        let mut renamed = entry("A", 100);
        renamed.name = "Y".to_string();
        journal.upsert(renamed);

        assert_eq!(journal.len(), 1);
        assert_eq!(journal.get(&UniqueId::from("A")).unwrap().name, "Y");
        assert!(journal.remove(&UniqueId::from("A")).is_some());
        assert!(journal.is_empty());
    }

    #[test]
    fn load_legacy_flat_map_migrates_to_structured_journal() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("legacy.csv.log");
        std::fs::write(
            &path,
            r#"{
                "A": {"UniqueID":"A","Name":"X","Amenity":"","Building":"","LatLng":"1,1","OsmId":"100"},
                "B": {"UniqueID":"B","Name":"Y","Amenity":"cafe","Building":"","LatLng":"2,2","OsmId":""},
                "C": {"UniqueID":"C","Name":"Z","Amenity":"","Building":"","LatLng":"3,3","OsmId":"-2"}
            }"#,
        )
        .unwrap();

        let before = Utc::now();
        let loaded = load(&path).unwrap();
        let after = Utc::now();

        assert_eq!(loaded.len(), 1, "unconfirmed legacy entries are dropped");
        let a = loaded.get(&UniqueId::from("A")).expect("entry A");
        assert_eq!(a.remote_id, NodeId(100));
        assert_eq!(a.position, Position::from("1,1"));
        assert!(loaded.synced_at >= before && loaded.synced_at <= after);
    }

    #[test]
    fn load_structured_without_synced_at_sets_timestamp() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("partial.log");
        std::fs::write(
            &path,
            r#"{"entries":{"A":{"unique_id":"A","name":"X","amenity":"","building":"","position":"1,1","remote_id":100}}}"#,
        )
        .unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.get(&UniqueId::from("A")).unwrap().remote_id, NodeId(100));
    }

    #[test]
    fn garbage_journal_is_a_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.log");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(
            load(&path).unwrap_err(),
            SyncError::JournalParse { .. }
        ));
    }
}
