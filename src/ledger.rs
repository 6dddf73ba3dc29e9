//! Delivery ledger.
//!
//! The ledger is the only state that outlives a run: the set of item
//! identifiers that have already been mailed.  It is append-only, and
//! membership is the sole de-duplication mechanism.
//!
//! On disk it is a JSON object `{"sent_guids": {"<id>": true, ...}}`.  Keys
//! are written sorted, so two ledgers holding the same identifiers serialise
//! to the same bytes.
//!
//! # Invariants
//! - A missing file is a first run and loads as an empty ledger.
//! - A file that exists but cannot be read or parsed is an error, never an
//!   empty ledger.
//! - [`Ledger::persist`] replaces the file atomically: readers see either the
//!   previous snapshot or the new one, never a partial write.

use std::collections::{BTreeMap, HashSet};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::PersistenceError;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    sent_guids: BTreeMap<String, bool>,
}

/// Set of identifiers already delivered, bound to its storage path.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    sent: HashSet<String>,
}

impl Ledger {
    /// Read the ledger stored at `path`.
    ///
    /// # Errors
    /// - [`PersistenceError::Read`] when the file exists but cannot be read.
    /// - [`PersistenceError::Corrupt`] when it is empty or not a valid snapshot.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no ledger found, starting fresh");
                return Ok(Self {
                    path,
                    sent: HashSet::new(),
                });
            }
            Err(source) => return Err(PersistenceError::Read { path, source }),
        };

        let snapshot: Snapshot = match serde_json::from_slice(&bytes) {
            Ok(snapshot) => snapshot,
            Err(source) => return Err(PersistenceError::Corrupt { path, source }),
        };

        // Presence of a key is what counts; the value is not consulted.
        let sent: HashSet<String> = snapshot.sent_guids.into_keys().collect();

        debug!(path = %path.display(), count = sent.len(), "loaded ledger");
        Ok(Self { path, sent })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }

    /// Whether `id` has been delivered before.
    pub fn contains(&self, id: &str) -> bool {
        self.sent.contains(id)
    }

    /// Record `ids` as delivered.  In-memory only; see [`Ledger::persist`].
    pub fn merge<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sent.extend(ids.into_iter().map(Into::into));
    }

    /// Write the full set to storage, replacing the previous snapshot.
    pub fn persist(&self) -> Result<(), PersistenceError> {
        self.stage()?.commit()
    }

    /// Write the snapshot to a temporary file next to the target without
    /// replacing it yet.  Dropping the result discards the temporary file and
    /// leaves the old snapshot untouched.
    pub fn stage(&self) -> Result<StagedSnapshot, PersistenceError> {
        let write_err = |source| PersistenceError::Write {
            path: self.path.clone(),
            source,
        };

        // Same directory as the target, so the final rename cannot cross
        // filesystems.
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(write_err)?;

        let snapshot = Snapshot {
            sent_guids: self.sent.iter().map(|id| (id.clone(), true)).collect(),
        };

        let mut file = NamedTempFile::new_in(dir).map_err(write_err)?;
        if let Some(perms) = self.target_permissions() {
            file.as_file().set_permissions(perms).map_err(write_err)?;
        }
        serde_json::to_writer_pretty(&mut file, &snapshot).map_err(PersistenceError::Encode)?;
        file.write_all(b"\n").map_err(write_err)?;
        file.as_file().sync_all().map_err(write_err)?;

        Ok(StagedSnapshot {
            file,
            target: self.path.clone(),
        })
    }

    /// Mode for the replacement file: whatever the current ledger has, or
    /// 0644 for a new one.  Temporary files start out as 0600.
    fn target_permissions(&self) -> Option<std::fs::Permissions> {
        if let Ok(meta) = std::fs::metadata(&self.path) {
            return Some(meta.permissions());
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            Some(std::fs::Permissions::from_mode(0o644))
        }
        #[cfg(not(unix))]
        {
            None
        }
    }
}

/// A fully written snapshot waiting to be renamed over the ledger file.
#[derive(Debug)]
pub struct StagedSnapshot {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedSnapshot {
    /// Atomically replace the ledger file with this snapshot.
    pub fn commit(self) -> Result<(), PersistenceError> {
        let target = self.target;
        self.file
            .persist(&target)
            .map_err(|e| PersistenceError::Write {
                path: target.clone(),
                source: e.error,
            })?;
        debug!(path = %target.display(), "ledger persisted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("sent_items.json")
    }

    // -- load ----------------------------------------------------------------

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::load(ledger_path(&dir)).unwrap();
        assert!(ledger.is_empty());
        assert!(!ledger_path(&dir).exists(), "load must not create the file");
    }

    #[test]
    fn load_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = ledger_path(&dir);
        std::fs::write(&path, b"{\"sent_guids\": [").unwrap();

        let err = Ledger::load(&path).unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt { .. }));
    }

    #[test]
    fn load_empty_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = ledger_path(&dir);
        std::fs::write(&path, b"").unwrap();

        assert!(matches!(
            Ledger::load(&path),
            Err(PersistenceError::Corrupt { .. })
        ));
    }

    #[test]
    fn load_directory_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Ledger::load(dir.path()),
            Err(PersistenceError::Read { .. })
        ));
    }

    #[test]
    fn load_counts_every_key_as_delivered() {
        let dir = tempfile::tempdir().unwrap();
        let path = ledger_path(&dir);
        std::fs::write(
            &path,
            br#"{"sent_guids": {"a": true, "b": true, "c": false}}"#,
        )
        .unwrap();

        let mut ledger = Ledger::load(&path).unwrap();
        assert_eq!(ledger.len(), 3);
        assert!(ledger.contains("a"));
        assert!(ledger.contains("c"));

        ledger.merge(["d"]);
        ledger.persist().unwrap();

        let reloaded = Ledger::load(&path).unwrap();
        assert_eq!(reloaded.len(), 4);
        assert!(reloaded.contains("c"), "existing keys must survive a rewrite");
    }

    // -- merge / persist -----------------------------------------------------

    #[test]
    fn merge_is_append_only_and_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::load(ledger_path(&dir)).unwrap();

        ledger.merge(["a", "b"]);
        ledger.merge(["b", "c"]);

        assert_eq!(ledger.len(), 3);
        assert!(ledger.contains("a"));
    }

    #[test]
    fn persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = ledger_path(&dir);

        let mut ledger = Ledger::load(&path).unwrap();
        ledger.merge(["guid-1", "guid-2"]);
        ledger.persist().unwrap();

        let reloaded = Ledger::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("guid-1"));
        assert!(reloaded.contains("guid-2"));
    }

    #[test]
    fn persist_output_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = ledger_path(&dir);

        let mut ledger = Ledger::load(&path).unwrap();
        ledger.merge(["z", "a", "m"]);
        ledger.persist().unwrap();
        let first = std::fs::read(&path).unwrap();

        Ledger::load(&path).unwrap().persist().unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
        let text = String::from_utf8(first).unwrap();
        assert!(text.find("\"a\"").unwrap() < text.find("\"z\"").unwrap());
    }

    #[test]
    fn persist_creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("sent_items.json");

        let mut ledger = Ledger::load(&path).unwrap();
        ledger.merge(["x"]);
        ledger.persist().unwrap();

        assert!(Ledger::load(&path).unwrap().contains("x"));
    }

    #[cfg(unix)]
    #[test]
    fn persist_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = ledger_path(&dir);
        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;

        let mut ledger = Ledger::load(&path).unwrap();
        ledger.merge(["a"]);
        ledger.persist().unwrap();
        assert_eq!(mode(&path), 0o644, "new ledger should be world-readable");

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();
        ledger.merge(["b"]);
        ledger.persist().unwrap();
        assert_eq!(mode(&path), 0o640);
    }

    #[test]
    fn interrupted_persist_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = ledger_path(&dir);

        let mut ledger = Ledger::load(&path).unwrap();
        ledger.merge(["old"]);
        ledger.persist().unwrap();
        let before = std::fs::read(&path).unwrap();

        ledger.merge(["new"]);
        let staged = ledger.stage().unwrap();
        // Crash between writing the new snapshot and renaming it into place.
        drop(staged);

        assert_eq!(std::fs::read(&path).unwrap(), before);
        let reloaded = Ledger::load(&path).unwrap();
        assert!(reloaded.contains("old"));
        assert!(!reloaded.contains("new"));

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "temporary snapshot should be cleaned up");
    }
}
