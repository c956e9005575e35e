//! Whole-queue file persistence with atomic replacement.

use crate::{QueuedMessage, StoreResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

/// File-backed store for the full queue.
///
/// The entire collection is written as one JSON array. Writes go to a
/// temporary sibling file first and are renamed over the target, so a
/// crash mid-write never leaves a half-written queue file. Reads load
/// the whole file; a missing, unreadable, or unparsable file yields an
/// empty queue (acceptable data loss, not a fatal condition).
pub struct QueueStore {
    path: PathBuf,
}

impl QueueStore {
    /// Create a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted queue.
    ///
    /// Never fails: corruption or I/O problems are logged and treated
    /// as "start empty". The in-memory collection is authoritative
    /// from then on.
    pub fn load(&self) -> Vec<QueuedMessage> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Queue file not found, starting empty");
                return Vec::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read queue file, starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<QueuedMessage>>(&content) {
            Ok(messages) => {
                debug!(path = %self.path.display(), count = messages.len(), "Loaded queue");
                messages
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Queue file corrupted, starting empty");
                Vec::new()
            }
        }
    }

    /// Persist the full collection atomically.
    pub fn save(&self, messages: &[QueuedMessage]) -> StoreResult<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let content = serde_json::to_vec(messages)?;
        atomic_write(&self.path, &content)?;

        debug!(path = %self.path.display(), count = messages.len(), "Saved queue");
        Ok(())
    }
}

/// Write content to a temporary sibling file, then rename it over the
/// target path.
fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("queue");

    let tmp_name = format!(
        ".{}.tmp.{}",
        file_name,
        std::time::SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    );
    let tmp_path = dir.join(tmp_name);

    let write_result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        Ok(())
    })();

    if let Err(e) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageStatus;
    use tempfile::tempdir;

    fn store_in(dir: &tempfile::TempDir) -> QueueStore {
        QueueStore::new(dir.path().join("queue.json"))
    }

    #[test]
    fn test_load_missing_file_returns_empty() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        assert!(store.load().is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let mut messages = vec![
            QueuedMessage::new("first", None, None),
            QueuedMessage::new("second", None, Some("aux".to_string())),
        ];
        messages[1].status = MessageStatus::Failed;
        messages[1].retry_count = 3;
        messages[1].last_error = Some("network down".to_string());

        store.save(&messages).unwrap();
        let loaded = store.load();

        assert_eq!(loaded, messages);
    }

    #[test]
    fn test_load_corrupted_file_returns_empty() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        fs::write(store.path(), "{ not valid json").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_wrong_shape_returns_empty() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        fs::write(store.path(), r#"{"messages": []}"#).unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_save_replaces_previous_contents() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        store
            .save(&[QueuedMessage::new("old", None, None)])
            .unwrap();
        let replacement = vec![QueuedMessage::new("new", None, None)];
        store.save(&replacement).unwrap();

        assert_eq!(store.load(), replacement);
    }

    #[test]
    fn test_save_leaves_no_temporary_files() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        store.save(&[QueuedMessage::new("msg", None, None)]).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("queue.json")]);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let store = QueueStore::new(dir.path().join("nested").join("queue.json"));

        store.save(&[]).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_save_empty_queue() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        store.save(&[]).unwrap();
        assert!(store.load().is_empty());
    }
}
