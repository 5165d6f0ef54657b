//! Persistent skip-cache of tracks that failed on earlier runs, so a rerun
//! does not hammer the provider for songs it has already declared missing.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::LibraryError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipEntry {
    pub title: String,
    pub artist: String,
    pub error: String,
    /// Unix timestamp of the last failure.
    pub timestamp: i64,
    pub attempts: u32,
}

/// JSON-file-backed map of failed tracks keyed by normalized
/// `title|artist`. Entries past the expiry are dropped on load, so a track
/// gets retried once its window has passed.
pub struct SkipCache {
    path: PathBuf,
    expiry: Duration,
    entries: HashMap<String, SkipEntry>,
}

impl SkipCache {
    pub fn load(path: impl Into<PathBuf>, expiry: Duration) -> Self {
        let path = path.into();
        let mut entries: HashMap<String, SkipEntry> = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skip cache corrupted, starting fresh");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        let cutoff = chrono::Utc::now().timestamp() - expiry.as_secs() as i64;
        let before = entries.len();
        entries.retain(|_, entry| entry.timestamp > cutoff);
        if entries.len() < before {
            debug!(pruned = before - entries.len(), "expired skip-cache entries pruned");
        }

        Self {
            path,
            expiry,
            entries,
        }
    }

    pub fn contains(&self, title: &str, artist: &str) -> bool {
        self.entries.contains_key(&track_key(title, artist))
    }

    pub fn reason(&self, title: &str, artist: &str) -> Option<&str> {
        self.entries
            .get(&track_key(title, artist))
            .map(|entry| entry.error.as_str())
    }

    /// Record a failure; repeat failures bump the attempt counter and
    /// refresh the timestamp.
    pub fn add(&mut self, title: &str, artist: &str, error: &str) -> Result<(), LibraryError> {
        let key = track_key(title, artist);
        let attempts = self
            .entries
            .get(&key)
            .map(|entry| entry.attempts + 1)
            .unwrap_or(1);
        self.entries.insert(
            key,
            SkipEntry {
                title: title.to_string(),
                artist: artist.to_string(),
                error: error.to_string(),
                timestamp: chrono::Utc::now().timestamp(),
                attempts,
            },
        );
        self.save()
    }

    /// Forget a track, typically after a successful retry.
    pub fn clear(&mut self, title: &str, artist: &str) -> Result<bool, LibraryError> {
        let removed = self.entries.remove(&track_key(title, artist)).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    fn save(&self) -> Result<(), LibraryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }
}

/// Case- and whitespace-insensitive key for one track.
fn track_key(title: &str, artist: &str) -> String {
    let norm = |s: &str| {
        s.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    };
    format!("{}|{}", norm(title), norm(artist))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(86_400);

    #[test]
    fn key_is_case_and_whitespace_insensitive() {
        assert_eq!(
            track_key("One  More Time", "Daft Punk"),
            track_key("one more time", "DAFT  PUNK")
        );
    }

    #[test]
    fn entries_round_trip_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.json");

        let mut cache = SkipCache::load(&path, DAY);
        cache
            .add("One More Time", "Daft Punk", "Song not found")
            .unwrap();
        assert!(cache.contains("one more time", "daft punk"));

        let reloaded = SkipCache::load(&path, DAY);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(
            reloaded.reason("One More Time", "Daft Punk"),
            Some("Song not found")
        );
    }

    #[test]
    fn repeat_failures_bump_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = SkipCache::load(dir.path().join("errors.json"), DAY);
        cache.add("Levels", "Avicii", "timeout").unwrap();
        cache.add("Levels", "Avicii", "timeout again").unwrap();
        let entry = cache.entries.get(&track_key("Levels", "Avicii")).unwrap();
        assert_eq!(entry.attempts, 2);
        assert_eq!(entry.error, "timeout again");
    }

    #[test]
    fn expired_entries_are_pruned_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.json");
        let mut cache = SkipCache::load(&path, DAY);
        cache.add("Old Song", "Old Artist", "gone").unwrap();

        // Reload with a zero expiry: everything is past the window.
        let reloaded = SkipCache::load(&path, Duration::ZERO);
        assert!(reloaded.is_empty());
    }

    #[test]
    fn clear_removes_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = SkipCache::load(dir.path().join("errors.json"), DAY);
        cache.add("Levels", "Avicii", "timeout").unwrap();
        assert!(cache.clear("Levels", "Avicii").unwrap());
        assert!(!cache.clear("Levels", "Avicii").unwrap());
        assert!(cache.is_empty());
    }

    #[test]
    fn corrupted_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.json");
        fs::write(&path, "{ not valid json").unwrap();
        let cache = SkipCache::load(&path, DAY);
        assert!(cache.is_empty());
    }
}
