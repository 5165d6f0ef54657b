//! TTL file cache for the fetched playlist, so repeated runs within the
//! window do not hit the playlist API at all.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use shoal_engine::SourceTrack;
use tracing::{debug, warn};

use crate::error::LibraryError;

pub struct PlaylistCache {
    path: PathBuf,
    ttl: Duration,
}

impl PlaylistCache {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    /// Cached track list, or `None` when the file is absent, older than the
    /// TTL, or unparsable. A bad cache is never an error, just a miss.
    pub fn get(&self) -> Option<Vec<SourceTrack>> {
        let metadata = fs::metadata(&self.path).ok()?;
        let age = metadata
            .modified()
            .ok()
            .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())?;
        if age > self.ttl {
            debug!(path = %self.path.display(), age_secs = age.as_secs(), "playlist cache stale");
            return None;
        }

        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<Vec<(String, String)>>(&content) {
            Ok(pairs) if !pairs.is_empty() => {
                debug!(tracks = pairs.len(), "playlist loaded from cache");
                Some(
                    pairs
                        .into_iter()
                        .map(|(title, artist)| SourceTrack::new(title, artist))
                        .collect(),
                )
            }
            Ok(_) => None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "playlist cache unparsable");
                None
            }
        }
    }

    pub fn put(&self, tracks: &[SourceTrack]) -> Result<(), LibraryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let pairs: Vec<(&str, &str)> = tracks
            .iter()
            .map(|t| (t.title.as_str(), t.artist.as_str()))
            .collect();
        fs::write(&self.path, serde_json::to_string(&pairs)?)?;
        debug!(path = %self.path.display(), tracks = tracks.len(), "playlist cached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<SourceTrack> {
        vec![
            SourceTrack::new("One More Time", "Daft Punk"),
            SourceTrack::new("Smooth Operator", "Sade"),
        ]
    }

    #[test]
    fn fresh_cache_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PlaylistCache::new(dir.path().join("playlist.json"), Duration::from_secs(3600));
        cache.put(&sample()).unwrap();

        let loaded = cache.get().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].title, "One More Time");
        assert_eq!(loaded[1].artist, "Sade");
    }

    #[test]
    fn absent_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PlaylistCache::new(dir.path().join("nope.json"), Duration::from_secs(3600));
        assert!(cache.get().is_none());
    }

    #[test]
    fn stale_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PlaylistCache::new(dir.path().join("playlist.json"), Duration::from_millis(1));
        cache.put(&sample()).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get().is_none());
    }

    #[test]
    fn garbage_content_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playlist.json");
        fs::write(&path, "not json at all").unwrap();
        let cache = PlaylistCache::new(path, Duration::from_secs(3600));
        assert!(cache.get().is_none());
    }

    #[test]
    fn empty_list_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PlaylistCache::new(dir.path().join("playlist.json"), Duration::from_secs(3600));
        cache.put(&[]).unwrap();
        assert!(cache.get().is_none());
    }
}
