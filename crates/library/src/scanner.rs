//! Destination-directory scanning: which tracks are already on disk, and
//! what a new track's file should be called.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use shoal_engine::SourceTrack;
use shoal_engine::matching::normalized_tokens;
use tracing::{debug, warn};

pub const AUDIO_EXTENSIONS: [&str; 4] = ["flac", "mp3", "m4a", "wav"];

const MAX_FILENAME_LEN: usize = 200;

/// Token sets of the audio files already present in the destination
/// directory, built once per run.
pub struct LibraryScanner {
    file_tokens: Vec<HashSet<String>>,
}

impl LibraryScanner {
    /// Scan `dir` for audio files. A missing or unreadable directory yields
    /// an empty scanner, so a first run against a fresh folder just works.
    pub fn scan(dir: &Path) -> Self {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(dir = %dir.display(), error = %err, "destination not readable, assuming empty");
                return Self {
                    file_tokens: Vec::new(),
                };
            }
        };

        let mut file_tokens = Vec::new();
        for entry in entries {
            let Ok(entry) = entry else {
                continue;
            };
            let path = entry.path();
            if !is_audio_file(&path) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                file_tokens.push(normalized_tokens(stem));
            }
        }
        debug!(dir = %dir.display(), files = file_tokens.len(), "destination scanned");
        Self { file_tokens }
    }

    /// A track counts as present when one filename carries at least
    /// `min(2, title tokens)` of its title tokens plus one artist token.
    pub fn contains(&self, track: &SourceTrack) -> bool {
        let title_tokens = normalized_tokens(&track.title);
        let artist_tokens = normalized_tokens(&track.artist);
        if title_tokens.is_empty() {
            return false;
        }
        let needed_title = title_tokens.len().min(2);

        self.file_tokens.iter().any(|file| {
            let title_hits = title_tokens.intersection(file).count();
            let artist_hits = artist_tokens.intersection(file).count();
            title_hits >= needed_title && artist_hits >= 1
        })
    }

    pub fn file_count(&self) -> usize {
        self.file_tokens.len()
    }
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Strip filesystem-hostile characters, collapse whitespace, cap length.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_FILENAME_LEN).collect()
}

/// Destination file name for a track: `"{artist} - {title}.flac"`, sanitized.
pub fn output_file_name(track: &SourceTrack) -> String {
    format!(
        "{}.flac",
        sanitize_filename(&format!("{} - {}", track.artist, track.title))
    )
}

/// Create the destination directory when absent.
pub fn ensure_directory(dir: &Path) -> std::io::Result<PathBuf> {
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "destination directory missing, creating");
        fs::create_dir_all(dir)?;
    }
    Ok(dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn finds_downloaded_track_by_filename_tokens() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Daft Punk - One More Time.flac");
        touch(dir.path(), "Sade - Smooth Operator.mp3");
        let scanner = LibraryScanner::scan(dir.path());
        assert_eq!(scanner.file_count(), 2);

        assert!(scanner.contains(&SourceTrack::new("One More Time", "Daft Punk")));
        assert!(scanner.contains(&SourceTrack::new("Smooth Operator", "Sade")));
        assert!(!scanner.contains(&SourceTrack::new("Around the World", "Daft Punk")));
    }

    #[test]
    fn single_token_title_needs_only_itself() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Avicii - Levels.flac");
        let scanner = LibraryScanner::scan(dir.path());
        assert!(scanner.contains(&SourceTrack::new("Levels", "Avicii")));
    }

    #[test]
    fn artist_token_is_required() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Somebody Else - One More Time.flac");
        let scanner = LibraryScanner::scan(dir.path());
        assert!(!scanner.contains(&SourceTrack::new("One More Time", "Daft Punk")));
    }

    #[test]
    fn non_audio_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Daft Punk - One More Time.txt");
        touch(dir.path(), "cover.jpg");
        let scanner = LibraryScanner::scan(dir.path());
        assert_eq!(scanner.file_count(), 0);
    }

    #[test]
    fn missing_directory_scans_empty() {
        let scanner = LibraryScanner::scan(Path::new("/definitely/not/here"));
        assert_eq!(scanner.file_count(), 0);
        assert!(!scanner.contains(&SourceTrack::new("Anything", "Anyone")));
    }

    #[test]
    fn sanitize_strips_separators_and_collapses_spaces() {
        assert_eq!(
            sanitize_filename("AC/DC: Back  in <Black>?"),
            "ACDC Back in Black"
        );
    }

    #[test]
    fn sanitize_caps_length() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_filename(&long).chars().count(), 200);
    }

    #[test]
    fn output_name_is_artist_dash_title() {
        let track = SourceTrack::new("One More Time", "Daft Punk");
        assert_eq!(output_file_name(&track), "Daft Punk - One More Time.flac");
    }
}
