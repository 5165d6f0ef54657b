//! CSV ledger of failed tracks, one row per failure.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use shoal_engine::orchestrator::{CollaboratorError, FailureLedger};
use shoal_engine::{FailureKind, SourceTrack};
use tracing::debug;

use crate::error::LibraryError;

const HEADER: &str = "title,artist,reason,message,timestamp\n";

pub struct CsvLedger {
    path: PathBuf,
}

impl CsvLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn append(&self, track: &SourceTrack, kind: FailureKind, message: &str) -> Result<(), LibraryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let new_file = !self.path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if new_file {
            file.write_all(HEADER.as_bytes())?;
        }
        let row = format!(
            "{},{},{},{},{}\n",
            escape(&track.title),
            escape(&track.artist),
            escape(&kind.to_string()),
            escape(message),
            chrono::Local::now().to_rfc3339(),
        );
        file.write_all(row.as_bytes())?;
        debug!(path = %self.path.display(), track = %track, "ledger row appended");
        Ok(())
    }
}

#[async_trait]
impl FailureLedger for CsvLedger {
    async fn record(
        &self,
        track: &SourceTrack,
        kind: FailureKind,
        message: &str,
    ) -> Result<(), CollaboratorError> {
        self.append(track, kind, message).map_err(Into::into)
    }
}

/// Quote a field when it contains a separator, quote or newline; inner
/// quotes are doubled per RFC 4180.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn header_written_once_then_rows_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failed.csv");
        let ledger = CsvLedger::new(&path);

        let first = SourceTrack::new("One More Time", "Daft Punk");
        let second = SourceTrack::new("Levels", "Avicii");
        ledger
            .record(&first, FailureKind::NotFound, "no match")
            .await
            .unwrap();
        ledger
            .record(&second, FailureKind::Transfer, "short transfer")
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER.trim_end());
        assert!(lines[1].starts_with("One More Time,Daft Punk,Song not found,no match,"));
        assert!(lines[2].starts_with("Levels,Avicii,Download error,short transfer,"));
    }

    #[tokio::test]
    async fn fields_with_commas_and_quotes_are_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failed.csv");
        let ledger = CsvLedger::new(&path);

        let track = SourceTrack::new(r#"Hello, "World""#, "Some, Artist");
        ledger
            .record(&track, FailureKind::Unavailable, "timed out")
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains(r#""Hello, ""World""","Some, Artist",Provider unavailable"#));
    }
}
