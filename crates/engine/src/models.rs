use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A track as named by the source playlist. Immutable input to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTrack {
    pub title: String,
    pub artist: String,
    /// Provider-side identifier, when the source already knows it.
    pub provider_id: Option<u64>,
    /// Source-side duration in seconds, used only for tie-breaking matches.
    pub duration_secs: Option<u32>,
}

impl SourceTrack {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            provider_id: None,
            duration_secs: None,
        }
    }

    /// The free-text query used against the provider's search endpoints.
    pub fn search_query(&self) -> String {
        format!("{} {}", self.title, self.artist)
    }
}

impl fmt::Display for SourceTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

/// A track record as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderTrack {
    pub id: u64,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_secs: u32,
    /// Provider quality tag, e.g. "LOSSLESS".
    pub quality: String,
    /// Cover art identifier (dash-separated UUID), when exposed.
    pub cover_id: Option<String>,
}

/// A scored search result. Produced and consumed within one resolution call.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub track: ProviderTrack,
    pub score: f64,
}

/// Everything the transfer step needs to retrieve the audio bytes.
///
/// Only constructed from a successful direct lookup or a candidate whose
/// score met the acceptance threshold.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub track: ProviderTrack,
    pub stream_url: String,
    /// Expected byte size, when the provider exposes one up front.
    pub expected_bytes: Option<u64>,
}

/// How a single track's resolution failed, for the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// No acceptable match exists on the provider.
    NotFound,
    /// The provider could not be reached within the retry budget.
    Unavailable,
    /// The stream transfer failed after bounded retries.
    Transfer,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "Song not found"),
            Self::Unavailable => write!(f, "Provider unavailable"),
            Self::Transfer => write!(f, "Download error"),
        }
    }
}

/// Terminal per-track result of one run.
#[derive(Debug, Clone)]
pub enum DownloadOutcome {
    /// Track written (and best-effort tagged) at the given path.
    Success(PathBuf),
    /// Track skipped before resolution (already present or skip-cached).
    Skipped(String),
    /// Track failed; one ledger record is appended for it.
    Failed { kind: FailureKind, message: String },
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}
