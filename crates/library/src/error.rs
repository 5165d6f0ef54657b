use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("playlist API answered HTTP {status} during {operation}")]
    Api {
        status: StatusCode,
        operation: &'static str,
    },

    #[error("not a playlist URL: `{input}`")]
    InvalidPlaylistUrl { input: String },

    #[error("malformed playlist payload: {reason}")]
    Payload { reason: String },

    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("tag error: {source}")]
    Tag {
        #[from]
        source: lofty::error::LoftyError,
    },
}

impl LibraryError {
    pub fn payload(reason: impl Into<String>) -> Self {
        Self::Payload {
            reason: reason.into(),
        }
    }
}
