use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} during {operation} for {url}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        operation: &'static str,
    },

    #[error("operation timed out: {reason}")]
    Timeout { reason: String },

    #[error("track not found on provider")]
    NotFound,

    #[error("no acceptable match for `{query}` (best score {best_score:.2})")]
    NoMatch { query: String, best_score: f64 },

    #[error("transfer error: {reason}")]
    Transfer { reason: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("every endpoint is cooling down")]
    PoolExhausted,

    #[error("all retry attempts failed after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("configuration error: {reason}")]
    InvalidConfig { reason: String },
}

impl ResolveError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn http_status(
        status: StatusCode,
        url: impl Into<String>,
        operation: &'static str,
    ) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
            operation,
        }
    }

    pub fn transfer(reason: impl Into<String>) -> Self {
        Self::Transfer {
            reason: reason.into(),
        }
    }

    /// Whether the retry coordinator may try this operation again on
    /// another (or the same) endpoint.
    ///
    /// Semantic misses (`NotFound`, `NoMatch`) are permanent for the track,
    /// as are exhausted pools and configuration problems.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Cancelled => false,
            Self::InvalidUrl { .. }
            | Self::NotFound
            | Self::NoMatch { .. }
            | Self::PoolExhausted
            | Self::Exhausted { .. }
            | Self::InvalidConfig { .. } => false,
            Self::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::Transfer { .. }
            | Self::Io { .. } => true,
        }
    }

    /// True when the failure means "this track does not exist on the
    /// provider", as opposed to "the provider could not be reached".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound | Self::NoMatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        let err = ResolveError::http_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            "https://mirror.example/track/",
            "stream lookup",
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn rate_limit_is_retryable() {
        let err = ResolveError::http_status(
            StatusCode::TOO_MANY_REQUESTS,
            "https://mirror.example/search/",
            "search",
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        let err = ResolveError::http_status(
            StatusCode::BAD_REQUEST,
            "https://mirror.example/search/",
            "search",
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn semantic_misses_are_final() {
        assert!(!ResolveError::NotFound.is_retryable());
        assert!(ResolveError::NotFound.is_not_found());
        let no_match = ResolveError::NoMatch {
            query: "song artist".into(),
            best_score: 0.12,
        };
        assert!(!no_match.is_retryable());
        assert!(no_match.is_not_found());
    }

    #[test]
    fn exhausted_is_not_a_miss() {
        let err = ResolveError::Exhausted { attempts: 9 };
        assert!(!err.is_retryable());
        assert!(!err.is_not_found());
    }
}
