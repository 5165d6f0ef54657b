//! Resilient track resolution and retrieval against a pool of
//! interchangeable provider mirrors.
//!
//! The pipeline for one track is resolve (direct lookup, then
//! search-and-match) → stream transfer → tagging, with every network
//! exchange routed through a retry coordinator that rotates a health-aware
//! endpoint pool.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod matching;
pub mod models;
pub mod orchestrator;
pub mod resolver;
pub mod retry;
pub mod transfer;

pub use client::{ProviderApi, ProviderClient};
pub use config::{EngineConfig, MatchConfig, PoolConfig, ProviderConfig};
pub use endpoint::{EndpointPool, PoolStats};
pub use error::ResolveError;
pub use models::{DownloadOutcome, FailureKind, ProviderTrack, SourceTrack, StreamInfo};
pub use orchestrator::{
    DownloadJob, DownloadOrchestrator, FailureLedger, SessionReport, TagWriter,
};
pub use resolver::TrackResolver;
pub use retry::{RetryCoordinator, RetryPolicy};
