//! Session orchestration: drives each track through resolve, transfer and
//! tagging, classifies the outcome, and keeps the run alive across per-track
//! failures.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::client::ProviderClient;
use crate::endpoint::PoolStats;
use crate::error::ResolveError;
use crate::models::{DownloadOutcome, FailureKind, ProviderTrack, SourceTrack};
use crate::resolver::TrackResolver;
use crate::transfer;

pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Writes audio tags (and optional embedded cover art) into a finished file.
#[async_trait]
pub trait TagWriter: Send + Sync {
    async fn write_tags(
        &self,
        path: &std::path::Path,
        track: &ProviderTrack,
        cover_jpeg: Option<&[u8]>,
    ) -> Result<(), CollaboratorError>;
}

/// Receives one record per failed track.
#[async_trait]
pub trait FailureLedger: Send + Sync {
    async fn record(
        &self,
        track: &SourceTrack,
        kind: FailureKind,
        message: &str,
    ) -> Result<(), CollaboratorError>;
}

/// One unit of work: a source track and the file it should land in.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub track: SourceTrack,
    pub dest: PathBuf,
}

/// Aggregate result of one run over a track list.
#[derive(Debug)]
pub struct SessionReport {
    pub outcomes: Vec<(SourceTrack, DownloadOutcome)>,
    pub elapsed: Duration,
    pub pool_stats: PoolStats,
}

impl SessionReport {
    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, DownloadOutcome::Failed { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, DownloadOutcome::Skipped(_)))
            .count()
    }
}

/// Runs a whole session track by track, in input order.
///
/// A failed track never aborts the run: it is classified, recorded in the
/// ledger, and the session moves on. Tagging problems are warnings only.
pub struct DownloadOrchestrator {
    client: ProviderClient,
    resolver: TrackResolver,
    inter_track_delay: Duration,
    tag_writer: Option<Arc<dyn TagWriter>>,
    ledger: Option<Arc<dyn FailureLedger>>,
}

impl DownloadOrchestrator {
    pub fn new(client: ProviderClient, resolver: TrackResolver, inter_track_delay: Duration) -> Self {
        Self {
            client,
            resolver,
            inter_track_delay,
            tag_writer: None,
            ledger: None,
        }
    }

    pub fn with_tag_writer(mut self, writer: Arc<dyn TagWriter>) -> Self {
        self.tag_writer = Some(writer);
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn FailureLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Process every job in order and return the session report.
    ///
    /// Cancellation stops the run after the current track; already-computed
    /// outcomes are kept in the report.
    pub async fn run(&self, jobs: Vec<DownloadJob>) -> SessionReport {
        let started = Instant::now();
        let total = jobs.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, job) in jobs.into_iter().enumerate() {
            if self.resolver.coordinator().token().is_cancelled() {
                info!(processed = index, total, "run cancelled");
                break;
            }

            info!(position = index + 1, total, track = %job.track, "processing track");
            let outcome = self.process(&job).await;

            if let DownloadOutcome::Failed { kind, message } = &outcome {
                warn!(track = %job.track, kind = %kind, message = %message, "track failed");
                self.record_failure(&job.track, *kind, message).await;
            }
            outcomes.push((job.track, outcome));

            if index + 1 < total && !self.inter_track_delay.is_zero() {
                tokio::select! {
                    _ = self.resolver.coordinator().token().cancelled() => {}
                    _ = tokio::time::sleep(self.inter_track_delay) => {}
                }
            }
        }

        SessionReport {
            outcomes,
            elapsed: started.elapsed(),
            pool_stats: self.resolver.coordinator().pool().stats(),
        }
    }

    async fn process(&self, job: &DownloadJob) -> DownloadOutcome {
        let stream = match self.resolver.resolve(&job.track).await {
            Ok(stream) => stream,
            Err(err) => {
                return DownloadOutcome::Failed {
                    kind: classify_resolution(&err),
                    message: err.to_string(),
                };
            }
        };

        debug!(
            track = %job.track,
            provider_id = stream.track.id,
            quality = %stream.track.quality,
            "resolved, starting transfer"
        );

        let client = &self.client;
        let stream_ref = &stream;
        let dest = job.dest.as_path();
        // Stream URLs are absolute; the drawn endpoint only paces the attempt.
        let transferred = self
            .resolver
            .coordinator()
            .execute("transfer", move |_endpoint| async move {
                transfer::transfer_to_file(client, stream_ref, dest).await
            })
            .await;

        if let Err(err) = transferred {
            return DownloadOutcome::Failed {
                kind: FailureKind::Transfer,
                message: err.to_string(),
            };
        }

        self.apply_tags(&job.dest, &stream.track).await;
        DownloadOutcome::Success(job.dest.clone())
    }

    async fn apply_tags(&self, path: &std::path::Path, track: &ProviderTrack) {
        let Some(writer) = &self.tag_writer else {
            return;
        };

        let cover = match &track.cover_id {
            Some(cover_id) => match self.client.fetch_cover(cover_id).await {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    warn!(track_id = track.id, error = %err, "cover art fetch failed");
                    None
                }
            },
            None => None,
        };

        if let Err(err) = writer.write_tags(path, track, cover.as_deref()).await {
            warn!(path = %path.display(), error = %err, "tag writing failed");
        }
    }

    async fn record_failure(&self, track: &SourceTrack, kind: FailureKind, message: &str) {
        let Some(ledger) = &self.ledger else {
            return;
        };
        if let Err(err) = ledger.record(track, kind, message).await {
            error!(track = %track, error = %err, "could not append ledger record");
        }
    }
}

/// A resolution failure is permanent (`NotFound`) when the provider answered
/// and the track simply is not there; everything else is an availability
/// problem worth retrying on a later run.
fn classify_resolution(err: &ResolveError) -> FailureKind {
    if err.is_not_found() {
        FailureKind::NotFound
    } else {
        FailureKind::Unavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ProviderApi;
    use crate::config::{MatchConfig, PoolConfig, ProviderConfig};
    use crate::endpoint::EndpointPool;
    use crate::models::StreamInfo;
    use crate::retry::{RetryCoordinator, RetryPolicy};
    use parking_lot::Mutex;
    use tokio_util::sync::CancellationToken;

    fn track(title: &str) -> SourceTrack {
        SourceTrack::new(title, "artist")
    }

    struct UnreachableProvider;

    #[async_trait]
    impl ProviderApi for UnreachableProvider {
        async fn direct_song(
            &self,
            _base_url: &str,
            _query: &str,
        ) -> Result<StreamInfo, ResolveError> {
            panic!("a drained pool must not reach the provider");
        }

        async fn search(
            &self,
            _base_url: &str,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<ProviderTrack>, ResolveError> {
            panic!("a drained pool must not reach the provider");
        }

        async fn track_stream(
            &self,
            _base_url: &str,
            _track_id: u64,
        ) -> Result<StreamInfo, ResolveError> {
            panic!("a drained pool must not reach the provider");
        }
    }

    #[derive(Default)]
    struct RecordingLedger {
        rows: Mutex<Vec<(String, FailureKind)>>,
    }

    #[async_trait]
    impl FailureLedger for RecordingLedger {
        async fn record(
            &self,
            track: &SourceTrack,
            kind: FailureKind,
            _message: &str,
        ) -> Result<(), CollaboratorError> {
            self.rows.lock().push((track.title.clone(), kind));
            Ok(())
        }
    }

    #[test]
    fn classification_separates_misses_from_outages() {
        assert_eq!(
            classify_resolution(&ResolveError::NotFound),
            FailureKind::NotFound
        );
        assert_eq!(
            classify_resolution(&ResolveError::NoMatch {
                query: "a b".into(),
                best_score: 0.1
            }),
            FailureKind::NotFound
        );
        assert_eq!(
            classify_resolution(&ResolveError::Exhausted { attempts: 9 }),
            FailureKind::Unavailable
        );
        assert_eq!(
            classify_resolution(&ResolveError::PoolExhausted),
            FailureKind::Unavailable
        );
    }

    #[test]
    fn report_counts_by_outcome() {
        let report = SessionReport {
            outcomes: vec![
                (track("a"), DownloadOutcome::Success(PathBuf::from("a.flac"))),
                (track("b"), DownloadOutcome::Skipped("already present".into())),
                (
                    track("c"),
                    DownloadOutcome::Failed {
                        kind: FailureKind::NotFound,
                        message: "no match".into(),
                    },
                ),
                (track("d"), DownloadOutcome::Success(PathBuf::from("d.flac"))),
            ],
            elapsed: Duration::from_secs(1),
            pool_stats: PoolStats::default(),
        };
        assert_eq!(report.successes(), 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failures(), 1);
    }

    #[tokio::test]
    async fn drained_pool_fails_each_track_and_keeps_going() {
        // Every endpoint already in cooldown before the run starts.
        let pool = Arc::new(EndpointPool::new(
            (0..2).map(|i| format!("https://mirror{i}.example")),
            PoolConfig {
                failure_threshold: 1,
                cooldown_base: Duration::from_secs(600),
                ..PoolConfig::default()
            },
        ));
        for _ in 0..2 {
            let ep = pool.next_candidate().unwrap();
            pool.report_failure(ep.id);
        }

        let coordinator = RetryCoordinator::new(
            pool,
            RetryPolicy {
                jitter: false,
                ..RetryPolicy::default()
            },
            CancellationToken::new(),
        );
        let resolver = TrackResolver::new(
            Arc::new(UnreachableProvider),
            coordinator,
            MatchConfig::default(),
        );
        let client = ProviderClient::new(ProviderConfig::default()).unwrap();
        let ledger = Arc::new(RecordingLedger::default());
        let orchestrator = DownloadOrchestrator::new(client, resolver, Duration::ZERO)
            .with_ledger(ledger.clone());

        let jobs = vec![
            DownloadJob {
                track: track("first"),
                dest: PathBuf::from("first.flac"),
            },
            DownloadJob {
                track: track("second"),
                dest: PathBuf::from("second.flac"),
            },
        ];
        let report = orchestrator.run(jobs).await;

        // Both tracks failed as unavailable, neither aborted the run.
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.failures(), 2);
        for (_, outcome) in &report.outcomes {
            assert!(matches!(
                outcome,
                DownloadOutcome::Failed {
                    kind: FailureKind::Unavailable,
                    ..
                }
            ));
        }

        let rows = ledger.rows.lock();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "first");
        assert_eq!(rows[1].0, "second");
    }
}
