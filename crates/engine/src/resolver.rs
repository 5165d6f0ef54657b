//! Two-strategy track resolution.
//!
//! Strategies run in strict priority order: a direct lookup (by provider
//! identifier, or the one-shot `/song/` query) first, the search-and-match
//! fallback second. The first strategy to yield a `StreamInfo` wins; a
//! semantic miss falls through, a transport exhaustion aborts the track.

use std::sync::Arc;

use tracing::{debug, info};

use crate::client::ProviderApi;
use crate::config::MatchConfig;
use crate::error::ResolveError;
use crate::matching;
use crate::models::{SourceTrack, StreamInfo};
use crate::retry::RetryCoordinator;

pub struct TrackResolver {
    api: Arc<dyn ProviderApi>,
    coordinator: RetryCoordinator,
    matching: MatchConfig,
}

impl TrackResolver {
    pub fn new(
        api: Arc<dyn ProviderApi>,
        coordinator: RetryCoordinator,
        matching: MatchConfig,
    ) -> Self {
        Self {
            api,
            coordinator,
            matching,
        }
    }

    pub fn coordinator(&self) -> &RetryCoordinator {
        &self.coordinator
    }

    /// Resolve a source track into a stream descriptor.
    pub async fn resolve(&self, track: &SourceTrack) -> Result<StreamInfo, ResolveError> {
        match self.direct_lookup(track).await {
            Ok(info) => return Ok(info),
            Err(err) if err.is_not_found() => {
                debug!(track = %track, "direct strategy missed, falling back to search");
            }
            Err(err) => return Err(err),
        }
        self.search_and_match(track).await
    }

    /// Strategy 1: direct lookup. With a known identifier this is one
    /// `/track/` exchange; without one the `/song/` endpoint resolves the
    /// combined query in a single call.
    async fn direct_lookup(&self, track: &SourceTrack) -> Result<StreamInfo, ResolveError> {
        let api = self.api.as_ref();
        if let Some(id) = track.provider_id {
            debug!(track = %track, id, "direct lookup by identifier");
            return self
                .coordinator
                .execute("direct lookup", move |endpoint| async move {
                    api.track_stream(&endpoint.base_url, id).await
                })
                .await;
        }

        let query = track.search_query();
        debug!(track = %track, "direct lookup via /song/");
        let query_ref = query.as_str();
        self.coordinator
            .execute("direct lookup", move |endpoint| async move {
                api.direct_song(&endpoint.base_url, query_ref).await
            })
            .await
    }

    /// Strategy 2: search, score, pick the best candidate, then fetch its
    /// stream descriptor.
    async fn search_and_match(&self, track: &SourceTrack) -> Result<StreamInfo, ResolveError> {
        let api = self.api.as_ref();
        let query = track.search_query();
        let query_ref = query.as_str();
        let limit = self.matching.max_candidates;

        let candidates = self
            .coordinator
            .execute("search", move |endpoint| async move {
                api.search(&endpoint.base_url, query_ref, limit).await
            })
            .await?;

        debug!(candidates = candidates.len(), track = %track, "scoring search results");
        let Some(best) = matching::best_candidate(&self.matching, track, candidates) else {
            return Err(ResolveError::NoMatch {
                query,
                best_score: 0.0,
            });
        };

        if best.score < self.matching.acceptance_threshold {
            return Err(ResolveError::NoMatch {
                query,
                best_score: best.score,
            });
        }

        info!(
            track = %track,
            matched_title = %best.track.title,
            matched_artist = %best.track.artist,
            score = format!("{:.2}", best.score).as_str(),
            "match accepted"
        );

        let id = best.track.id;
        let mut stream = self
            .coordinator
            .execute("stream lookup", move |endpoint| async move {
                api.track_stream(&endpoint.base_url, id).await
            })
            .await?;

        // The scored candidate is the authoritative metadata; the stream
        // payload's own track record is often a stub.
        stream.track = best.track;
        Ok(stream)
    }
}
