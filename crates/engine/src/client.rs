//! HTTP client for the resolution mirrors.
//!
//! Every method takes the endpoint base URL chosen by the retry coordinator;
//! the client itself is endpoint-agnostic. Response shapes vary across
//! mirrors (list vs object payloads, direct URLs vs base64 manifests), so
//! parsing is deliberately tolerant.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::ProviderConfig;
use crate::error::ResolveError;
use crate::models::{ProviderTrack, StreamInfo};

const COVER_BASE_URL: &str = "https://resources.tidal.com/images";
const MAX_QUERY_CHARS: usize = 100;

static URL_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[\w\-.~:?#\[\]@!$&'()*+,;=%/]+").expect("valid regex")
});

/// Build a reqwest client from the provider configuration.
pub fn create_client(config: &ProviderConfig) -> Result<Client, ResolveError> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(config.headers.clone())
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(ResolveError::from)
}

/// The three resolution exchanges the resolver drives. `ProviderClient` is
/// the HTTP implementation; the seam exists so resolution logic can be
/// exercised against stub providers.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// One-shot free-text lookup straight to a stream descriptor.
    async fn direct_song(&self, base_url: &str, query: &str) -> Result<StreamInfo, ResolveError>;

    /// Free-text search returning candidate records for scoring.
    async fn search(
        &self,
        base_url: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ProviderTrack>, ResolveError>;

    /// Stream descriptor for a known provider identifier.
    async fn track_stream(&self, base_url: &str, track_id: u64)
    -> Result<StreamInfo, ResolveError>;
}

#[derive(Clone)]
pub struct ProviderClient {
    client: Client,
    config: ProviderConfig,
}

impl ProviderClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ResolveError> {
        let client = create_client(&config)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) fn download_timeout(&self) -> Duration {
        self.config.download_timeout
    }

    async fn get_json(
        &self,
        url: String,
        params: &[(&str, &str)],
        operation: &'static str,
    ) -> Result<Value, ResolveError> {
        debug!(url = %url, ?params, "provider request");
        let response = self
            .client
            .get(&url)
            .query(params)
            .timeout(self.config.request_timeout)
            .send()
            .await?;
        let response = check_status(response, &url, operation)?;
        Ok(response.json().await?)
    }

    /// Combined search-and-stream lookup: the `/song/` endpoint resolves a
    /// free-text query straight to a stream descriptor in one exchange.
    #[instrument(skip(self), level = "debug")]
    pub async fn direct_song(
        &self,
        base_url: &str,
        query: &str,
    ) -> Result<StreamInfo, ResolveError> {
        let query = truncate_chars(query, MAX_QUERY_CHARS);
        let data = self
            .get_json(
                format!("{base_url}/song/"),
                &[("q", query.as_str()), ("quality", &self.config.quality)],
                "direct lookup",
            )
            .await?;
        parse_stream_payload(&data, &self.config.quality, || ProviderTrack {
            id: 0,
            title: query.clone(),
            artist: String::new(),
            album: String::new(),
            duration_secs: 0,
            quality: self.config.quality.clone(),
            cover_id: None,
        })
    }

    /// Free-text search returning candidate records for scoring.
    #[instrument(skip(self), level = "debug")]
    pub async fn search(
        &self,
        base_url: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ProviderTrack>, ResolveError> {
        let query = truncate_chars(query, MAX_QUERY_CHARS);
        let data = self
            .get_json(
                format!("{base_url}/search/"),
                &[("s", query.as_str())],
                "search",
            )
            .await?;

        // Mirrors answer with {"tracks": {"items": [..]}}, {"items": [..]}
        // or a bare list.
        let items: Vec<Value> = match &data {
            Value::Object(map) => match map.get("tracks") {
                Some(Value::Object(tracks)) => tracks
                    .get("items")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
                Some(Value::Array(tracks)) => tracks.clone(),
                _ => map
                    .get("items")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
            },
            Value::Array(list) => list.clone(),
            _ => Vec::new(),
        };

        let tracks: Vec<ProviderTrack> = items
            .iter()
            .take(limit)
            .filter_map(parse_track)
            .collect();
        debug!(candidates = tracks.len(), "search parsed");
        Ok(tracks)
    }

    /// Stream descriptor for a known provider identifier.
    #[instrument(skip(self), level = "debug")]
    pub async fn track_stream(
        &self,
        base_url: &str,
        track_id: u64,
    ) -> Result<StreamInfo, ResolveError> {
        let id = track_id.to_string();
        let data = self
            .get_json(
                format!("{base_url}/track/"),
                &[("id", id.as_str()), ("quality", &self.config.quality)],
                "stream lookup",
            )
            .await?;
        parse_stream_payload(&data, &self.config.quality, || ProviderTrack {
            id: track_id,
            title: "Unknown".to_string(),
            artist: "Unknown".to_string(),
            album: "Unknown".to_string(),
            duration_secs: 0,
            quality: self.config.quality.clone(),
            cover_id: None,
        })
    }

    /// Fetch cover art bytes for an album cover UUID. Best-effort: callers
    /// treat any failure as a missing cover.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_cover(&self, cover_id: &str) -> Result<Vec<u8>, ResolveError> {
        let url = cover_url(cover_id).ok_or_else(|| {
            ResolveError::invalid_url(cover_id, "cover id is not a dash-separated UUID")
        })?;
        let response = self
            .client
            .get(&url)
            .timeout(self.config.request_timeout)
            .send()
            .await?;
        let response = check_status(response, &url, "cover fetch")?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ProviderApi for ProviderClient {
    async fn direct_song(&self, base_url: &str, query: &str) -> Result<StreamInfo, ResolveError> {
        ProviderClient::direct_song(self, base_url, query).await
    }

    async fn search(
        &self,
        base_url: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ProviderTrack>, ResolveError> {
        ProviderClient::search(self, base_url, query, limit).await
    }

    async fn track_stream(
        &self,
        base_url: &str,
        track_id: u64,
    ) -> Result<StreamInfo, ResolveError> {
        ProviderClient::track_stream(self, base_url, track_id).await
    }
}

/// Map a response status onto the error taxonomy: 404 is a semantic miss,
/// 429/5xx are transient, remaining non-success statuses are fatal.
fn check_status(
    response: Response,
    url: &str,
    operation: &'static str,
) -> Result<Response, ResolveError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        debug!(url = %url, "provider answered 404");
        return Err(ResolveError::NotFound);
    }
    Err(ResolveError::http_status(status, url, operation))
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Convert a cover UUID into the CDN path:
/// `2b3c28fe-bfb8-48b1-9ad7-f912847f3d71` -> `2b3c28fe/bfb8/48b1/9ad7/f912847f3d71`.
fn cover_url(cover_id: &str) -> Option<String> {
    let parts: Vec<&str> = cover_id.split('-').collect();
    if parts.len() != 5 {
        return None;
    }
    Some(format!(
        "{COVER_BASE_URL}/{}/1280x1280.jpg",
        parts.join("/")
    ))
}

/// Parse one track record from a provider payload.
fn parse_track(item: &Value) -> Option<ProviderTrack> {
    let obj = item.as_object()?;

    let id = obj.get("id").and_then(Value::as_u64)?;
    let title = obj.get("title").and_then(Value::as_str)?.to_string();
    if title.is_empty() {
        return None;
    }

    let artist = obj
        .get("artists")
        .and_then(Value::as_array)
        .and_then(|artists| artists.first())
        .map(|first| match first {
            Value::Object(a) => a
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            other => other.as_str().unwrap_or_default().to_string(),
        })
        .filter(|name| !name.is_empty())
        .or_else(|| {
            obj.get("artist")
                .and_then(Value::as_object)
                .and_then(|a| a.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_default();

    let (album, cover_id) = match obj.get("album").and_then(Value::as_object) {
        Some(album) => (
            album
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            album
                .get("cover")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        ),
        None => (String::new(), None),
    };

    Some(ProviderTrack {
        id,
        title,
        artist,
        album,
        duration_secs: obj
            .get("duration")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
        quality: obj
            .get("audioQuality")
            .and_then(Value::as_str)
            .unwrap_or("LOSSLESS")
            .to_string(),
        cover_id,
    })
}

/// Extract a `StreamInfo` from a `/song/` or `/track/` payload.
///
/// List payloads are `[track, info, direct_url]`; object payloads carry the
/// URL under `originalTrackUrl`/`url`/`stream_url` or inside a base64
/// `manifest`. A payload with no extractable URL is a semantic miss.
fn parse_stream_payload(
    data: &Value,
    quality: &str,
    fallback_track: impl FnOnce() -> ProviderTrack,
) -> Result<StreamInfo, ResolveError> {
    let (track_value, info_value, direct_url) = match data {
        Value::Array(list) => {
            if list.is_empty() {
                return Err(ResolveError::NotFound);
            }
            (
                list.first().cloned().unwrap_or(Value::Null),
                list.get(1).cloned().unwrap_or(Value::Null),
                list.get(2).and_then(Value::as_str).map(str::to_string),
            )
        }
        Value::Object(map) => (
            data.clone(),
            map.get("info").cloned().unwrap_or(Value::Null),
            map.get("originalTrackUrl")
                .or_else(|| map.get("url"))
                .or_else(|| map.get("stream_url"))
                .and_then(Value::as_str)
                .map(str::to_string),
        ),
        _ => return Err(ResolveError::NotFound),
    };

    let stream_url = direct_url
        .or_else(|| {
            info_value
                .get("manifest")
                .and_then(Value::as_str)
                .and_then(extract_url_from_manifest)
        })
        .or_else(|| {
            track_value
                .get("manifest")
                .and_then(Value::as_str)
                .and_then(extract_url_from_manifest)
        });

    let Some(stream_url) = stream_url else {
        debug!("stream descriptor carries no usable URL");
        return Err(ResolveError::NotFound);
    };

    let mut track = parse_track(&track_value).unwrap_or_else(fallback_track);
    if track.quality.is_empty() {
        track.quality = quality.to_string();
    }
    Ok(StreamInfo {
        track,
        stream_url,
        expected_bytes: None,
    })
}

/// Decode a base64 manifest and pull the first stream URL out of it. The
/// decoded body is either JSON with a `urls` list or free text scanned for
/// an http(s) URL.
fn extract_url_from_manifest(manifest: &str) -> Option<String> {
    let decoded = BASE64.decode(manifest.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    if let Ok(parsed) = serde_json::from_str::<Value>(&decoded)
        && let Some(url) = parsed
            .get("urls")
            .and_then(Value::as_array)
            .and_then(|urls| urls.first())
            .and_then(Value::as_str)
    {
        return Some(url.to_string());
    }

    URL_IN_TEXT
        .find(&decoded)
        .map(|m| m.as_str().to_string())
}
