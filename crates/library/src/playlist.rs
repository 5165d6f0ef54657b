//! Source playlist client: client-credentials auth and paginated track
//! listing, reduced to the (title, first artist) pairs the engine consumes.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use shoal_engine::SourceTrack;
use tracing::{debug, info};

use crate::error::LibraryError;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";

#[derive(Debug, Clone)]
pub struct PlaylistCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Read-only playlist client. One instance per run; the access token is
/// fetched once and reused for every page.
pub struct PlaylistClient {
    http: Client,
    credentials: PlaylistCredentials,
}

impl PlaylistClient {
    pub fn new(
        credentials: PlaylistCredentials,
        request_timeout: Duration,
    ) -> Result<Self, LibraryError> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { http, credentials })
    }

    /// The playlist identifier is the last path segment, query stripped.
    pub fn playlist_id_from_url(url: &str) -> Result<&str, LibraryError> {
        let id = url
            .rsplit('/')
            .next()
            .map(|segment| segment.split('?').next().unwrap_or(segment))
            .unwrap_or("");
        if id.is_empty() {
            return Err(LibraryError::InvalidPlaylistUrl { input: url.into() });
        }
        Ok(id)
    }

    async fn access_token(&self) -> Result<String, LibraryError> {
        let basic = BASE64.encode(format!(
            "{}:{}",
            self.credentials.client_id, self.credentials.client_secret
        ));
        let response = self
            .http
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {basic}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LibraryError::Api {
                status,
                operation: "token",
            });
        }
        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    /// Fetch every (title, first artist) pair of the playlist, in playlist
    /// order, following pagination until `next` is null.
    pub async fn fetch_tracks(&self, playlist_url: &str) -> Result<Vec<SourceTrack>, LibraryError> {
        let playlist_id = Self::playlist_id_from_url(playlist_url)?;
        debug!(playlist_id, "fetching playlist");
        let token = self.access_token().await?;

        let mut tracks = Vec::new();
        let mut next_url = Some(format!("{API_BASE}/playlists/{playlist_id}/tracks"));
        let mut page = 0usize;

        while let Some(url) = next_url {
            page += 1;
            debug!(page, "fetching playlist page");
            let response = self.http.get(&url).bearer_auth(&token).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(LibraryError::Api {
                    status,
                    operation: "playlist tracks",
                });
            }
            let body: Value = response.json().await?;
            extract_page(&body, &mut tracks)?;
            next_url = body
                .get("next")
                .and_then(Value::as_str)
                .map(str::to_string);
        }

        info!(tracks = tracks.len(), pages = page, "playlist fetched");
        Ok(tracks)
    }
}

/// Pull (title, first artist) out of one page. Items without a track record
/// (removed or local entries) are skipped.
fn extract_page(body: &Value, out: &mut Vec<SourceTrack>) -> Result<(), LibraryError> {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| LibraryError::payload("page without `items` array"))?;

    for item in items {
        let Some(track) = item.get("track").filter(|t| !t.is_null()) else {
            continue;
        };
        let Some(title) = track.get("name").and_then(Value::as_str) else {
            continue;
        };
        let Some(artist) = track
            .get("artists")
            .and_then(Value::as_array)
            .and_then(|artists| artists.first())
            .and_then(|artist| artist.get("name"))
            .and_then(Value::as_str)
        else {
            continue;
        };
        let mut source = SourceTrack::new(title, artist);
        source.duration_secs = track
            .get("duration_ms")
            .and_then(Value::as_u64)
            .map(|ms| (ms / 1000) as u32);
        out.push(source);
    }
    Ok(())
}
