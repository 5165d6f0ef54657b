//! Configuration assembly: defaults, then environment, then flags.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use shoal_engine::EngineConfig;
use shoal_library::PlaylistCredentials;

use crate::cli::Args;
use crate::error::{AppError, Result};

const DEFAULT_DEST_DIR: &str = "downloads";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_PLAYLIST_CACHE_TTL: Duration = Duration::from_secs(3600);
const DEFAULT_SKIP_CACHE_EXPIRY: Duration = Duration::from_secs(86_400);

#[derive(Debug)]
pub struct AppConfig {
    pub playlist_url: String,
    pub dest_dir: PathBuf,
    pub data_dir: PathBuf,
    pub credentials: PlaylistCredentials,
    pub engine: EngineConfig,
    pub playlist_cache_ttl: Duration,
    pub skip_cache_expiry: Duration,
}

impl AppConfig {
    pub fn load(args: &Args) -> Result<Self> {
        // A missing .env file is fine; the variables may come from the shell.
        dotenvy::dotenv().ok();

        let credentials = PlaylistCredentials {
            client_id: require_env("SPOTIFY_CLIENT_ID")?,
            client_secret: require_env("SPOTIFY_CLIENT_SECRET")?,
        };

        let playlist_url = args
            .playlist
            .clone()
            .or_else(|| env::var("PLAYLIST_URL").ok())
            .ok_or_else(|| {
                AppError::Config("no playlist: pass --playlist or set PLAYLIST_URL".to_string())
            })?;

        let dest_dir = args
            .dest
            .clone()
            .or_else(|| env::var("DOWNLOAD_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEST_DIR));

        let data_dir = args
            .data_dir
            .clone()
            .or_else(|| env::var("DATA_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let mut engine = EngineConfig::default();
        if !args.endpoints.is_empty() {
            engine.provider.endpoints = args.endpoints.clone();
        }
        if let Some(secs) = args.request_timeout {
            engine.provider.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = args.download_timeout {
            engine.provider.download_timeout = Duration::from_secs(secs);
        }
        if let Some(threshold) = args.threshold {
            engine.matching.acceptance_threshold = threshold;
        }
        engine
            .validate()
            .map_err(|err| AppError::Config(err.to_string()))?;

        let playlist_cache_ttl = duration_env("PLAYLIST_CACHE_TTL_SECS")
            .unwrap_or(DEFAULT_PLAYLIST_CACHE_TTL);
        let skip_cache_expiry =
            duration_env("ERROR_CACHE_EXPIRY_SECS").unwrap_or(DEFAULT_SKIP_CACHE_EXPIRY);

        Ok(Self {
            playlist_url,
            dest_dir,
            data_dir,
            credentials,
            engine,
            playlist_cache_ttl,
            skip_cache_expiry,
        })
    }

    pub fn playlist_cache_file(&self) -> PathBuf {
        self.data_dir.join("playlist_cache.json")
    }

    pub fn ledger_file(&self) -> PathBuf {
        self.data_dir.join("failed_downloads.csv")
    }

    pub fn skip_cache_file(&self) -> PathBuf {
        self.data_dir.join("error_cache.json")
    }
}

fn require_env(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("{name} is not set")))
}

fn duration_env(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
}
