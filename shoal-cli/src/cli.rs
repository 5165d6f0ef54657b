use std::path::PathBuf;

use clap::Parser;

/// Mirror a playlist into a local lossless library.
///
/// Credentials and default paths come from the environment (a `.env` file is
/// honored); flags override both.
#[derive(Parser, Debug)]
#[command(name = "shoal", version, about)]
pub struct Args {
    /// Playlist URL (or bare playlist id)
    #[arg(short, long)]
    pub playlist: Option<String>,

    /// Directory the audio files are written to
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// Directory for caches and the failure ledger
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Mirror base URL; repeat to replace the built-in list
    #[arg(long = "endpoint")]
    pub endpoints: Vec<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub request_timeout: Option<u64>,

    /// Stream transfer timeout in seconds
    #[arg(long)]
    pub download_timeout: Option<u64>,

    /// Minimum similarity score for search matches (0..=1)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Retry tracks that failed on earlier runs
    #[arg(long)]
    pub retry_failed: bool,

    /// Ignore the cached playlist and fetch a fresh copy
    #[arg(long)]
    pub refresh_playlist: bool,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Errors only
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}
