mod cli;
mod config;
mod error;
mod output;

use std::process;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use shoal_engine::orchestrator::{DownloadJob, DownloadOrchestrator};
use shoal_engine::{
    DownloadOutcome, EndpointPool, ProviderClient, RetryCoordinator, SourceTrack, TrackResolver,
};
use shoal_library::{
    CsvLedger, LibraryScanner, LoftyTagWriter, PlaylistCache, PlaylistClient, SkipCache, scanner,
};

use crate::cli::Args;
use crate::config::AppConfig;
use crate::error::Result;
use crate::output::PreSkipped;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = AppConfig::load(&args)?;
    scanner::ensure_directory(&config.dest_dir)?;

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after the current track");
                token.cancel();
            }
        });
    }

    let tracks = fetch_playlist(&config, args.refresh_playlist).await?;
    if tracks.is_empty() {
        warn!("playlist is empty, nothing to do");
        return Ok(());
    }

    let library = LibraryScanner::scan(&config.dest_dir);
    let mut skip_cache = SkipCache::load(config.skip_cache_file(), config.skip_cache_expiry);
    info!(
        playlist = tracks.len(),
        on_disk = library.file_count(),
        skip_cached = skip_cache.len(),
        "starting run"
    );

    let (jobs, pre) = partition_tracks(&config, &tracks, &library, &skip_cache, args.retry_failed);
    if !pre.skip_cached.is_empty() && !args.retry_failed {
        info!(
            count = pre.skip_cached.len(),
            "skipping previously failed tracks (rerun with --retry-failed to force)"
        );
    }

    let engine = &config.engine;
    let pool = Arc::new(EndpointPool::new(
        engine.provider.endpoints.iter().cloned(),
        engine.pool.clone(),
    ));
    let coordinator = RetryCoordinator::new(pool, engine.retry.clone(), token);
    let client = ProviderClient::new(engine.provider.clone())?;
    let resolver = TrackResolver::new(
        Arc::new(client.clone()),
        coordinator,
        engine.matching.clone(),
    );
    let orchestrator = DownloadOrchestrator::new(client, resolver, engine.inter_track_delay)
        .with_tag_writer(Arc::new(LoftyTagWriter))
        .with_ledger(Arc::new(CsvLedger::new(config.ledger_file())));

    let report = orchestrator.run(jobs).await;

    for (track, outcome) in &report.outcomes {
        match outcome {
            DownloadOutcome::Success(_) => {
                if let Err(err) = skip_cache.clear(&track.title, &track.artist) {
                    warn!(track = %track, error = %err, "could not update skip cache");
                }
            }
            DownloadOutcome::Failed { kind, .. } => {
                if let Err(err) = skip_cache.add(&track.title, &track.artist, &kind.to_string()) {
                    warn!(track = %track, error = %err, "could not update skip cache");
                }
            }
            DownloadOutcome::Skipped(_) => {}
        }
    }

    output::print_summary(&report, &pre, tracks.len());
    Ok(())
}

async fn fetch_playlist(config: &AppConfig, refresh: bool) -> Result<Vec<SourceTrack>> {
    let cache = PlaylistCache::new(config.playlist_cache_file(), config.playlist_cache_ttl);
    if !refresh
        && let Some(cached) = cache.get()
    {
        info!(tracks = cached.len(), "playlist loaded from cache");
        return Ok(cached);
    }

    let client = PlaylistClient::new(
        config.credentials.clone(),
        config.engine.provider.request_timeout,
    )?;
    let tracks = client.fetch_tracks(&config.playlist_url).await?;
    if !tracks.is_empty()
        && let Err(err) = cache.put(&tracks)
    {
        warn!(error = %err, "could not cache playlist");
    }
    Ok(tracks)
}

fn partition_tracks(
    config: &AppConfig,
    tracks: &[SourceTrack],
    library: &LibraryScanner,
    skip_cache: &SkipCache,
    retry_failed: bool,
) -> (Vec<DownloadJob>, PreSkipped) {
    let mut pre = PreSkipped {
        already_present: 0,
        skip_cached: Vec::new(),
    };
    let mut jobs = Vec::new();

    for track in tracks {
        if library.contains(track) {
            pre.already_present += 1;
            continue;
        }
        if !retry_failed && skip_cache.contains(&track.title, &track.artist) {
            let reason = skip_cache
                .reason(&track.title, &track.artist)
                .unwrap_or("previous failure")
                .to_string();
            pre.skip_cached.push((track.clone(), reason));
            continue;
        }
        jobs.push(DownloadJob {
            track: track.clone(),
            dest: config.dest_dir.join(scanner::output_file_name(track)),
        });
    }

    (jobs, pre)
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_level(verbose))
        .init();
}
