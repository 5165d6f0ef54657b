//! End-of-run summary printing.

use shoal_engine::orchestrator::SessionReport;
use shoal_engine::{DownloadOutcome, SourceTrack};

/// Tracks filtered out before the engine ran, with the reason.
pub struct PreSkipped {
    pub already_present: usize,
    pub skip_cached: Vec<(SourceTrack, String)>,
}

pub fn print_summary(report: &SessionReport, pre: &PreSkipped, playlist_len: usize) {
    println!();
    println!("==================== run summary ====================");
    println!("Playlist tracks:     {playlist_len}");
    println!("Already downloaded:  {}", pre.already_present);
    println!("Skipped (cached errors): {}", pre.skip_cached.len());
    println!("Downloaded:          {}", report.successes());
    println!("Failed:              {}", report.failures());
    println!(
        "Elapsed:             {:.1}s",
        report.elapsed.as_secs_f64()
    );
    println!(
        "Provider exchanges:  {} ({:.0}% ok)",
        report.pool_stats.total(),
        report.pool_stats.success_rate()
    );

    let failed: Vec<_> = report
        .outcomes
        .iter()
        .filter_map(|(track, outcome)| match outcome {
            DownloadOutcome::Failed { kind, .. } => Some((track, kind)),
            _ => None,
        })
        .collect();
    if !failed.is_empty() {
        println!();
        println!("Failed tracks:");
        for (track, kind) in failed {
            println!("  - {track} ({kind})");
        }
    }
    println!("=====================================================");
}
