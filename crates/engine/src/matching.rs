//! Track-name normalization and similarity scoring.
//!
//! Scoring is a pure function of (normalized source track, normalized
//! candidate): identical inputs always produce the same score and the same
//! winning candidate.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::MatchConfig;
use crate::models::{MatchCandidate, ProviderTrack, SourceTrack};

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[(\[].*?[)\]]").expect("valid regex"));
static VERSION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(from|feat|ft|vs|remix|mix|version)\b.*").expect("valid regex")
});
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Normalize a track or artist name for comparison: drop bracketed
/// qualifiers ("(Remastered 2011)"), cut at remix/version markers, strip
/// punctuation, collapse whitespace, lowercase.
pub fn normalize(name: &str) -> String {
    let stripped = BRACKETED.replace_all(name, "");
    let stripped = stripped.replace(['(', ')'], "");
    let stripped = VERSION_MARKER.replace(&stripped, "");
    let stripped = NON_WORD.replace_all(&stripped, " ");
    WHITESPACE
        .replace_all(&stripped, " ")
        .trim()
        .to_lowercase()
}

/// Token set of the normalized name.
pub fn normalized_tokens(name: &str) -> HashSet<String> {
    normalize(name)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn overlap_ratio(source: &HashSet<String>, candidate: &HashSet<String>) -> f64 {
    let shared = source.intersection(candidate).count();
    shared as f64 / source.len().max(1) as f64
}

/// Combined title/artist similarity in [0, 1]. Title outweighs artist since
/// artist strings vary more across providers.
pub fn score(config: &MatchConfig, source: &SourceTrack, candidate: &ProviderTrack) -> f64 {
    let title_tokens = normalized_tokens(&source.title);
    let artist_tokens = normalized_tokens(&source.artist);
    let candidate_title = normalized_tokens(&candidate.title);
    let candidate_artist = normalized_tokens(&candidate.artist);

    let title_match = overlap_ratio(&title_tokens, &candidate_title);
    let artist_match = overlap_ratio(&artist_tokens, &candidate_artist);
    title_match * config.title_weight + artist_match * config.artist_weight
}

const SCORE_TIE_EPSILON: f64 = 1e-9;

/// Pick the highest-scoring candidate. On a tie, prefer the candidate whose
/// duration is closest to the source's (when both sides expose one),
/// otherwise keep first-returned order.
pub fn best_candidate(
    config: &MatchConfig,
    source: &SourceTrack,
    candidates: Vec<ProviderTrack>,
) -> Option<MatchCandidate> {
    let mut best: Option<MatchCandidate> = None;
    for track in candidates {
        let candidate_score = score(config, source, &track);
        match &best {
            None => {
                best = Some(MatchCandidate {
                    track,
                    score: candidate_score,
                });
            }
            Some(current) if candidate_score > current.score + SCORE_TIE_EPSILON => {
                best = Some(MatchCandidate {
                    track,
                    score: candidate_score,
                });
            }
            Some(current) if (candidate_score - current.score).abs() <= SCORE_TIE_EPSILON => {
                if let Some(source_duration) = source.duration_secs {
                    let current_gap = current.track.duration_secs.abs_diff(source_duration);
                    let candidate_gap = track.duration_secs.abs_diff(source_duration);
                    if candidate_gap < current_gap {
                        best = Some(MatchCandidate {
                            track,
                            score: candidate_score,
                        });
                    }
                }
                // No duration on the source side: first-returned wins.
            }
            Some(_) => {}
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_track(title: &str, artist: &str, duration_secs: u32) -> ProviderTrack {
        ProviderTrack {
            id: 1,
            title: title.to_string(),
            artist: artist.to_string(),
            album: String::new(),
            duration_secs,
            quality: "LOSSLESS".to_string(),
            cover_id: None,
        }
    }

    #[test]
    fn normalize_strips_parenthetical_qualifiers() {
        assert_eq!(normalize("Song (Remastered 2011)"), "song");
        assert_eq!(normalize("Song [Live at Wembley]"), "song");
    }

    #[test]
    fn normalize_cuts_at_version_markers() {
        assert_eq!(normalize("Harder Better feat. Someone"), "harder better");
        assert_eq!(normalize("One More Time - Club Mix"), "one more time club");
        assert_eq!(normalize("Levels Radio Version"), "levels radio");
    }

    #[test]
    fn normalize_collapses_whitespace_and_punctuation() {
        assert_eq!(normalize("  Don't   Stop,  Believin'! "), "don t stop believin");
    }

    #[test]
    fn scoring_is_deterministic() {
        let config = MatchConfig::default();
        let source = SourceTrack::new("Song (Remastered 2011)", "Artist");
        let candidate = provider_track("Song", "Artist", 200);
        let first = score(&config, &source, &candidate);
        let second = score(&config, &source, &candidate);
        assert_eq!(first, second);
        assert!(first > config.acceptance_threshold);
    }

    #[test]
    fn exact_match_scores_one() {
        let config = MatchConfig::default();
        let source = SourceTrack::new("One More Time", "Daft Punk");
        let candidate = provider_track("One More Time", "Daft Punk", 320);
        let s = score(&config, &source, &candidate);
        assert!((s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unrelated_candidate_scores_below_threshold() {
        let config = MatchConfig::default();
        let source = SourceTrack::new("Bohemian Rhapsody", "Queen");
        let candidate = provider_track("Smooth Operator", "Sade", 258);
        assert!(score(&config, &source, &candidate) < config.acceptance_threshold);
    }

    #[test]
    fn tie_without_durations_keeps_first_returned() {
        let config = MatchConfig::default();
        let source = SourceTrack::new("Song", "Artist");
        let first = provider_track("Song", "Artist", 100);
        let mut second = provider_track("Song", "Artist", 300);
        second.id = 2;
        let winner = best_candidate(&config, &source, vec![first, second]).unwrap();
        assert_eq!(winner.track.id, 1);
    }

    #[test]
    fn tie_with_source_duration_prefers_closest() {
        let config = MatchConfig::default();
        let mut source = SourceTrack::new("Song", "Artist");
        source.duration_secs = Some(290);
        let first = provider_track("Song", "Artist", 100);
        let mut second = provider_track("Song", "Artist", 300);
        second.id = 2;
        let winner = best_candidate(&config, &source, vec![first, second]).unwrap();
        assert_eq!(winner.track.id, 2);
    }

    #[test]
    fn higher_score_beats_return_order() {
        let config = MatchConfig::default();
        let source = SourceTrack::new("Around the World", "Daft Punk");
        let weak = provider_track("Around the World", "Somebody Else", 228);
        let mut strong = provider_track("Around the World", "Daft Punk", 228);
        strong.id = 7;
        let winner = best_candidate(&config, &source, vec![weak, strong]).unwrap();
        assert_eq!(winner.track.id, 7);
    }

    #[test]
    fn no_candidates_yields_none() {
        let config = MatchConfig::default();
        let source = SourceTrack::new("Song", "Artist");
        assert!(best_candidate(&config, &source, Vec::new()).is_none());
    }
}
