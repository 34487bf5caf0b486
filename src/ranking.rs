//! Accuracy scoring and de-duplication of candidates.

use std::collections::HashSet;

use crate::candidate::{Candidate, CandidateKind};

/// Minimum text weight for a YouTube Music item to be scored at all.
pub const YTMUSIC_WEIGHT_THRESHOLD: f64 = 65.0;
/// YouTube Music candidates must score strictly above this to be returned.
pub const YTMUSIC_ACCURACY_THRESHOLD: f64 = 80.0;
/// Minimum text weight for a YouTube video to be kept.
pub const YOUTUBE_WEIGHT_THRESHOLD: f64 = 70.0;
/// Author weight from which a video counts as uploaded by the artist.
pub const AUTHOR_MATCH_THRESHOLD: f64 = 80.0;

const NEUTRAL_DURATION_PENALTY: f64 = 50.0;

/// Relative distance from the expected duration, in percent.
///
/// Without an expected duration (or with a zero one) a neutral penalty of 50 applies.
pub fn duration_penalty(expected_ms: Option<u64>, actual_ms: u64) -> f64 {
    match expected_ms {
        Some(expected) if expected > 0 => {
            expected.abs_diff(actual_ms) as f64 / expected as f64 * 100.0
        }
        _ => NEUTRAL_DURATION_PENALTY,
    }
}

// Share of the remaining gap to 100 granted per candidate kind.
fn kind_bonus(kind: &CandidateKind) -> f64 {
    match kind {
        CandidateKind::Song => 0.50,
        CandidateKind::Video => 0.25,
        _ => 0.05,
    }
}

fn close_gap(accuracy: f64, fraction: f64) -> f64 {
    accuracy + (100.0 - accuracy) * fraction
}

/// Accuracy of a YouTube Music item: text weight minus duration penalty, pulled
/// towards 100 by a kind-dependent fraction of what is left.
pub fn ytmusic_accuracy(weight: f64, penalty: f64, kind: &CandidateKind) -> f64 {
    close_gap(weight - penalty, kind_bonus(kind)).clamp(0.0, 100.0)
}

/// Accuracy of a YouTube video.
///
/// Starts from `100 - penalty`, closes up to 80% of the gap in proportion to the
/// views relative to the most viewed video of the same batch, then closes another
/// 60% when the uploader matches the requested artists.
pub fn youtube_accuracy(penalty: f64, views: u64, max_views: u64, author_weight: f64) -> f64 {
    let mut accuracy = 100.0 - penalty;

    let popularity = if max_views > 0 {
        (views as f64 / max_views as f64).min(1.0)
    } else {
        0.0
    };
    accuracy = close_gap(accuracy, 0.8 * popularity);

    if author_weight >= AUTHOR_MATCH_THRESHOLD {
        accuracy = close_gap(accuracy, 0.6);
    }
    accuracy.clamp(0.0, 100.0)
}

/// Drop repeated source ids (the first occurrence wins) and sort by accuracy.
///
/// The sort is stable, so equally accurate candidates keep their encounter order.
pub fn dedup_and_rank<I>(candidates: I) -> Vec<Candidate>
where
    I: IntoIterator<Item = Candidate>,
{
    let mut seen = HashSet::new();
    let mut unique: Vec<Candidate> = candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.source_id.clone()))
        .collect();
    unique.sort_by(|a, b| b.accuracy.total_cmp(&a.accuracy));
    unique
}
