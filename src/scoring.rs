//! Similarity scores between local tracks and candidate tracks, and between a local album and a
//! candidate release. Scores are bounded to [0, 1] and carry the per-signal contributions they were
//! built from, so a match can always be explained.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::Serialize;

use crate::candidates::{CandidateRelease, CandidateTrack};
use crate::local::{LocalCollection, LocalTrack};
use crate::names::NormalizedName;

/// String similarity is normalized Levenshtein over canonical forms, counted in chars. Changing the
/// algorithm changes every score, so it is pinned here by name.
pub const SIMILARITY_ALGORITHM: &str = "strsim-0.11/normalized_levenshtein";

pub const TITLE_WEIGHT: f64 = 0.6;
pub const POSITION_WEIGHT: f64 = 0.2;
pub const DURATION_WEIGHT: f64 = 0.2;
/// Multiplier applied when the tracks carry different qualifiers (live, remix, ...).
pub const DISAMBIGUATOR_PENALTY: f64 = 0.5;
/// Position agreement halves with every slot of distance.
pub const POSITION_DECAY: f64 = 0.5;
pub const DURATION_TOLERANCE: Duration = Duration::from_secs(3);
/// Beyond the tolerance, duration agreement falls linearly to zero over this span.
pub const DURATION_FALLOFF: Duration = Duration::from_secs(12);

pub const ARTIST_WEIGHT: f64 = 0.5;
pub const ALBUM_WEIGHT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Title,
    Position,
    Duration,
    /// Recorded as the multiplier applied, not as an additive contribution.
    DisambiguatorPenalty,
    Artist,
    Album,
    ReleaseName,
    TrackAlignment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchScore {
    value: f64,
    components: BTreeMap<Signal, f64>,
}

impl MatchScore {
    pub fn new(value: f64, components: BTreeMap<Signal, f64>) -> Self {
        let value = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
        MatchScore { value, components }
    }

    pub fn zero() -> Self {
        MatchScore::new(0.0, BTreeMap::new())
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn component(&self, signal: Signal) -> Option<f64> {
        self.components.get(&signal).copied()
    }

    pub fn components(&self) -> &BTreeMap<Signal, f64> {
        &self.components
    }
}

pub fn text_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    strsim::normalized_levenshtein(a, b).clamp(0.0, 1.0)
}

/// The best similarity over every pair of spellings.
pub fn name_similarity(a: &NormalizedName, b: &NormalizedName) -> f64 {
    if a.is_related(b) {
        return 1.0;
    }
    let mut best = 0.0_f64;
    for x in a.variants() {
        for y in b.variants() {
            best = best.max(text_similarity(x, y));
        }
    }
    best
}

pub fn position_agreement(hint: Option<u32>, position: u32) -> f64 {
    match hint {
        Some(hint) => POSITION_DECAY.powi(hint.abs_diff(position).min(i32::MAX as u32) as i32),
        None => 0.0,
    }
}

pub fn duration_agreement(a: Option<Duration>, b: Option<Duration>) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0.0;
    };
    let delta = if a > b { a - b } else { b - a };
    if delta <= DURATION_TOLERANCE {
        return 1.0;
    }
    let over = (delta - DURATION_TOLERANCE).as_secs_f64();
    (1.0 - over / DURATION_FALLOFF.as_secs_f64()).max(0.0)
}

/// What the scorer needs to know about a local track, computed once per track rather than once per
/// candidate pair.
#[derive(Debug, Clone)]
pub(crate) struct TrackFeatures {
    pub title: NormalizedName,
    pub disambiguators: BTreeSet<String>,
    pub position_hint: Option<u32>,
    pub duration: Option<Duration>,
}

impl TrackFeatures {
    pub fn of(track: &LocalTrack) -> Self {
        TrackFeatures {
            title: track.title(),
            disambiguators: track.disambiguators(),
            position_hint: track.position_hint(),
            duration: track.duration(),
        }
    }
}

pub fn score_track(local: &LocalTrack, candidate: &CandidateTrack) -> MatchScore {
    score_features(&TrackFeatures::of(local), candidate)
}

pub(crate) fn score_features(local: &TrackFeatures, candidate: &CandidateTrack) -> MatchScore {
    let title = TITLE_WEIGHT * name_similarity(&local.title, candidate.names());
    let position = POSITION_WEIGHT * position_agreement(local.position_hint, candidate.position());
    let duration = DURATION_WEIGHT * duration_agreement(local.duration, candidate.duration());
    let penalty = if &local.disambiguators == candidate.disambiguators() {
        1.0
    } else {
        DISAMBIGUATOR_PENALTY
    };

    let components = BTreeMap::from([
        (Signal::Title, title),
        (Signal::Position, position),
        (Signal::Duration, duration),
        (Signal::DisambiguatorPenalty, penalty),
    ]);
    MatchScore::new((title + position + duration) * penalty, components)
}

/// Name-level agreement between the local album and a release: artist and album title.
pub fn score_release(local: &LocalCollection, release: &CandidateRelease) -> MatchScore {
    score_release_names(&local.artist_hint(), &local.album_hint(), release)
}

pub(crate) fn score_release_names(artist: &NormalizedName, album: &NormalizedName, release: &CandidateRelease) -> MatchScore {
    let artist = ARTIST_WEIGHT * name_similarity(artist, release.artist());
    let album = ALBUM_WEIGHT * name_similarity(album, release.album());
    let components = BTreeMap::from([(Signal::Artist, artist), (Signal::Album, album)]);
    MatchScore::new(artist + album, components)
}
