use std::sync::Once;
use std::time::Duration;

use crate::candidates::{CandidateRelease, CandidateTrack};
use crate::local::{LocalCollection, LocalTrack, TagField};
use crate::names::NormalizedName;

static INIT: Once = Once::new();

pub fn init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

// A release whose tracks are numbered from 1 in order. Durations start at 3:00 and grow by 20
// seconds per track so that neighbouring tracks fall outside each other's tolerance.
pub fn release(artist: &str, album: &str, titles: &[&str]) -> CandidateRelease {
    let tracks = titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            CandidateTrack::new(i as u32 + 1, [*title])
                .expect("failed to build candidate track")
                .with_duration(track_duration(i))
        })
        .collect();
    CandidateRelease::new(NormalizedName::new(artist), NormalizedName::new(album), tracks)
        .expect("failed to build candidate release")
}

// Local tracks tagged with the given titles and the album-level tags, with matching durations and
// file-order position hints.
pub fn collection(artist: &str, album: &str, titles: &[&str]) -> LocalCollection {
    let tracks = titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            LocalTrack::new()
                .with_tag(TagField::TrackTitle, title)
                .with_tag(TagField::ReleaseArtist, artist)
                .with_tag(TagField::ReleaseTitle, album)
                .with_position_hint(i as u32 + 1)
                .with_duration(track_duration(i))
        })
        .collect();
    LocalCollection::new(tracks).expect("failed to build local collection")
}

pub fn track_duration(index: usize) -> Duration {
    Duration::from_secs(180 + 20 * index as u64)
}

pub fn titles(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("Song Number {i}")).collect()
}
