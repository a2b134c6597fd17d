//! Catalog releases offered as match candidates. A release is validated once when it is built, so
//! the scorer and resolver can rely on positive, unique and increasing track positions.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, RoseExpectedError};
use crate::names::{self, NormalizedName};

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateTrack {
    position: u32,
    names: NormalizedName,
    duration: Option<Duration>,
    disambiguators: BTreeSet<String>,
}

impl CandidateTrack {
    /// `titles` are alternate spellings of the same title; the first non-blank one is primary.
    pub fn new<I, S>(position: u32, titles: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if position == 0 {
            return Err(RoseExpectedError::InvalidTrackPosition { position }.into());
        }
        let titles: Vec<String> = titles.into_iter().map(|t| t.as_ref().to_string()).collect();
        let disambiguators = titles.iter().flat_map(|t| names::disambiguators(t)).collect();
        Ok(CandidateTrack {
            position,
            names: NormalizedName::from_alternates(&titles),
            duration: None,
            disambiguators,
        })
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Adds a qualifier the catalog reports outside the title, e.g. a "live" flag. Known qualifier
    /// words map to the same labels titles produce; anything else is kept in folded form.
    pub fn with_disambiguator(mut self, label: &str) -> Self {
        let labels = names::qualifier_labels(label);
        if labels.is_empty() {
            let folded = names::fold(label);
            if !folded.is_empty() {
                self.disambiguators.insert(folded);
            }
        } else {
            self.disambiguators.extend(labels);
        }
        self
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn names(&self) -> &NormalizedName {
        &self.names
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn disambiguators(&self) -> &BTreeSet<String> {
        &self.disambiguators
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawCandidateRelease")]
pub struct CandidateRelease {
    artist: NormalizedName,
    album: NormalizedName,
    tracks: Vec<CandidateTrack>,
}

impl CandidateRelease {
    pub fn new(artist: NormalizedName, album: NormalizedName, tracks: Vec<CandidateTrack>) -> Result<Self> {
        let mut previous: Option<u32> = None;
        let mut seen = BTreeSet::new();
        for track in &tracks {
            let position = track.position;
            if !seen.insert(position) {
                return Err(RoseExpectedError::DuplicateTrackPosition {
                    release: album.raw().to_string(),
                    position,
                }
                .into());
            }
            if let Some(previous) = previous.filter(|p| position < *p) {
                return Err(RoseExpectedError::TrackPositionOutOfOrder {
                    release: album.raw().to_string(),
                    position,
                    previous,
                }
                .into());
            }
            previous = Some(position);
        }
        Ok(CandidateRelease { artist, album, tracks })
    }

    pub fn artist(&self) -> &NormalizedName {
        &self.artist
    }

    pub fn album(&self) -> &NormalizedName {
        &self.album
    }

    pub fn tracks(&self) -> &[CandidateTrack] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn track(&self, position: u32) -> Option<&CandidateTrack> {
        self.tracks
            .binary_search_by_key(&position, |t| t.position)
            .ok()
            .map(|idx| &self.tracks[idx])
    }

    /// A total order over release content, independent of where the release sits in a candidate
    /// list. Releases comparing equal are interchangeable.
    pub fn cmp_identity(&self, other: &CandidateRelease) -> Ordering {
        let key = |r: &CandidateRelease| {
            (
                r.artist.canonical().to_string(),
                r.album.canonical().to_string(),
                r.artist.raw().to_string(),
                r.album.raw().to_string(),
                r.tracks.len(),
            )
        };
        key(self).cmp(&key(other)).then_with(|| {
            self.tracks
                .iter()
                .map(|t| (t.position, t.names.raw(), t.duration))
                .cmp(other.tracks.iter().map(|t| (t.position, t.names.raw(), t.duration)))
        })
    }
}

impl std::fmt::Display for CandidateRelease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.artist.raw(), self.album.raw())
    }
}

/// A name in catalog input: one spelling or a list of alternates.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawName {
    One(String),
    Many(Vec<String>),
}

impl RawName {
    fn into_name(self) -> NormalizedName {
        match self {
            RawName::One(name) => NormalizedName::new(&name),
            RawName::Many(names) => NormalizedName::from_alternates(names),
        }
    }

    fn into_vec(self) -> Vec<String> {
        match self {
            RawName::One(name) => vec![name],
            RawName::Many(names) => names,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCandidateTrack {
    position: u32,
    title: RawName,
    #[serde(default)]
    duration_secs: Option<u64>,
    #[serde(default)]
    disambiguators: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawCandidateRelease {
    artist: RawName,
    album: RawName,
    #[serde(default)]
    tracks: Vec<RawCandidateTrack>,
}

impl TryFrom<RawCandidateRelease> for CandidateRelease {
    type Error = RoseExpectedError;

    fn try_from(raw: RawCandidateRelease) -> std::result::Result<Self, Self::Error> {
        let mut tracks = Vec::with_capacity(raw.tracks.len());
        for raw_track in raw.tracks {
            let mut track = CandidateTrack::new(raw_track.position, raw_track.title.into_vec()).map_err(expected)?;
            if let Some(secs) = raw_track.duration_secs {
                track = track.with_duration(Duration::from_secs(secs));
            }
            for label in &raw_track.disambiguators {
                track = track.with_disambiguator(label);
            }
            tracks.push(track);
        }
        CandidateRelease::new(raw.artist.into_name(), raw.album.into_name(), tracks).map_err(expected)
    }
}

fn expected(err: crate::error::RoseError) -> RoseExpectedError {
    match err {
        crate::error::RoseError::Expected(e) => e,
        other => RoseExpectedError::Generic(other.to_string()),
    }
}
