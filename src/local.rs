//! The local side of a match: tracks as they currently sit on disk, described by their tag values.
//!
//! Tag access goes through the closed [`TagField`] schema. Each container format maps those fields
//! to its own frame or key names through [`ContainerFormat`], so nothing in the engine looks up
//! tags by arbitrary strings.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, RoseError, RoseExpectedError};
use crate::names::{self, NormalizedName};
use crate::ratings::Rating;
use crate::tagplan::{FieldMutation, TagWriter};

pub const SUPPORTED_AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".m4a", ".ogg", ".opus", ".flac"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagField {
    TrackTitle,
    TrackArtist,
    TrackNumber,
    TrackTotal,
    ReleaseTitle,
    ReleaseArtist,
    Rating,
}

impl TagField {
    pub const ALL: [TagField; 7] = [
        TagField::TrackTitle,
        TagField::TrackArtist,
        TagField::TrackNumber,
        TagField::TrackTotal,
        TagField::ReleaseTitle,
        TagField::ReleaseArtist,
        TagField::Rating,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TagField::TrackTitle => "tracktitle",
            TagField::TrackArtist => "trackartist",
            TagField::TrackNumber => "tracknumber",
            TagField::TrackTotal => "tracktotal",
            TagField::ReleaseTitle => "releasetitle",
            TagField::ReleaseArtist => "releaseartist",
            TagField::Rating => "rating",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, TagField::TrackNumber | TagField::TrackTotal | TagField::Rating)
    }
}

impl std::fmt::Display for TagField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TagField {
    type Err = RoseExpectedError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        TagField::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| RoseExpectedError::UnknownTagField { name: s.to_string() })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Id3v2,
    Vorbis,
    Mp4,
}

impl ContainerFormat {
    /// Accepts extensions with or without the leading dot, in any case.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.trim_start_matches('.').to_lowercase();
        match extension.as_str() {
            "mp3" => Some(ContainerFormat::Id3v2),
            "flac" | "ogg" | "opus" => Some(ContainerFormat::Vorbis),
            "m4a" => Some(ContainerFormat::Mp4),
            _ => None,
        }
    }

    /// The frame (ID3v2), comment key (Vorbis) or atom (MP4) holding `field`. Track number and
    /// total share one frame in ID3v2 and MP4, written as `number/total`.
    pub fn frame_key(self, field: TagField) -> &'static str {
        match (self, field) {
            (ContainerFormat::Id3v2, TagField::TrackTitle) => "TIT2",
            (ContainerFormat::Id3v2, TagField::TrackArtist) => "TPE1",
            (ContainerFormat::Id3v2, TagField::TrackNumber | TagField::TrackTotal) => "TRCK",
            (ContainerFormat::Id3v2, TagField::ReleaseTitle) => "TALB",
            (ContainerFormat::Id3v2, TagField::ReleaseArtist) => "TPE2",
            (ContainerFormat::Id3v2, TagField::Rating) => "POPM",
            (ContainerFormat::Vorbis, TagField::TrackTitle) => "TITLE",
            (ContainerFormat::Vorbis, TagField::TrackArtist) => "ARTIST",
            (ContainerFormat::Vorbis, TagField::TrackNumber) => "TRACKNUMBER",
            (ContainerFormat::Vorbis, TagField::TrackTotal) => "TRACKTOTAL",
            (ContainerFormat::Vorbis, TagField::ReleaseTitle) => "ALBUM",
            (ContainerFormat::Vorbis, TagField::ReleaseArtist) => "ALBUMARTIST",
            (ContainerFormat::Vorbis, TagField::Rating) => "RATING",
            (ContainerFormat::Mp4, TagField::TrackTitle) => "\u{a9}nam",
            (ContainerFormat::Mp4, TagField::TrackArtist) => "\u{a9}ART",
            (ContainerFormat::Mp4, TagField::TrackNumber | TagField::TrackTotal) => "trkn",
            (ContainerFormat::Mp4, TagField::ReleaseTitle) => "\u{a9}alb",
            (ContainerFormat::Mp4, TagField::ReleaseArtist) => "aART",
            (ContainerFormat::Mp4, TagField::Rating) => "rate",
        }
    }

    /// Translates a stored rating into half-star units. ID3v2 and MP4 store a popularimeter byte;
    /// Vorbis stores the units as text.
    pub fn decode_rating(self, stored: &str) -> Result<Rating> {
        match self {
            ContainerFormat::Id3v2 | ContainerFormat::Mp4 => {
                let byte: u8 = stored
                    .trim()
                    .parse()
                    .map_err(|_| RoseExpectedError::InvalidRatingValue { value: stored.to_string() })?;
                Ok(Rating::from_popm(byte))
            }
            ContainerFormat::Vorbis => Ok(stored.parse::<Rating>()?),
        }
    }

    pub fn encode_rating(self, rating: Rating) -> String {
        match self {
            ContainerFormat::Id3v2 | ContainerFormat::Mp4 => rating.to_popm().to_string(),
            ContainerFormat::Vorbis => rating.to_string(),
        }
    }
}

/// Parses the leading number of a track number tag, so `"07"` and `"7/12"` both read as 7.
pub fn parse_track_number(value: &str) -> Option<u32> {
    let number = value.split_once('/').map_or(value, |(num, _)| num);
    number.trim().parse().ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalTrack {
    id: Uuid,
    #[serde(default)]
    tags: BTreeMap<TagField, String>,
    #[serde(default)]
    position_hint: Option<u32>,
    #[serde(default)]
    duration: Option<Duration>,
}

impl Default for LocalTrack {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalTrack {
    pub fn new() -> Self {
        Self::with_id(Uuid::now_v7())
    }

    pub fn with_id(id: Uuid) -> Self {
        LocalTrack {
            id,
            tags: BTreeMap::new(),
            position_hint: None,
            duration: None,
        }
    }

    pub fn with_tag(mut self, field: TagField, value: &str) -> Self {
        self.tags.insert(field, value.to_string());
        self
    }

    pub fn with_position_hint(mut self, position: u32) -> Self {
        self.position_hint = Some(position);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The tag value, treating blank values as absent.
    pub fn tag(&self, field: TagField) -> Option<&str> {
        self.tags.get(&field).map(String::as_str).filter(|v| !v.trim().is_empty())
    }

    pub fn tags(&self) -> &BTreeMap<TagField, String> {
        &self.tags
    }

    /// The explicit hint from file ordering if there is one, else the track number tag.
    pub fn position_hint(&self) -> Option<u32> {
        self.position_hint
            .or_else(|| self.tag(TagField::TrackNumber).and_then(parse_track_number))
            .filter(|p| *p > 0)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn title(&self) -> NormalizedName {
        names::normalize(self.tag(TagField::TrackTitle).unwrap_or_default())
    }

    pub fn disambiguators(&self) -> BTreeSet<String> {
        self.tag(TagField::TrackTitle).map(names::disambiguators).unwrap_or_default()
    }

    /// The rating tag holds canonical half-star units; container adapters translate on the way in.
    pub fn rating(&self) -> Result<Option<Rating>> {
        match self.tag(TagField::Rating) {
            Some(value) => Ok(Some(value.parse::<Rating>()?)),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LocalTrack>", into = "Vec<LocalTrack>")]
pub struct LocalCollection {
    tracks: Vec<LocalTrack>,
}

impl LocalCollection {
    pub fn new(tracks: Vec<LocalTrack>) -> Result<Self> {
        Ok(Self::try_from(tracks)?)
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&LocalTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// The album artist most of the tracks agree on, falling back to the track artists.
    pub fn artist_hint(&self) -> NormalizedName {
        let hint = self.most_common(TagField::ReleaseArtist);
        if !hint.is_empty() {
            return hint;
        }
        self.most_common(TagField::TrackArtist)
    }

    pub fn album_hint(&self) -> NormalizedName {
        self.most_common(TagField::ReleaseTitle)
    }

    fn most_common(&self, field: TagField) -> NormalizedName {
        let mut counts: HashMap<String, (usize, &str)> = HashMap::new();
        for value in self.tracks.iter().filter_map(|t| t.tag(field)) {
            let entry = counts.entry(names::fold(value)).or_insert((0, value));
            entry.0 += 1;
            if value < entry.1 {
                entry.1 = value;
            }
        }
        let best = counts
            .into_values()
            .max_by(|(count_a, raw_a), (count_b, raw_b)| count_a.cmp(count_b).then_with(|| raw_b.cmp(raw_a)));
        names::normalize(best.map_or("", |(_, raw)| raw))
    }
}

impl TryFrom<Vec<LocalTrack>> for LocalCollection {
    type Error = RoseExpectedError;

    fn try_from(tracks: Vec<LocalTrack>) -> std::result::Result<Self, Self::Error> {
        let mut seen = HashSet::new();
        for track in &tracks {
            if !seen.insert(track.id) {
                return Err(RoseExpectedError::DuplicateTrackId { id: track.id.to_string() });
            }
        }
        Ok(LocalCollection { tracks })
    }
}

impl From<LocalCollection> for Vec<LocalTrack> {
    fn from(collection: LocalCollection) -> Self {
        collection.tracks
    }
}

/// Applying a plan to the in-memory collection mirrors what a file-backed writer does on disk,
/// which lets callers preview the collection a plan would produce.
impl TagWriter for LocalCollection {
    fn write(&mut self, track: Uuid, mutations: &[FieldMutation]) -> Result<()> {
        let target = self
            .tracks
            .iter_mut()
            .find(|t| t.id == track)
            .ok_or_else(|| RoseError::Expected(RoseExpectedError::UnknownTrack { id: track.to_string() }))?;
        for mutation in mutations {
            target.tags.insert(mutation.field, mutation.new_value.clone());
        }
        Ok(())
    }
}
