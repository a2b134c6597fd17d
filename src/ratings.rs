//! Ratings and their reconciliation between the local files and a remote library.
//!
//! The canonical unit is the half star: an integer from 0 to 10. The remote library speaks that
//! unit directly (or as fractional stars, doubled and rounded). Files store it in the tag layout of
//! their container, which [`crate::local::ContainerFormat`] translates through the views here.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, RoseExpectedError};
use crate::local::{LocalTrack, TagField};
use crate::tagplan::{FieldMutation, MutationReason};

pub const MAX_RATING: u8 = 10;

/// Popularimeter byte ranges, one per whole star: (lowest byte, highest byte, byte written).
const POPM_RANGES: [(u8, u8, u8); 5] = [(1, 31, 15), (32, 95, 64), (96, 159, 128), (160, 223, 196), (224, 255, 255)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub fn new(units: u8) -> Result<Self> {
        if units > MAX_RATING {
            return Err(RoseExpectedError::RatingOutOfRange { value: units as i64 }.into());
        }
        Ok(Rating(units))
    }

    pub fn units(self) -> u8 {
        self.0
    }

    /// Remote integer view.
    pub fn from_remote(value: i64) -> Result<Self> {
        if !(0..=MAX_RATING as i64).contains(&value) {
            return Err(RoseExpectedError::RatingOutOfRange { value }.into());
        }
        Ok(Rating(value as u8))
    }

    pub fn to_remote(self) -> i64 {
        self.0 as i64
    }

    /// Remote star view: `round(stars * 2)`.
    pub fn from_stars(stars: f64) -> Result<Self> {
        if !stars.is_finite() || stars < 0.0 {
            return Err(RoseExpectedError::InvalidRatingValue { value: stars.to_string() }.into());
        }
        Self::from_remote((stars * 2.0).round() as i64)
    }

    pub fn stars(self) -> f64 {
        self.0 as f64 / 2.0
    }

    /// Local popularimeter view. Every byte maps to a rating.
    pub fn from_popm(byte: u8) -> Self {
        if byte == 0 {
            return Rating(0);
        }
        for (index, (low, high, written)) in POPM_RANGES.iter().enumerate() {
            if (*low..=*high).contains(&byte) {
                let whole = (index as u8 + 1) * 2;
                if index == 0 && byte < *written {
                    return Rating(1);
                }
                let units = if byte > *written { whole + 1 } else { whole };
                return Rating(units.min(MAX_RATING));
            }
        }
        Rating(MAX_RATING)
    }

    pub fn to_popm(self) -> u8 {
        match self.0 {
            0 => 0,
            1 => 1,
            units => {
                let (whole, half) = (units / 2, units % 2);
                POPM_RANGES[whole as usize - 1].2 + half
            }
        }
    }

    /// Renders the rating as five stars, e.g. `★★★½☆`.
    pub fn display_stars(self) -> String {
        let full = (self.0 / 2) as usize;
        let half = (self.0 % 2) as usize;
        let empty = 5 - full - half;
        format!("{}{}{}", "★".repeat(full), "½".repeat(half), "☆".repeat(empty))
    }
}

impl TryFrom<u8> for Rating {
    type Error = RoseExpectedError;

    fn try_from(units: u8) -> std::result::Result<Self, Self::Error> {
        if units > MAX_RATING {
            return Err(RoseExpectedError::RatingOutOfRange { value: units as i64 });
        }
        Ok(Rating(units))
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> u8 {
        rating.0
    }
}

impl std::str::FromStr for Rating {
    type Err = RoseExpectedError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| RoseExpectedError::InvalidRatingValue { value: s.to_string() })?;
        if !(0..=MAX_RATING as i64).contains(&value) {
            return Err(RoseExpectedError::RatingOutOfRange { value });
        }
        Ok(Rating(value as u8))
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Neither side has a rating.
    Unset,
    /// Only the local side carries a value the remote lacks, or only the local side changed since
    /// the last sync.
    LocalOnly,
    RemoteOnly,
    Synced,
    /// Both sides changed to different values since the last sync, or they differ and there is no
    /// record of a previous sync to tell which one moved.
    Conflicted,
}

impl SyncState {
    pub fn observe(local: Option<Rating>, remote: Option<Rating>, last_known_common: Option<Rating>) -> Self {
        match (local, remote) {
            (None, None) => SyncState::Unset,
            (Some(_), None) => SyncState::LocalOnly,
            (None, Some(_)) => SyncState::RemoteOnly,
            (Some(l), Some(r)) if l == r => SyncState::Synced,
            (Some(l), Some(r)) => match last_known_common {
                Some(base) if r == base => SyncState::LocalOnly,
                Some(base) if l == base => SyncState::RemoteOnly,
                _ => SyncState::Conflicted,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "rating")]
pub enum SyncAction {
    None,
    PushToRemote(Rating),
    PullToLocal(Rating),
    Conflict,
}

/// The outcome of a three-way rating merge. `local`, `remote` and `baseline` are the values each
/// side should hold afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub local: Option<Rating>,
    pub remote: Option<Rating>,
    pub baseline: Option<Rating>,
    pub prior: SyncState,
    pub action: SyncAction,
}

impl Reconciliation {
    pub fn is_conflict(&self) -> bool {
        self.action == SyncAction::Conflict
    }

    pub fn state(&self) -> SyncState {
        match self.action {
            SyncAction::Conflict => SyncState::Conflicted,
            _ if self.local.is_none() && self.remote.is_none() => SyncState::Unset,
            _ => SyncState::Synced,
        }
    }

    /// The rating tag write this reconciliation asks of the local side, if any.
    pub fn local_mutation(&self, track: &LocalTrack) -> Option<FieldMutation> {
        match self.action {
            SyncAction::PullToLocal(rating) => Some(FieldMutation {
                field: TagField::Rating,
                old_value: track.tag(TagField::Rating).map(str::to_string),
                new_value: rating.to_string(),
                reason: MutationReason::RatingSync,
            }),
            _ => None,
        }
    }
}

/// Which side a sync run treats as authoritative once the baseline has shown that only one side
/// moved. A run never overrides a conflict or a side that is the only one holding a rating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Files are the source of truth: the remote follows the local rating.
    ToRemote,
    /// The remote library is the source of truth: files follow the remote rating.
    ToLocal,
    /// Whichever side moved away from the baseline wins.
    #[default]
    ChangedSide,
}

pub fn reconcile(
    local: Option<Rating>,
    remote: Option<Rating>,
    last_known_common: Option<Rating>,
    direction: SyncDirection,
) -> Reconciliation {
    let prior = SyncState::observe(local, remote, last_known_common);
    let settled = |rating: Rating, action: SyncAction| Reconciliation {
        local: Some(rating),
        remote: Some(rating),
        baseline: Some(rating),
        prior,
        action,
    };
    let unchanged = |action: SyncAction| Reconciliation {
        local,
        remote,
        baseline: last_known_common,
        prior,
        action,
    };
    match (prior, local, remote) {
        (SyncState::Synced, Some(l), _) => settled(l, SyncAction::None),
        (SyncState::Conflicted, _, _) => unchanged(SyncAction::Conflict),
        (SyncState::LocalOnly, Some(l), None) => settled(l, SyncAction::PushToRemote(l)),
        (SyncState::RemoteOnly, None, Some(r)) => settled(r, SyncAction::PullToLocal(r)),
        (SyncState::LocalOnly | SyncState::RemoteOnly, Some(l), Some(r)) => match direction {
            SyncDirection::ToRemote => settled(l, SyncAction::PushToRemote(l)),
            SyncDirection::ToLocal => settled(r, SyncAction::PullToLocal(r)),
            SyncDirection::ChangedSide if prior == SyncState::LocalOnly => settled(l, SyncAction::PushToRemote(l)),
            SyncDirection::ChangedSide => settled(r, SyncAction::PullToLocal(r)),
        },
        _ => unchanged(SyncAction::None),
    }
}

/// The remote library's rating surface.
pub trait RemoteRatingStore {
    fn get_rating(&self, track: Uuid) -> Result<Option<Rating>>;
    fn set_rating(&mut self, track: Uuid, rating: Rating) -> Result<()>;
}

/// Reconciles one track against the remote store and pushes the rating when the local side wins.
/// Pulling into the file is left to the caller, through [`Reconciliation::local_mutation`].
pub fn sync_rating<S: RemoteRatingStore>(
    store: &mut S,
    track: &LocalTrack,
    last_known_common: Option<Rating>,
    direction: SyncDirection,
    dry_run: bool,
) -> Result<Reconciliation> {
    let local = track.rating()?;
    let remote = store.get_rating(track.id())?;
    let reconciliation = reconcile(local, remote, last_known_common, direction);
    debug!("reconciled rating for track {}: {:?}", track.id(), reconciliation);

    match reconciliation.action {
        SyncAction::PushToRemote(rating) => {
            if dry_run {
                info!("dry run: would set remote rating of track {} to {}", track.id(), rating.display_stars());
            } else {
                store.set_rating(track.id(), rating)?;
                info!("set remote rating of track {} to {}", track.id(), rating.display_stars());
            }
        }
        SyncAction::PullToLocal(rating) => {
            info!("remote rating of track {} changed to {}", track.id(), rating.display_stars());
        }
        SyncAction::Conflict => {
            warn!(
                "rating conflict on track {}: local {:?}, remote {:?}, last synced {:?}",
                track.id(),
                local,
                remote,
                last_known_common
            );
        }
        SyncAction::None => {}
    }
    Ok(reconciliation)
}
