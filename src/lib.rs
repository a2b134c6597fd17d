pub mod candidate_cache;
pub mod candidates;
pub mod common;
pub mod config;
pub mod error;
pub mod local;
pub mod names;
pub mod ratings;
pub mod resolver;
pub mod scoring;
pub mod tagplan;

pub use candidate_cache::{CachePolicy, CachingCandidateSource, CandidateCache, CandidateQuery, CandidateSource};
pub use candidates::{CandidateRelease, CandidateTrack};
pub use config::Config;
pub use error::{Result, RoseError, RoseExpectedError};
pub use local::{ContainerFormat, LocalCollection, LocalTrack, TagField};
pub use names::{normalize, NormalizedName};
pub use ratings::{reconcile, Rating, Reconciliation, RemoteRatingStore, SyncAction, SyncDirection, SyncState};
pub use resolver::{Alignment, MatchResolver, Thresholds};
pub use scoring::{score_release, score_track, MatchScore, Signal};
pub use tagplan::{FieldMutation, FieldPolicy, TagPlan, TagPolicy, TagWriter};

#[cfg(test)]
mod testing;

#[cfg(test)]
mod common_test;
#[cfg(test)]
mod resolver_test;
