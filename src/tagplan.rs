//! Turns an alignment into the smallest set of tag writes that brings the local tracks in line
//! with the chosen release. Building a plan never touches the tracks; a [`TagWriter`] applies it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, RoseExpectedError};
use crate::local::{parse_track_number, LocalCollection, LocalTrack, TagField};
use crate::names::display_form;
use crate::resolver::Alignment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPolicy {
    /// Write the catalog value whenever it differs from the current one.
    Overwrite,
    FillIfAbsent,
    Preserve,
}

impl std::str::FromStr for FieldPolicy {
    type Err = RoseExpectedError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "overwrite" => Ok(FieldPolicy::Overwrite),
            "fill_if_absent" => Ok(FieldPolicy::FillIfAbsent),
            "preserve" => Ok(FieldPolicy::Preserve),
            _ => Err(RoseExpectedError::UnknownFieldPolicy { name: s.to_string() }),
        }
    }
}

/// Per-field write policy. The rating field is owned by rating reconciliation and is always
/// preserved here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPolicy {
    fields: BTreeMap<TagField, FieldPolicy>,
}

impl Default for TagPolicy {
    fn default() -> Self {
        TagPolicy {
            fields: BTreeMap::from([
                (TagField::TrackTitle, FieldPolicy::Overwrite),
                (TagField::TrackArtist, FieldPolicy::FillIfAbsent),
                (TagField::TrackNumber, FieldPolicy::Overwrite),
                (TagField::TrackTotal, FieldPolicy::Overwrite),
                (TagField::ReleaseTitle, FieldPolicy::Overwrite),
                (TagField::ReleaseArtist, FieldPolicy::Overwrite),
                (TagField::Rating, FieldPolicy::Preserve),
            ]),
        }
    }
}

impl TagPolicy {
    pub fn get(&self, field: TagField) -> FieldPolicy {
        if field == TagField::Rating {
            return FieldPolicy::Preserve;
        }
        self.fields.get(&field).copied().unwrap_or(FieldPolicy::Preserve)
    }

    pub fn set(&mut self, field: TagField, policy: FieldPolicy) -> Result<()> {
        if field == TagField::Rating && policy != FieldPolicy::Preserve {
            return Err(RoseExpectedError::Generic(
                "The rating field is managed by rating reconciliation and cannot be rewritten by a tag plan".to_string(),
            )
            .into());
        }
        self.fields.insert(field, policy);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationReason {
    /// The field had a value that disagrees with the catalog.
    Canonicalize,
    FillMissing,
    RatingSync,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMutation {
    pub field: TagField,
    pub old_value: Option<String>,
    pub new_value: String,
    pub reason: MutationReason,
}

impl std::fmt::Display for FieldMutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.old_value {
            Some(old) => write!(f, "{}: {:?} -> {:?}", self.field, old, self.new_value),
            None => write!(f, "{}: (none) -> {:?}", self.field, self.new_value),
        }
    }
}

/// Writes field mutations to wherever the tracks live.
pub trait TagWriter {
    fn write(&mut self, track: Uuid, mutations: &[FieldMutation]) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TagPlan {
    per_track: BTreeMap<Uuid, Vec<FieldMutation>>,
    unresolved: Vec<Uuid>,
}

impl TagPlan {
    pub fn mutations(&self, track: Uuid) -> &[FieldMutation] {
        self.per_track.get(&track).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn per_track(&self) -> &BTreeMap<Uuid, Vec<FieldMutation>> {
        &self.per_track
    }

    /// Local tracks the alignment could not place.
    pub fn unresolved(&self) -> &[Uuid] {
        &self.unresolved
    }

    /// True when the plan writes nothing.
    pub fn is_empty(&self) -> bool {
        self.per_track.is_empty()
    }

    pub fn mutation_count(&self) -> usize {
        self.per_track.values().map(Vec::len).sum()
    }

    pub fn apply<W: TagWriter>(&self, writer: &mut W) -> Result<()> {
        for (track, mutations) in &self.per_track {
            writer.write(*track, mutations)?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One line per write, for previewing a plan before it is applied.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (track, mutations) in &self.per_track {
            for mutation in mutations {
                lines.push(format!("{track}: {mutation}"));
            }
        }
        for track in &self.unresolved {
            lines.push(format!("{track}: unresolved"));
        }
        lines
    }
}

pub fn build(alignment: &Alignment, local: &LocalCollection, policy: &TagPolicy) -> TagPlan {
    let mut plan = TagPlan::default();
    if alignment.is_ambiguous() {
        warn!("building a tag plan from an ambiguous alignment");
    }
    let Some(release) = alignment.release() else {
        plan.unresolved = alignment.pairs().iter().map(|p| p.local).collect();
        return plan;
    };

    for pair in alignment.pairs() {
        let (Some(track), Some(candidate)) = (local.get(pair.local), alignment.candidate_track(pair)) else {
            plan.unresolved.push(pair.local);
            continue;
        };

        let targets = [
            (TagField::TrackTitle, candidate.names().raw().to_string()),
            (TagField::TrackArtist, release.artist().raw().to_string()),
            (TagField::TrackNumber, candidate.position().to_string()),
            (TagField::TrackTotal, release.len().to_string()),
            (TagField::ReleaseTitle, release.album().raw().to_string()),
            (TagField::ReleaseArtist, release.artist().raw().to_string()),
        ];
        let mutations: Vec<FieldMutation> = targets
            .into_iter()
            .filter_map(|(field, target)| plan_field(track, field, target, policy.get(field)))
            .collect();
        if !mutations.is_empty() {
            debug!("planned {} tag writes for track {}", mutations.len(), track.id());
            plan.per_track.insert(track.id(), mutations);
        }
    }
    plan
}

fn plan_field(track: &LocalTrack, field: TagField, target: String, policy: FieldPolicy) -> Option<FieldMutation> {
    if target.trim().is_empty() || field == TagField::Rating {
        return None;
    }
    let current = track.tag(field);
    let reason = match (policy, current) {
        (FieldPolicy::Preserve, _) => return None,
        (_, None) => MutationReason::FillMissing,
        (FieldPolicy::FillIfAbsent, Some(_)) => return None,
        (FieldPolicy::Overwrite, Some(current)) if values_match(field, current, &target) => return None,
        (FieldPolicy::Overwrite, Some(_)) => MutationReason::Canonicalize,
    };
    Some(FieldMutation {
        field,
        old_value: current.map(str::to_string),
        new_value: target,
        reason,
    })
}

fn values_match(field: TagField, current: &str, target: &str) -> bool {
    if field.is_numeric() {
        if let (Some(a), Some(b)) = (parse_track_number(current), parse_track_number(target)) {
            return a == b;
        }
    }
    display_form(current) == display_form(target)
}
