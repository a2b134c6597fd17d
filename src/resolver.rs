//! Picks the candidate release that best explains the local tracks and aligns the two track lists.
//!
//! Scoring every local track against every candidate track is embarrassingly parallel and runs on
//! rayon. Assignment and selection are sequential over the finished matrix, which keeps the result
//! independent of thread scheduling and of the order the candidates arrived in.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::candidates::{CandidateRelease, CandidateTrack};
use crate::local::LocalCollection;
use crate::scoring::{score_features, score_release_names, MatchScore, Signal, TrackFeatures};

/// Pairs scoring below this are never aligned.
pub const MIN_PAIR_SCORE: f64 = 0.45;
/// Releases whose combined scores are closer than this to the best are reported as ambiguous.
pub const AMBIGUITY_MARGIN: f64 = 0.05;
pub const RELEASE_NAME_WEIGHT: f64 = 0.3;
pub const RELEASE_TRACK_WEIGHT: f64 = 0.7;
const MAX_REFINEMENT_PASSES: usize = 8;
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub min_pair_score: f64,
    pub ambiguity_margin: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            min_pair_score: MIN_PAIR_SCORE,
            ambiguity_margin: AMBIGUITY_MARGIN,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackPair {
    pub local: Uuid,
    /// Position of the aligned candidate track in the chosen release.
    pub candidate: Option<u32>,
    pub score: Option<MatchScore>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Contender {
    pub release: CandidateRelease,
    pub score: MatchScore,
    pub name_score: MatchScore,
    pub track_count_matches: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    release: Option<CandidateRelease>,
    pairs: Vec<TrackPair>,
    overall_score: MatchScore,
    ambiguous: bool,
    contenders: Vec<Contender>,
}

impl Alignment {
    fn unmatched(local: &LocalCollection) -> Self {
        Alignment {
            release: None,
            pairs: local
                .tracks()
                .iter()
                .map(|t| TrackPair {
                    local: t.id(),
                    candidate: None,
                    score: None,
                })
                .collect(),
            overall_score: MatchScore::zero(),
            ambiguous: false,
            contenders: Vec::new(),
        }
    }

    pub fn release(&self) -> Option<&CandidateRelease> {
        self.release.as_ref()
    }

    /// One pair per local track, in collection order.
    pub fn pairs(&self) -> &[TrackPair] {
        &self.pairs
    }

    pub fn overall_score(&self) -> &MatchScore {
        &self.overall_score
    }

    pub fn is_ambiguous(&self) -> bool {
        self.ambiguous
    }

    /// Every release that was considered, best first.
    pub fn contenders(&self) -> &[Contender] {
        &self.contenders
    }

    pub fn pair(&self, local: Uuid) -> Option<&TrackPair> {
        self.pairs.iter().find(|p| p.local == local)
    }

    pub fn candidate_track(&self, pair: &TrackPair) -> Option<&CandidateTrack> {
        self.release.as_ref()?.track(pair.candidate?)
    }

    pub fn unmatched_tracks(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.pairs.iter().filter(|p| p.candidate.is_none()).map(|p| p.local)
    }

    pub fn matched_count(&self) -> usize {
        self.pairs.iter().filter(|p| p.candidate.is_some()).count()
    }
}

/// A release scored against the collection, before selection.
struct Scored<'a> {
    release: &'a CandidateRelease,
    score: MatchScore,
    name_score: MatchScore,
    track_count_matches: bool,
    assignment: Vec<Option<usize>>,
    matrix: Vec<Vec<MatchScore>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MatchResolver {
    thresholds: Thresholds,
}

impl MatchResolver {
    pub fn new(thresholds: Thresholds) -> Self {
        MatchResolver { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn resolve(&self, local: &LocalCollection, candidates: &[CandidateRelease]) -> Alignment {
        let features: Vec<TrackFeatures> = local.tracks().par_iter().map(TrackFeatures::of).collect();
        let artist = local.artist_hint();
        let album = local.album_hint();

        let mut scored: Vec<Scored> = Vec::new();
        for release in candidates {
            if release.is_empty() {
                debug!("skipping candidate {} with no tracks", release);
                continue;
            }
            let name_score = score_release_names(&artist, &album, release);
            let entry = self.score_release(local, &features, release, name_score);
            debug!(
                "scored candidate {}: {:.3} ({} of {} tracks aligned)",
                release,
                entry.score.value(),
                entry.assignment.iter().filter(|a| a.is_some()).count(),
                local.len()
            );
            scored.push(entry);
        }
        if scored.is_empty() {
            debug!("no scoreable candidates for {} local tracks", local.len());
            return Alignment::unmatched(local);
        }

        let best = scored.iter().map(|s| s.score.value()).fold(f64::NEG_INFINITY, f64::max);
        let in_band = |s: &Scored| best - s.score.value() < self.thresholds.ambiguity_margin;
        let band_size = scored.iter().filter(|&s| in_band(s)).count();

        // Within the near-tie band the preference is count match, then names; outside it, score.
        scored.sort_by(|a, b| match (in_band(a), in_band(b)) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (true, true) => cmp_near_tie(a, b),
            (false, false) => cmp_by_score(a, b),
        });
        let ambiguous = band_size > 1;
        let primary = &scored[0];
        if ambiguous {
            warn!(
                "{} candidates score within {} of each other; choosing {} but the match is ambiguous",
                band_size, self.thresholds.ambiguity_margin, primary.release
            );
        } else {
            info!("matched {} with score {:.3}", primary.release, primary.score.value());
        }

        let pairs = build_pairs(local, primary);
        let overall_score = primary.score.clone();
        let release = Some(primary.release.clone());
        let contenders = scored
            .into_iter()
            .map(|s| Contender {
                release: s.release.clone(),
                score: s.score,
                name_score: s.name_score,
                track_count_matches: s.track_count_matches,
            })
            .collect();

        Alignment {
            release,
            pairs,
            overall_score,
            ambiguous,
            contenders,
        }
    }

    /// Aligns against one release chosen by the caller, typically after an ambiguous resolution.
    pub fn align_release(&self, local: &LocalCollection, release: &CandidateRelease) -> Alignment {
        self.resolve(local, std::slice::from_ref(release))
    }

    fn score_release<'a>(
        &self,
        local: &LocalCollection,
        features: &[TrackFeatures],
        release: &'a CandidateRelease,
        name_score: MatchScore,
    ) -> Scored<'a> {
        let matrix: Vec<Vec<MatchScore>> = features
            .par_iter()
            .map(|f| release.tracks().iter().map(|t| score_features(f, t)).collect::<Vec<_>>())
            .collect();
        let values: Vec<Vec<f64>> = matrix.iter().map(|row| row.iter().map(MatchScore::value).collect::<Vec<_>>()).collect();
        let assignment = assign(&values, release.len(), self.thresholds.min_pair_score);

        let total: f64 = assignment
            .iter()
            .enumerate()
            .filter_map(|(i, a)| a.map(|j| values[i][j]))
            .sum();
        let track_score = total / local.len().max(release.len()) as f64;
        let release_name = RELEASE_NAME_WEIGHT * name_score.value();
        let track_alignment = RELEASE_TRACK_WEIGHT * track_score;
        let components = BTreeMap::from([(Signal::ReleaseName, release_name), (Signal::TrackAlignment, track_alignment)]);

        Scored {
            release,
            score: MatchScore::new(release_name + track_alignment, components),
            name_score,
            track_count_matches: release.len() == local.len(),
            assignment,
            matrix,
        }
    }
}

fn cmp_near_tie(a: &Scored, b: &Scored) -> Ordering {
    b.track_count_matches
        .cmp(&a.track_count_matches)
        .then_with(|| b.name_score.value().total_cmp(&a.name_score.value()))
        .then_with(|| cmp_by_score(a, b))
}

fn cmp_by_score(a: &Scored, b: &Scored) -> Ordering {
    b.score
        .value()
        .total_cmp(&a.score.value())
        .then_with(|| a.release.cmp_identity(b.release))
}

fn build_pairs(local: &LocalCollection, scored: &Scored) -> Vec<TrackPair> {
    local
        .tracks()
        .iter()
        .enumerate()
        .map(|(i, track)| match scored.assignment[i] {
            Some(j) => TrackPair {
                local: track.id(),
                candidate: Some(scored.release.tracks()[j].position()),
                score: Some(scored.matrix[i][j].clone()),
            },
            None => TrackPair {
                local: track.id(),
                candidate: None,
                score: None,
            },
        })
        .collect()
}

/// One-to-one assignment of rows (local tracks) to columns (candidate tracks). Greedy on the
/// highest remaining pair, then refined by swaps and moves while they raise the total.
pub(crate) fn assign(scores: &[Vec<f64>], columns: usize, min_score: f64) -> Vec<Option<usize>> {
    let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
    for (i, row) in scores.iter().enumerate() {
        for (j, &score) in row.iter().enumerate() {
            if score >= min_score {
                pairs.push((i, j, score));
            }
        }
    }
    pairs.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.0.cmp(&b.0)).then(a.1.cmp(&b.1)));

    let mut row_to: Vec<Option<usize>> = vec![None; scores.len()];
    let mut column_taken = vec![false; columns];
    for (i, j, _) in pairs {
        if row_to[i].is_none() && !column_taken[j] {
            row_to[i] = Some(j);
            column_taken[j] = true;
        }
    }

    refine(scores, min_score, &mut row_to, &mut column_taken);
    row_to
}

fn refine(scores: &[Vec<f64>], min_score: f64, row_to: &mut [Option<usize>], column_taken: &mut [bool]) {
    let value = |i: usize, j: Option<usize>| j.map_or(0.0, |j| scores[i][j]);
    let acceptable = |i: usize, j: Option<usize>| j.map_or(true, |j| scores[i][j] >= min_score);

    for _ in 0..MAX_REFINEMENT_PASSES {
        let mut improved = false;

        for i in 0..row_to.len() {
            for k in (i + 1)..row_to.len() {
                let (a, b) = (row_to[i], row_to[k]);
                if a == b {
                    continue;
                }
                let current = value(i, a) + value(k, b);
                let swapped = value(i, b) + value(k, a);
                if swapped > current + EPSILON && acceptable(i, b) && acceptable(k, a) {
                    row_to[i] = b;
                    row_to[k] = a;
                    improved = true;
                }
            }
        }

        for i in 0..row_to.len() {
            for j in 0..column_taken.len() {
                if column_taken[j] || scores[i][j] < min_score {
                    continue;
                }
                if scores[i][j] > value(i, row_to[i]) + EPSILON {
                    if let Some(old) = row_to[i] {
                        column_taken[old] = false;
                    }
                    row_to[i] = Some(j);
                    column_taken[j] = true;
                    improved = true;
                }
            }
        }

        // An unplaced row takes a column from a placed one, which moves to a free column.
        for i in 0..row_to.len() {
            if row_to[i].is_some() {
                continue;
            }
            'columns: for c in 0..column_taken.len() {
                let Some(k) = row_to.iter().position(|held| *held == Some(c)) else {
                    continue;
                };
                if scores[i][c] < min_score {
                    continue;
                }
                for f in 0..column_taken.len() {
                    if column_taken[f] || scores[k][f] < min_score {
                        continue;
                    }
                    if scores[i][c] + scores[k][f] > scores[k][c] + EPSILON {
                        row_to[i] = Some(c);
                        row_to[k] = Some(f);
                        column_taken[f] = true;
                        improved = true;
                        break 'columns;
                    }
                }
            }
        }

        if !improved {
            break;
        }
    }
}
