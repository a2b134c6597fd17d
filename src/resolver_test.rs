use crate::candidates::{CandidateRelease, CandidateTrack};
use crate::local::{LocalCollection, LocalTrack, TagField};
use crate::names::NormalizedName;
use crate::resolver::*;
use crate::testing;

fn titles(count: usize) -> Vec<String> {
    testing::titles(count)
}

fn refs(titles: &[String]) -> Vec<&str> {
    titles.iter().map(String::as_str).collect()
}

#[test]
fn test_resolve_exact_release() {
    testing::init();
    let names = titles(5);
    let local = testing::collection("Artist", "Album", &refs(&names));
    let candidates = vec![
        testing::release("Other Artist", "Other Album", &["Unrelated", "Tracks", "Here"]),
        testing::release("Artist", "Album", &refs(&names)),
    ];

    let alignment = MatchResolver::default().resolve(&local, &candidates);
    assert_eq!(alignment.release(), Some(&candidates[1]));
    assert!(!alignment.is_ambiguous());
    assert_eq!(alignment.matched_count(), 5);
    for (i, pair) in alignment.pairs().iter().enumerate() {
        assert_eq!(pair.local, local.tracks()[i].id());
        assert_eq!(pair.candidate, Some(i as u32 + 1));
        assert!(pair.score.as_ref().unwrap().value() > 0.99);
    }
    assert_eq!(alignment.contenders().len(), 2);
    assert!(alignment.contenders()[0].score.value() > alignment.contenders()[1].score.value());
}

#[test]
fn test_resolve_through_alternate_title() {
    testing::init();
    let local = LocalCollection::new(vec![
        LocalTrack::new().with_tag(TagField::TrackTitle, "Intro"),
        LocalTrack::new().with_tag(TagField::TrackTitle, "I Love You (사랑해)"),
        LocalTrack::new().with_tag(TagField::TrackTitle, "Outro"),
    ])
    .unwrap();
    let release = testing::release("Artist", "Album", &["Intro", "사랑해", "Outro"]);

    let alignment = MatchResolver::default().align_release(&local, &release);
    let pair = alignment.pair(local.tracks()[1].id()).unwrap();
    assert_eq!(pair.candidate, Some(2));
    assert_eq!(alignment.candidate_track(pair).unwrap().names().raw(), "사랑해");
}

#[test]
fn test_resolve_alternate_title_with_qualifier_word() {
    testing::init();
    let local = LocalCollection::new(vec![
        LocalTrack::new().with_tag(TagField::TrackTitle, "Intro"),
        LocalTrack::new().with_tag(TagField::TrackTitle, "살아있다 (Live Forever)"),
        LocalTrack::new().with_tag(TagField::TrackTitle, "Outro"),
    ])
    .unwrap();
    let release = testing::release("Artist", "Album", &["Intro", "Live Forever", "Outro"]);

    let alignment = MatchResolver::default().align_release(&local, &release);
    assert_eq!(alignment.matched_count(), 3);
    let pair = alignment.pair(local.tracks()[1].id()).unwrap();
    assert_eq!(pair.candidate, Some(2));
    assert_eq!(alignment.candidate_track(pair).unwrap().names().raw(), "Live Forever");
}

#[test]
fn test_resolve_empty_candidates() {
    let local = testing::collection("Artist", "Album", &["One", "Two"]);
    let alignment = MatchResolver::default().resolve(&local, &[]);
    assert!(alignment.release().is_none());
    assert!(!alignment.is_ambiguous());
    assert_eq!(alignment.pairs().len(), 2);
    assert_eq!(alignment.unmatched_tracks().count(), 2);
    assert_eq!(alignment.overall_score().value(), 0.0);
}

#[test]
fn test_resolve_excludes_empty_releases() {
    let local = testing::collection("Artist", "Album", &["One"]);
    let empty = CandidateRelease::new(NormalizedName::new("Artist"), NormalizedName::new("Album"), vec![]).unwrap();
    let alignment = MatchResolver::default().resolve(&local, &[empty]);
    assert!(alignment.release().is_none());
    assert!(alignment.contenders().is_empty());
}

#[test]
fn test_resolve_leaves_unmatched_tracks() {
    let local = testing::collection("Artist", "Album", &["One", "Two", "A Song Nobody Released"]);
    let release = testing::release("Artist", "Album", &["One", "Two"]);
    let alignment = MatchResolver::default().resolve(&local, &[release]);
    let unmatched: Vec<_> = alignment.unmatched_tracks().collect();
    assert_eq!(unmatched, vec![local.tracks()[2].id()]);
}

#[test]
fn test_resolve_ambiguous_prefers_name_score() {
    testing::init();
    let names = titles(10);
    let local = testing::collection("Artist", "Album", &refs(&names));
    let exact = testing::release("Artist", "Album", &refs(&names));
    let typo = testing::release("Artist", "Albun", &refs(&names));

    let alignment = MatchResolver::default().resolve(&local, &[typo, exact.clone()]);
    assert!(alignment.is_ambiguous());
    assert_eq!(alignment.release(), Some(&exact));
}

#[test]
fn test_resolve_near_tie_prefers_track_count_match() {
    let names = titles(10);
    let local = testing::collection("Artist", "Album", &refs(&names));
    let same_count = testing::release("Artist", "Albun", &refs(&names));
    let mut with_bonus = refs(&names);
    with_bonus.push("Bonus Track");
    let bonus = testing::release("Artist", "Album", &with_bonus);

    let alignment = MatchResolver::default().resolve(&local, &[bonus, same_count.clone()]);
    assert!(alignment.is_ambiguous());
    assert_eq!(alignment.release(), Some(&same_count));
    assert!(alignment.contenders()[0].track_count_matches);
}

#[test]
fn test_resolve_clear_winner_is_not_ambiguous() {
    let names = titles(10);
    let local = testing::collection("Artist", "Album", &refs(&names));
    let exact = testing::release("Artist", "Album", &refs(&names));
    let other = testing::release("Nobody", "Something Else Entirely", &refs(&titles(3)));

    let alignment = MatchResolver::default().resolve(&local, &[other, exact.clone()]);
    assert!(!alignment.is_ambiguous());
    assert_eq!(alignment.release(), Some(&exact));
}

#[test]
fn test_resolve_independent_of_candidate_order() {
    let names = titles(6);
    let local = testing::collection("Artist", "Album", &refs(&names));
    let candidates = vec![
        testing::release("Artist", "Album", &refs(&names)),
        testing::release("Artist", "Albun", &refs(&names)),
        testing::release("Artist", "Album", &refs(&titles(4))),
    ];
    let resolver = MatchResolver::default();
    let expected = resolver.resolve(&local, &candidates);

    let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
    for order in orders {
        let permuted: Vec<CandidateRelease> = order.iter().map(|&i| candidates[i].clone()).collect();
        let alignment = resolver.resolve(&local, &permuted);
        assert_eq!(alignment, expected, "order {order:?} changed the result");
    }
}

#[test]
fn test_resolve_respects_min_pair_score() {
    let local = LocalCollection::new(vec![LocalTrack::new().with_tag(TagField::TrackTitle, "Zzzz")]).unwrap();
    let release = CandidateRelease::new(
        NormalizedName::new("Artist"),
        NormalizedName::new("Album"),
        vec![CandidateTrack::new(1, ["Aaaa"]).unwrap()],
    )
    .unwrap();
    let alignment = MatchResolver::default().resolve(&local, &[release.clone()]);
    assert_eq!(alignment.matched_count(), 0);

    let lenient = MatchResolver::new(Thresholds {
        min_pair_score: 0.0,
        ..Thresholds::default()
    });
    assert_eq!(lenient.resolve(&local, &[release]).matched_count(), 1);
}

#[test]
fn test_assign_greedy() {
    let scores = vec![vec![0.9, 0.5], vec![0.6, 0.8]];
    assert_eq!(assign(&scores, 2, 0.45), vec![Some(0), Some(1)]);
}

#[test]
fn test_assign_backtracks_when_greedy_strands_a_row() {
    // Greedy takes (0, 0) first, leaving row 1 with nothing above the threshold
    let scores = vec![vec![0.9, 0.8], vec![0.85, 0.0]];
    assert_eq!(assign(&scores, 2, 0.45), vec![Some(1), Some(0)]);
}

#[test]
fn test_assign_more_rows_than_columns() {
    let scores = vec![vec![0.9], vec![0.95], vec![0.1]];
    assert_eq!(assign(&scores, 1, 0.45), vec![None, Some(0), None]);
}
