use std::collections::HashMap;
use std::time::Duration;

use rose_match::candidate_cache::CachePolicy;
use rose_match::ratings::sync_rating;
use rose_match::tagplan;
use rose_match::*;
use tempfile::TempDir;
use uuid::Uuid;

const CATALOG: &str = r#"
[
  {
    "artist": ["아이유", "IU"],
    "album": "Love Poem",
    "tracks": [
      {"position": 1, "title": "Unlucky", "duration_secs": 201},
      {"position": 2, "title": "그 사람", "duration_secs": 248},
      {"position": 3, "title": "Blueming", "duration_secs": 217},
      {"position": 4, "title": "Love Poem", "duration_secs": 258},
      {"position": 5, "title": "Above the Time", "duration_secs": 263},
      {"position": 6, "title": "자장가", "duration_secs": 194}
    ]
  },
  {
    "artist": "Somebody Else",
    "album": "Different Record",
    "tracks": [
      {"position": 1, "title": "Opening", "duration_secs": 120},
      {"position": 2, "title": "Closing", "duration_secs": 150}
    ]
  }
]
"#;

fn twelve_track_titles() -> Vec<&'static str> {
    vec![
        "Dawn",
        "Morning Walk",
        "Coffee",
        "Letters",
        "Rain on Glass",
        "Crossing",
        "사랑해",
        "Late Train",
        "Harbor Lights",
        "Quiet Room",
        "Paper Moon",
        "Goodnight",
    ]
}

fn release(artist: &str, album: &str, titles: &[&str]) -> CandidateRelease {
    let tracks = titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            CandidateTrack::new(i as u32 + 1, [*title])
                .unwrap()
                .with_duration(Duration::from_secs(150 + 25 * i as u64))
        })
        .collect();
    CandidateRelease::new(NormalizedName::new(artist), NormalizedName::new(album), tracks).unwrap()
}

fn local_tracks(titles: &[&str]) -> LocalCollection {
    let tracks = titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            LocalTrack::new()
                .with_tag(TagField::TrackTitle, title)
                .with_tag(TagField::TrackNumber, &(i + 1).to_string())
                .with_tag(TagField::TrackTotal, &titles.len().to_string())
                .with_tag(TagField::ReleaseArtist, "Artist")
                .with_tag(TagField::ReleaseTitle, "Album")
                .with_duration(Duration::from_secs(150 + 25 * i as u64))
        })
        .collect();
    LocalCollection::new(tracks).unwrap()
}

#[derive(Default)]
struct MemoryStore {
    ratings: HashMap<Uuid, Rating>,
}

impl RemoteRatingStore for MemoryStore {
    fn get_rating(&self, track: Uuid) -> Result<Option<Rating>> {
        Ok(self.ratings.get(&track).copied())
    }

    fn set_rating(&mut self, track: Uuid, rating: Rating) -> Result<()> {
        self.ratings.insert(track, rating);
        Ok(())
    }
}

struct StaticSource(Vec<CandidateRelease>);

impl CandidateSource for StaticSource {
    fn fetch(&self, query: &CandidateQuery) -> Result<Vec<CandidateRelease>> {
        Ok(self
            .0
            .iter()
            .filter(|r| r.artist().variants().iter().any(|v| v == query.artist()))
            .cloned()
            .collect())
    }
}

#[test]
fn test_bilingual_title_aligns_to_its_position() {
    let mut local_titles = twelve_track_titles();
    local_titles[6] = "사랑해 (I Love You)";
    let local = local_tracks(&local_titles);
    let candidate = release("Artist", "Album", &twelve_track_titles());

    let alignment = MatchResolver::default().resolve(&local, &[candidate]);
    assert_eq!(alignment.matched_count(), 12);
    let seventh = alignment.pair(local.tracks()[6].id()).unwrap();
    assert_eq!(seventh.candidate, Some(7));
    assert_eq!(alignment.candidate_track(seventh).unwrap().names().raw(), "사랑해");

    let plan = tagplan::build(&alignment, &local, &TagPolicy::default());
    let mutations = plan.mutations(local.tracks()[6].id());
    assert_eq!(mutations.len(), 2);
    assert_eq!(mutations[0].field, TagField::TrackTitle);
    assert_eq!(mutations[0].new_value, "사랑해");
    assert_eq!(mutations[1].field, TagField::TrackArtist);
}

#[test]
fn test_catalog_json_resolves_through_cache() {
    let catalog: Vec<CandidateRelease> = serde_json::from_str(CATALOG).unwrap();
    let source = CachingCandidateSource::new(StaticSource(catalog), CachePolicy::default());

    let durations = [201, 248, 217, 258, 263, 194];
    let local = LocalCollection::new(
        ["Unlucky", "그 사람", "Blueming", "Love Poem (Live)", "Above The Time", "자장가"]
            .iter()
            .zip(durations)
            .enumerate()
            .map(|(i, (title, secs))| {
                LocalTrack::new()
                    .with_tag(TagField::TrackTitle, title)
                    .with_duration(Duration::from_secs(secs))
                    .with_tag(TagField::TrackNumber, &format!("{}/6", i + 1))
                    .with_tag(TagField::ReleaseArtist, "IU")
                    .with_tag(TagField::ReleaseTitle, "love poem")
            })
            .collect(),
    )
    .unwrap();

    let query = CandidateQuery::new(local.artist_hint().raw(), local.album_hint().raw());
    let candidates = source.fetch(&query).unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(source.cached_queries().unwrap(), 1);

    let alignment = MatchResolver::default().resolve(&local, &candidates);
    assert_eq!(alignment.release().map(|r| r.album().raw()), Some("Love Poem"));
    assert!(!alignment.is_ambiguous());
    // The live take still lands on its slot, just with a lower score
    let live = alignment.pair(local.tracks()[3].id()).unwrap();
    assert_eq!(live.candidate, Some(4));
    let live_score = live.score.as_ref().unwrap().value();
    let studio_score = alignment.pair(local.tracks()[0].id()).unwrap().score.as_ref().unwrap().value();
    assert!(live_score < studio_score);
}

#[test]
fn test_near_duplicate_releases_are_flagged() {
    let titles = twelve_track_titles();
    let local = local_tracks(&titles);
    let exact = release("Artist", "Album", &titles);
    let typo = release("Artist", "Albun", &titles);

    let alignment = MatchResolver::default().resolve(&local, &[typo.clone(), exact.clone()]);
    assert!(alignment.is_ambiguous());
    assert_eq!(alignment.release(), Some(&exact));
    assert_eq!(alignment.contenders().len(), 2);

    let swapped = MatchResolver::default().resolve(&local, &[exact, typo]);
    assert_eq!(swapped, alignment);
}

#[test]
fn test_plan_from_config_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "[tag_policy]\ntrackartist = \"overwrite\"\n").unwrap();
    let config = Config::parse(Some(config_path.as_path())).unwrap();

    let local = LocalCollection::new(vec![
        LocalTrack::new()
            .with_tag(TagField::TrackTitle, "dawn")
            .with_tag(TagField::TrackArtist, "artist")
            .with_tag(TagField::TrackNumber, "1"),
        LocalTrack::new()
            .with_tag(TagField::TrackTitle, "Morning  Walk")
            .with_tag(TagField::TrackNumber, "2"),
    ])
    .unwrap();
    let candidate = release("Artist", "Album", &["Dawn", "Morning Walk"]);

    let resolver = MatchResolver::new(config.thresholds);
    let alignment = resolver.resolve(&local, &[candidate]);
    let plan = tagplan::build(&alignment, &local, &config.tag_policy);
    let first = plan.mutations(local.tracks()[0].id());
    assert!(first.iter().any(|m| m.field == TagField::TrackArtist && m.new_value == "Artist"));

    let mut updated = local.clone();
    plan.apply(&mut updated).unwrap();
    assert!(tagplan::build(&alignment, &updated, &config.tag_policy).is_empty());
}

#[test]
fn test_rating_round_trip_through_remote() {
    let track = LocalTrack::new().with_tag(TagField::Rating, &ContainerFormat::Vorbis.encode_rating(Rating::new(7).unwrap()));
    let mut store = MemoryStore::default();

    let pushed = sync_rating(&mut store, &track, None, SyncDirection::ChangedSide, false).unwrap();
    assert_eq!(pushed.action, SyncAction::PushToRemote(Rating::new(7).unwrap()));

    // The remote side changes; the next sync asks for the file to follow
    store.ratings.insert(track.id(), Rating::new(4).unwrap());
    let pulled = sync_rating(&mut store, &track, pushed.baseline, SyncDirection::ToLocal, false).unwrap();
    assert_eq!(pulled.action, SyncAction::PullToLocal(Rating::new(4).unwrap()));
    let mutation = pulled.local_mutation(&track).unwrap();

    let mut collection = LocalCollection::new(vec![track.clone()]).unwrap();
    collection.write(track.id(), &[mutation]).unwrap();
    assert_eq!(collection.tracks()[0].rating().unwrap(), Some(Rating::new(4).unwrap()));

    let settled = sync_rating(
        &mut store,
        &collection.tracks()[0],
        pulled.baseline,
        SyncDirection::ToRemote,
        false,
    )
    .unwrap();
    assert_eq!(settled.action, SyncAction::None);
    assert_eq!(settled.state(), SyncState::Synced);
}
