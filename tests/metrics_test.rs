use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use sporlstats::analysis::{
    FeatureMap, ListeningEvent, Mood, MoodLabel, TimeWindow,
    metrics::{
        self, discovery, diversity, genre_diversity, mood, primary_mood, top_artists, top_genres,
    },
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap()
}

// Helper function to create a play of `artist` `secs` seconds after t0
fn play(track: &str, artist: &str, secs: i64) -> ListeningEvent {
    ListeningEvent::new(track, vec![artist.to_string()], t0() + TimeDelta::seconds(secs))
}

fn features(pairs: &[(&str, f64)]) -> FeatureMap {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn known(ids: &[&str]) -> HashSet<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[test]
fn test_diversity_degenerate_windows() {
    assert_eq!(diversity(&[]), 0.0);

    // Any number of plays of a single artist
    let single: Vec<ListeningEvent> = (0..10).map(|i| play("t1", "A", i * 60)).collect();
    assert_eq!(diversity(&single), 0.0);
}

#[test]
fn test_diversity_all_distinct_artists() {
    let events: Vec<ListeningEvent> = ["A", "B", "C", "D", "E"]
        .iter()
        .enumerate()
        .map(|(i, artist)| play("t", artist, i as i64 * 60))
        .collect();

    assert!((diversity(&events) - 1.0).abs() < 1e-9);
}

#[test]
fn test_diversity_uneven_distribution() {
    // Two distinct artists, A played twice as often as B
    let events = vec![play("t1", "A", 0), play("t2", "B", 1), play("t3", "A", 2)];
    let score = diversity(&events);

    assert!((score - 0.9183).abs() < 1e-3, "score was {score}");

    // Equal shares bring it back to 1.0
    let mut balanced = events.clone();
    balanced.push(play("t4", "B", 3));
    assert!((diversity(&balanced) - 1.0).abs() < 1e-9);
}

#[test]
fn test_diversity_counts_every_artist_credit() {
    let collab = ListeningEvent::new("t1", vec!["A".into(), "B".into()], t0());
    let score = diversity(&[collab]);

    assert!((score - 1.0).abs() < 1e-9);
    assert!((0.0..=1.0).contains(&diversity(&[play("t1", "A", 0), play("t2", "B", 5)])));
}

#[test]
fn test_mood_unavailable_without_features() {
    let events = vec![play("t1", "A", 0), play("t2", "B", 60)];
    assert_eq!(mood(&events), Mood::Unavailable);
    assert_eq!(mood(&[]), Mood::Unavailable);

    // An empty feature map carries no data
    let empty = play("t3", "C", 120).with_audio_features(FeatureMap::new());
    assert_eq!(mood(&[empty]), Mood::Unavailable);
}

#[test]
fn test_mood_averages_carriers_only() {
    let events = vec![
        play("t1", "A", 0).with_audio_features(features(&[("energy", 0.8), ("valence", 0.2)])),
        play("t2", "B", 60),
        play("t3", "C", 120).with_audio_features(features(&[("energy", 0.4), ("valence", 0.6)])),
    ];

    let Mood::Present(vector) = mood(&events) else {
        panic!("mood should be available");
    };

    assert!((vector["energy"] - 0.6).abs() < 1e-9);
    assert!((vector["valence"] - 0.4).abs() < 1e-9);
    assert_eq!(vector.len(), 2);
}

#[test]
fn test_mood_of_zero_features_is_not_unavailable() {
    let events = vec![play("t1", "A", 0).with_audio_features(features(&[("energy", 0.0)]))];

    let result = mood(&events);
    assert!(result.is_available());
    assert_eq!(result.vector().unwrap()["energy"], 0.0);
}

#[test]
fn test_primary_mood() {
    assert_eq!(primary_mood(&Mood::Unavailable), None);

    let calm = Mood::Present(features(&[
        ("energy", 0.2),
        ("valence", 0.3),
        ("acousticness", 0.9),
        ("danceability", 0.4),
    ]));
    assert_eq!(primary_mood(&calm), Some(MoodLabel::Chill));

    // Equal scores resolve to the earlier label
    let tied = Mood::Present(features(&[("energy", 0.5), ("valence", 0.5)]));
    assert_eq!(primary_mood(&tied), Some(MoodLabel::Energetic));

    // No dimension the scores are built from
    let unrelated = Mood::Present(features(&[("tempo", 120.0)]));
    assert_eq!(primary_mood(&unrelated), None);
}

#[test]
fn test_mood_scores() {
    let scores = metrics::mood_scores(&features(&[("energy", 0.7), ("valence", 0.25)]));

    assert!((scores[&MoodLabel::Energetic] - 70.0).abs() < 1e-9);
    assert!((scores[&MoodLabel::Happy] - 25.0).abs() < 1e-9);
    assert!((scores[&MoodLabel::Melancholic] - 75.0).abs() < 1e-9);
    assert!(!scores.contains_key(&MoodLabel::Chill));
}

#[test]
fn test_discovery_counts_new_artists_once() {
    let window = vec![play("t1", "A", 0), play("t2", "B", 60)];
    assert_eq!(discovery(&window, &known(&["A"])), 1);

    let repeated = vec![
        play("t1", "B", 0),
        play("t2", "B", 60),
        play("t3", "C", 120),
        play("t4", "A", 180),
    ];
    assert_eq!(discovery(&repeated, &known(&["A"])), 2);
    assert_eq!(discovery(&repeated, &known(&[])), 3);
    assert_eq!(discovery(&[], &known(&["A"])), 0);
}

#[test]
fn test_top_artists() {
    let events = vec![
        play("t1", "B", 0),
        play("t2", "A", 10),
        play("t3", "A", 20),
        play("t4", "C", 30),
        play("t5", "B", 40),
        play("t6", "D", 50),
    ];

    // A and B tie on count, B appeared first
    assert_eq!(top_artists(&events, 3), vec!["B", "A", "C"]);
    assert_eq!(top_artists(&events, 10).len(), 4);
    assert!(top_artists(&events, 0).is_empty());
}

#[test]
fn test_snapshot() {
    let window = TimeWindow::new(t0(), t0() + TimeDelta::days(7));
    let events = vec![
        play("t1", "A", 0).with_audio_features(features(&[("energy", 0.9), ("valence", 0.6)])),
        play("t2", "B", 60),
        play("t3", "A", 120),
    ];

    let snapshot = metrics::snapshot(window, &events, &known(&["B"]), 5);

    assert_eq!(snapshot.window, window);
    assert_eq!(snapshot.event_count, 3);
    assert_eq!(snapshot.distinct_artists, 2);
    assert_eq!(snapshot.discovery_count, 1);
    assert_eq!(snapshot.top_artist_ids, vec!["A", "B"]);
    assert_eq!(snapshot.primary_mood, Some(MoodLabel::Energetic));
    assert!((snapshot.diversity_score - 0.9183).abs() < 1e-3);
}

#[test]
fn test_snapshot_serialization_keeps_unavailable_marker() {
    let window = TimeWindow::new(t0(), t0() + TimeDelta::days(1));
    let snapshot = metrics::snapshot(window, &[play("t1", "A", 0)], &known(&[]), 5);
    let json = serde_json::to_value(&snapshot).unwrap();

    assert_eq!(json["mood"]["status"], "unavailable");
    assert!(json["mood"].get("vector").is_none());
    assert!(json.get("primary_mood").is_none());
    assert!(json.get("window_start").is_some());
    assert!(json.get("window_end").is_some());
    assert_eq!(json["diversity_score"], 0.0);
}

fn tagged(track: &str, artist: &str, secs: i64, genres: &[&str]) -> ListeningEvent {
    play(track, artist, secs).with_genres(genres.iter().map(|g| g.to_string()).collect())
}

#[test]
fn test_genre_diversity() {
    // No genre data at all, or a single genre
    assert_eq!(genre_diversity(&[play("t1", "A", 0), play("t2", "B", 1)]), 0.0);
    assert_eq!(
        genre_diversity(&[tagged("t1", "A", 0, &["jazz"]), tagged("t2", "B", 1, &["jazz"])]),
        0.0
    );

    let even = [
        tagged("t1", "A", 0, &["jazz"]),
        tagged("t2", "B", 1, &["ambient"]),
        tagged("t3", "C", 2, &["techno"]),
    ];
    assert!((genre_diversity(&even) - 1.0).abs() < 1e-9);

    // A genre listed twice on one play still counts once
    let repeated = [
        tagged("t1", "A", 0, &["jazz", "jazz"]),
        tagged("t2", "B", 1, &["ambient"]),
    ];
    assert!((genre_diversity(&repeated) - 1.0).abs() < 1e-9);
}

#[test]
fn test_top_genres() {
    let events = vec![
        tagged("t1", "A", 0, &["indie rock", "shoegaze"]),
        tagged("t2", "B", 1, &["jazz"]),
        tagged("t3", "A", 2, &["indie rock", "shoegaze"]),
        tagged("t4", "C", 3, &["indie rock"]),
    ];

    let top = top_genres(&events, 2);

    assert_eq!(top.len(), 2);
    assert_eq!(top[0].0, "indie rock");
    assert!((top[0].1 - 0.5).abs() < 1e-9);
    assert_eq!(top[1].0, "shoegaze");
    assert!(top_genres(&[play("t1", "A", 0)], 5).is_empty());
}

#[test]
fn test_snapshot_genres() {
    let window = TimeWindow::new(t0(), t0() + TimeDelta::days(7));
    let events = vec![
        tagged("t1", "A", 0, &["jazz"]),
        tagged("t2", "B", 60, &["jazz", "ambient"]),
        play("t3", "C", 120),
    ];

    let snapshot = metrics::snapshot(window, &events, &known(&[]), 1);

    assert_eq!(snapshot.distinct_genres, 2);
    assert_eq!(snapshot.top_genres, vec!["jazz"]);
    assert!((snapshot.top_genre_share - 2.0 / 3.0).abs() < 1e-9);
    assert!(snapshot.genre_diversity > 0.9 && snapshot.genre_diversity < 1.0);
    assert!(snapshot.has_genres());

    let without = metrics::snapshot(window, &[play("t1", "A", 0)], &known(&[]), 5);
    assert!(!without.has_genres());
    assert!(without.top_genres.is_empty());
    assert_eq!(without.top_genre_share, 0.0);
}
