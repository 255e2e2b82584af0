use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use sporlstats::analysis::{
    AnalysisError, EvolutionTag, ExportFormat, FeatureMap, HistoryReport, MetricSnapshot, Mood,
    MoodLabel, TimeWindow, evolution::compare,
};

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap() + TimeDelta::days(n)
}

fn week(n: i64) -> TimeWindow {
    TimeWindow::new(day(7 * n), day(7 * n + 7))
}

// Helper function to create a snapshot without mood data
fn snapshot(window: TimeWindow, diversity: f64, discovery: usize, top: &[&str]) -> MetricSnapshot {
    MetricSnapshot {
        window,
        event_count: 10,
        distinct_artists: 4,
        diversity_score: diversity,
        mood: Mood::Unavailable,
        primary_mood: None,
        discovery_count: discovery,
        top_artist_ids: top.iter().map(|id| id.to_string()).collect(),
        distinct_genres: 0,
        genre_diversity: 0.0,
        top_genre_share: 0.0,
        top_genres: Vec::new(),
    }
}

fn with_genres(mut snapshot: MetricSnapshot, diversity: f64, top: &[&str]) -> MetricSnapshot {
    snapshot.distinct_genres = top.len();
    snapshot.genre_diversity = diversity;
    snapshot.top_genre_share = 0.5;
    snapshot.top_genres = top.iter().map(|g| g.to_string()).collect();
    snapshot
}

fn with_mood(mut snapshot: MetricSnapshot, energy: f64, valence: f64, primary: MoodLabel) -> MetricSnapshot {
    snapshot.mood = Mood::Present(FeatureMap::from([
        ("energy".to_string(), energy),
        ("valence".to_string(), valence),
    ]));
    snapshot.primary_mood = Some(primary);
    snapshot
}

fn tags(tags: &[EvolutionTag]) -> std::collections::BTreeSet<EvolutionTag> {
    tags.iter().copied().collect()
}

#[test]
fn test_compare_deltas_and_tags() {
    let baseline = snapshot(week(0), 0.4, 2, &["A", "B"]);
    let mut comparison = snapshot(week(1), 0.65, 5, &["B", "A"]);
    comparison.event_count = 14;

    let report = compare(&baseline, &comparison).unwrap();

    assert!((report.deltas["diversity_score"] - 0.25).abs() < 1e-9);
    assert_eq!(report.deltas["discovery_count"], 3.0);
    assert_eq!(report.deltas["event_count"], 4.0);
    assert_eq!(report.deltas["distinct_artists"], 0.0);
    assert_eq!(
        report.narrative_tags,
        tags(&[
            EvolutionTag::MoreDiverse,
            EvolutionTag::MoreDiscovery,
            EvolutionTag::NewTopArtist
        ])
    );
    assert_eq!(report.baseline, baseline);
    assert_eq!(report.comparison, comparison);
}

#[test]
fn test_small_changes_earn_no_tags() {
    let baseline = snapshot(week(0), 0.5, 3, &["A"]);
    let comparison = snapshot(week(1), 0.55, 3, &["A"]);

    let report = compare(&baseline, &comparison).unwrap();

    assert!(report.narrative_tags.is_empty());
}

#[test]
fn test_decreases() {
    let baseline = snapshot(week(0), 0.9, 6, &["A"]);
    let comparison = snapshot(week(1), 0.3, 1, &["A"]);

    let report = compare(&baseline, &comparison).unwrap();

    assert!(report.deltas["diversity_score"] < 0.0);
    assert_eq!(
        report.narrative_tags,
        tags(&[EvolutionTag::LessDiverse, EvolutionTag::LessDiscovery])
    );
}

#[test]
fn test_incompatible_windows() {
    let a = snapshot(week(0), 0.5, 0, &[]);
    let b = snapshot(week(1), 0.5, 0, &[]);
    let overlapping = snapshot(TimeWindow::new(day(3), day(10)), 0.5, 0, &[]);

    // Misordered
    assert!(matches!(
        compare(&b, &a),
        Err(AnalysisError::IncompatibleWindows { .. })
    ));
    // Overlapping in both directions
    assert!(matches!(
        compare(&a, &overlapping),
        Err(AnalysisError::IncompatibleWindows { .. })
    ));
    assert!(matches!(
        compare(&overlapping, &b),
        Err(AnalysisError::IncompatibleWindows { .. })
    ));
    // Identical window
    assert!(compare(&a, &a).is_err());

    // Inverted windows never compare, even when they would seem ordered
    let inverted = snapshot(
        TimeWindow {
            start: day(20),
            end: day(14),
        },
        0.5,
        0,
        &[],
    );
    assert!(matches!(
        compare(&a, &inverted),
        Err(AnalysisError::IncompatibleWindows { .. })
    ));
    assert!(matches!(
        compare(&inverted, &snapshot(week(4), 0.5, 0, &[])),
        Err(AnalysisError::IncompatibleWindows { .. })
    ));

    // Touching windows and gaps are fine
    assert!(compare(&a, &b).is_ok());
    assert!(compare(&a, &snapshot(week(3), 0.5, 0, &[])).is_ok());
}

#[test]
fn test_mood_tags() {
    let baseline = with_mood(snapshot(week(0), 0.5, 1, &["A"]), 0.3, 0.7, MoodLabel::Happy);
    let comparison = with_mood(snapshot(week(1), 0.5, 1, &["A"]), 0.8, 0.4, MoodLabel::Energetic);

    let report = compare(&baseline, &comparison).unwrap();

    assert!((report.deltas["mood.energy"] - 0.5).abs() < 1e-9);
    assert!((report.deltas["mood.valence"] + 0.3).abs() < 1e-9);
    assert_eq!(
        report.narrative_tags,
        tags(&[
            EvolutionTag::NewPrimaryMood,
            EvolutionTag::MoreEnergetic,
            EvolutionTag::MoreMelancholic
        ])
    );

    let reverse = compare(
        &with_mood(snapshot(week(2), 0.5, 1, &["A"]), 0.8, 0.4, MoodLabel::Energetic),
        &with_mood(snapshot(week(3), 0.5, 1, &["A"]), 0.3, 0.7, MoodLabel::Energetic),
    )
    .unwrap();
    assert_eq!(
        reverse.narrative_tags,
        tags(&[EvolutionTag::Calmer, EvolutionTag::Happier])
    );
}

#[test]
fn test_unavailable_mood_suppresses_mood_tags() {
    let baseline = snapshot(week(0), 0.2, 0, &["A"]);
    let comparison = with_mood(snapshot(week(1), 0.6, 2, &["A"]), 0.9, 0.9, MoodLabel::Energetic);

    for report in [
        compare(&baseline, &comparison).unwrap(),
        compare(
            &with_mood(snapshot(week(0), 0.2, 0, &["A"]), 0.1, 0.1, MoodLabel::Melancholic),
            &snapshot(week(1), 0.6, 2, &["A"]),
        )
        .unwrap(),
    ] {
        assert!(report.narrative_tags.iter().all(|t| !t.is_mood_related()));
        assert!(report.deltas.keys().all(|k| !k.starts_with("mood.")));
        // Other metrics are still compared
        assert!(report.narrative_tags.contains(&EvolutionTag::MoreDiverse));
    }
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "window must start before it ends")]
fn test_inverted_window_is_rejected_on_construction() {
    TimeWindow::new(day(7), day(0));
}

#[test]
fn test_genre_tags() {
    let baseline = with_genres(snapshot(week(0), 0.5, 1, &["A"]), 0.2, &["indie rock", "shoegaze"]);
    let comparison = with_genres(snapshot(week(1), 0.5, 1, &["A"]), 0.6, &["jazz", "indie rock", "ambient"]);

    let report = compare(&baseline, &comparison).unwrap();

    assert!((report.deltas["genre_diversity"] - 0.4).abs() < 1e-9);
    assert_eq!(report.deltas["distinct_genres"], 1.0);
    assert_eq!(
        report.narrative_tags,
        tags(&[EvolutionTag::BroaderGenres, EvolutionTag::NewTopGenre])
    );

    let narrower = compare(
        &with_genres(snapshot(week(2), 0.5, 1, &["A"]), 0.7, &["jazz"]),
        &with_genres(snapshot(week(3), 0.5, 1, &["A"]), 0.3, &["jazz"]),
    )
    .unwrap();
    assert_eq!(narrower.narrative_tags, tags(&[EvolutionTag::NarrowerGenres]));
}

#[test]
fn test_missing_genres_suppress_genre_tags() {
    let baseline = snapshot(week(0), 0.5, 1, &["A"]);
    let comparison = with_genres(snapshot(week(1), 0.5, 1, &["A"]), 0.9, &["jazz"]);

    let report = compare(&baseline, &comparison).unwrap();

    assert!(report.narrative_tags.iter().all(|t| !t.is_genre_related()));
    assert!(!report.deltas.contains_key("genre_diversity"));
}

#[test]
fn test_evolution_report_field_names() {
    let report = compare(
        &snapshot(week(0), 0.2, 0, &["A"]),
        &snapshot(week(1), 0.6, 0, &["A"]),
    )
    .unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert!(json.get("baseline_snapshot").is_some());
    assert!(json.get("comparison_snapshot").is_some());
    assert_eq!(json["narrative_tags"], serde_json::json!(["more diverse"]));
    assert!(json["deltas"].get("diversity_score").is_some());
}

#[test]
fn test_report_keeps_latest_snapshots_in_order() {
    // Supplied out of order
    let snapshots = vec![
        snapshot(week(3), 0.4, 1, &["A"]),
        snapshot(week(0), 0.1, 1, &["A"]),
        snapshot(week(4), 0.5, 1, &["A"]),
        snapshot(week(1), 0.2, 1, &["A"]),
        snapshot(week(2), 0.3, 1, &["A"]),
    ];

    let report = HistoryReport::assemble("listener", snapshots, 3, day(40)).unwrap();

    let starts: Vec<_> = report.snapshots.iter().map(|s| s.window.start).collect();
    assert_eq!(starts, vec![week(2).start, week(3).start, week(4).start]);

    // Adjacent pairs only
    assert_eq!(report.evolution.len(), 2);
    for (i, evolution) in report.evolution.iter().enumerate() {
        assert_eq!(evolution.baseline, report.snapshots[i]);
        assert_eq!(evolution.comparison, report.snapshots[i + 1]);
    }
}

#[test]
fn test_report_edge_cases() {
    let empty = HistoryReport::assemble("listener", Vec::new(), 3, day(0)).unwrap();
    assert!(empty.snapshots.is_empty());
    assert!(empty.evolution.is_empty());

    let single = HistoryReport::assemble("listener", vec![snapshot(week(0), 0.1, 0, &[])], 3, day(7))
        .unwrap();
    assert_eq!(single.snapshots.len(), 1);
    assert!(single.evolution.is_empty());

    let overlapping = vec![
        snapshot(week(0), 0.1, 0, &[]),
        snapshot(TimeWindow::new(day(3), day(10)), 0.1, 0, &[]),
    ];
    assert!(HistoryReport::assemble("listener", overlapping, 3, day(10)).is_err());
}

#[tokio::test]
async fn test_report_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exports/nested/analysis.json");

    let snapshots = vec![
        snapshot(week(0), 0.2, 1, &["A"]),
        with_mood(snapshot(week(1), 0.6, 3, &["B"]), 0.7, 0.5, MoodLabel::Energetic),
    ];
    let report = HistoryReport::assemble("listener", snapshots, 3, day(14)).unwrap();
    report.export(&path, ExportFormat::Json).await.unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&content).unwrap();

    assert_eq!(json["account"], "listener");
    assert!(json.get("generated_at").is_some());
    assert_eq!(json["snapshots"].as_array().unwrap().len(), 2);
    assert_eq!(json["snapshots"][0]["mood"]["status"], "unavailable");
    assert_eq!(json["snapshots"][1]["mood"]["status"], "available");
    assert_eq!(json["snapshots"][1]["mood"]["vector"]["energy"], 0.7);
    assert_eq!(json["snapshots"][1]["primary_mood"], "energetic");
    assert_eq!(json["evolution"].as_array().unwrap().len(), 1);

    let parsed: HistoryReport = serde_json::from_str(&content).unwrap();
    assert_eq!(parsed, report);
}

#[tokio::test]
async fn test_report_csv_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("analysis.csv");

    let snapshots = vec![
        snapshot(week(0), 0.2, 1, &["A", "B"]),
        with_genres(
            with_mood(snapshot(week(1), 0.6, 3, &["B"]), 0.7, 0.5, MoodLabel::Energetic),
            0.8,
            &["jazz", "ambient"],
        ),
    ];
    let report = HistoryReport::assemble("listener", snapshots, 3, day(14)).unwrap();
    report.export(&path, ExportFormat::Csv).await.unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);

    let header: Vec<&str> = lines[0].split(',').collect();
    let column = |name: &str| header.iter().position(|h| *h == name).unwrap();
    let first: Vec<&str> = lines[1].split(',').collect();
    let second: Vec<&str> = lines[2].split(',').collect();

    assert_eq!(first[column("window_start")], "2025-03-03T00:00:00Z");
    assert_eq!(first[column("top_artist_ids")], "A;B");
    assert_eq!(first[column("mood_status")], "unavailable");
    // No zeros stand in for missing mood data
    assert_eq!(first[column("energy")], "");
    assert_eq!(first[column("tags")], "");

    assert_eq!(second[column("mood_status")], "available");
    assert_eq!(second[column("primary_mood")], "energetic");
    assert_eq!(second[column("energy")], "0.7000");
    assert_eq!(second[column("top_genres")], "jazz;ambient");
    assert_eq!(second[column("tags")], "more diverse; more discovery; new top artist");
}
