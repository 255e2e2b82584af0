use std::path::PathBuf;

use chrono::{Local, TimeDelta, Utc};
use tabled::Table;

use super::context;
use crate::{
    analysis::{
        self, EvolutionReport, ExportFormat, HistoryReport, MetricSnapshot, Mood, TimeWindow,
        metrics,
    },
    config,
    error, info,
    types::{EvolutionTableRow, HistoryTableRow, SnapshotTableRow},
    utils::{self, percent},
    success, warning,
};

pub const MOOD_UNAVAILABLE: &str = "mood data unavailable for this window";
pub const GENRES_UNAVAILABLE: &str = "no genre data";

pub struct AnalyzeOptions {
    pub windows: Option<usize>,
    pub days: Option<u32>,
    pub refresh: bool,
    pub export: bool,
    pub format: ExportFormat,
    pub output: Option<PathBuf>,
}

/// Computes snapshots for the latest windows, compares adjacent ones and
/// prints (and optionally exports) the report.
pub async fn analyze(opts: AnalyzeOptions) {
    let history = context::history_config();
    let mut store = context::open_store(&history).await;

    if store.is_empty() {
        warning!("No plays recorded yet. Run sporlstats sync or sporlstats monitor first.");
        return;
    }

    if opts.refresh {
        if let Err(e) = store.clear_snapshots().await {
            error!("Cannot clear cached snapshots. Err: {}", e);
        }
    }

    let count = opts.windows.unwrap_or(history.report_snapshots).max(1);
    let days = opts.days.unwrap_or(history.window_days);
    let now = Utc::now();
    let windows = utils::analysis_windows(now, days, count);

    let snapshots =
        match analysis::snapshots_for(&mut store, &windows, &history.analysis_options()).await {
            Ok(s) => s,
            Err(e) => error!("Cannot compute snapshots. Err: {}", e),
        };

    let report = match HistoryReport::assemble(store.account(), snapshots, count, now) {
        Ok(r) => r,
        Err(e) => error!("Cannot compare snapshots. Err: {}", e),
    };

    info!("Listening history of {} in {}-day windows", report.account, days);
    println!("{}", Table::new(report.snapshots.iter().map(snapshot_row)));

    if report.evolution.is_empty() {
        info!("A single window has nothing to compare against.");
    } else {
        println!("{}", Table::new(report.evolution.iter().map(evolution_row)));
    }

    if opts.export {
        let path = opts.output.unwrap_or_else(|| {
            config::export_dir().join(format!(
                "analysis_{}.{}",
                now.with_timezone(&Local).format("%Y%m%d_%H%M%S"),
                opts.format.extension()
            ))
        });

        match report.export(&path, opts.format).await {
            Ok(()) => success!("Report exported to {}", path.display()),
            Err(e) => error!("Cannot export report. Err: {}", e),
        }
    }
}

/// Lists the recorded plays of the last `days` days, newest first.
pub async fn history(days: u32, limit: usize) {
    let history = context::history_config();
    let store = context::open_store(&history).await;

    let now = Utc::now();
    let window = TimeWindow::new(
        now - TimeDelta::days(i64::from(days.max(1))),
        now + TimeDelta::seconds(1),
    );
    let events = store.query(window);

    if events.is_empty() {
        warning!("No plays recorded in the last {} days.", days);
        return;
    }

    let rows: Vec<HistoryTableRow> = events
        .iter()
        .rev()
        .take(limit)
        .map(|e| HistoryTableRow {
            played_at: e
                .played_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            track: if e.track_name.is_empty() {
                e.track_id.clone()
            } else {
                e.track_name.clone()
            },
            artists: if e.artist_names.is_empty() {
                e.artist_ids.join(", ")
            } else {
                e.artist_names.join(", ")
            },
            features: match &e.audio_features {
                Some(f) if !f.is_empty() => ["energy", "valence", "danceability"]
                    .iter()
                    .filter_map(|k| f.get(*k).map(|v| format!("{} {:.2}", k, v)))
                    .collect::<Vec<_>>()
                    .join(", "),
                _ => "-".into(),
            },
        })
        .collect();

    info!("{} of {} plays in the last {} days", rows.len(), events.len(), days);
    println!("{}", Table::new(rows));
}

/// Deletes plays before a date or older than a number of days.
pub async fn prune(before: Option<String>, older_than_days: Option<u32>) {
    let cutoff = match (before, older_than_days) {
        (Some(date), None) => match utils::parse_day_start(&date) {
            Ok(d) => d,
            Err(e) => error!("{}", e),
        },
        (None, Some(days)) => Utc::now() - TimeDelta::days(i64::from(days)),
        _ => error!("Pass exactly one of --before or --older-than-days."),
    };

    let history = context::history_config();
    let mut store = context::open_store(&history).await;

    match store.prune(cutoff).await {
        Ok(0) => info!("Nothing recorded before {}.", cutoff.format("%Y-%m-%d %H:%M")),
        Ok(removed) => success!(
            "Pruned {} plays recorded before {}. {} plays remain.",
            removed,
            cutoff.format("%Y-%m-%d %H:%M"),
            store.len()
        ),
        Err(e) => error!("Cannot prune history. Err: {}", e),
    }
}

fn window_label(window: &TimeWindow) -> String {
    let last_day = window.end - TimeDelta::seconds(1);
    format!(
        "{} - {}",
        window.start.format("%Y-%m-%d"),
        last_day.format("%Y-%m-%d")
    )
}

pub fn snapshot_row(snapshot: &MetricSnapshot) -> SnapshotTableRow {
    let mood = match (&snapshot.mood, snapshot.primary_mood) {
        (Mood::Unavailable, _) => MOOD_UNAVAILABLE.to_string(),
        (Mood::Present(vector), Some(label)) => {
            let score = metrics::mood_scores(vector)
                .get(&label)
                .copied()
                .unwrap_or_default();
            format!("{} ({:.0})", label, score)
        }
        (Mood::Present(_), None) => "-".to_string(),
    };

    let genres = match snapshot.top_genres.first() {
        Some(top) => format!(
            "{} ({} share), {} genres, {} diverse",
            top,
            percent(snapshot.top_genre_share),
            snapshot.distinct_genres,
            percent(snapshot.genre_diversity)
        ),
        None => GENRES_UNAVAILABLE.to_string(),
    };

    SnapshotTableRow {
        window: window_label(&snapshot.window),
        plays: snapshot.event_count,
        artists: snapshot.distinct_artists,
        diversity: percent(snapshot.diversity_score),
        discovery: snapshot.discovery_count,
        genres,
        mood,
    }
}

pub fn evolution_row(report: &EvolutionReport) -> EvolutionTableRow {
    let changes = report
        .deltas
        .iter()
        .filter(|(_, delta)| delta.abs() > f64::EPSILON)
        .map(|(key, delta)| format!("{} {:+.2}", key, delta))
        .collect::<Vec<_>>();

    let mut tags = report
        .narrative_tags
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>();
    if !report.baseline.mood.is_available() || !report.comparison.mood.is_available() {
        tags.push("mood not comparable".into());
    }

    EvolutionTableRow {
        period: format!(
            "{} → {}",
            window_label(&report.baseline.window),
            window_label(&report.comparison.window)
        ),
        changes: if changes.is_empty() {
            "-".into()
        } else {
            changes.join("\n")
        },
        tags: if tags.is_empty() {
            "-".into()
        } else {
            tags.join(", ")
        },
    }
}
