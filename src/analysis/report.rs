use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::{
    AnalysisError, evolution,
    model::{EvolutionReport, MetricSnapshot},
};

/// Number of snapshots a report covers unless configured otherwise.
pub const DEFAULT_REPORT_SNAPSHOTS: usize = 3;

/// Mood dimensions written as CSV columns.
const MOOD_COLUMNS: [&str; 4] = ["energy", "valence", "danceability", "acousticness"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// The full report document
    Json,
    /// One row per snapshot, tagged with the changes since the previous one
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

/// Exportable history report.
///
/// Field names are part of the export format and must stay stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryReport {
    pub account: String,
    pub generated_at: DateTime<Utc>,
    pub snapshots: Vec<MetricSnapshot>,
    pub evolution: Vec<EvolutionReport>,
}

impl HistoryReport {
    /// Builds a report from the latest `latest` snapshots.
    ///
    /// Snapshots are ordered oldest to newest and only adjacent pairs
    /// `(i, i + 1)` are compared, so `evolution` holds `snapshots.len() - 1`
    /// entries.
    pub fn assemble(
        account: impl Into<String>,
        mut snapshots: Vec<MetricSnapshot>,
        latest: usize,
        generated_at: DateTime<Utc>,
    ) -> Result<Self, AnalysisError> {
        snapshots.sort_by_key(|s| (s.window.start, s.window.end));
        let skip = snapshots.len().saturating_sub(latest);
        let snapshots: Vec<MetricSnapshot> = snapshots.into_iter().skip(skip).collect();

        let evolution = snapshots
            .windows(2)
            .map(|pair| evolution::compare(&pair[0], &pair[1]))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            account: account.into(),
            generated_at,
            snapshots,
            evolution,
        })
    }

    /// Writes the report in `format`, creating parent directories.
    pub async fn export(&self, path: &Path, format: ExportFormat) -> crate::Res<()> {
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let content = match format {
            ExportFormat::Json => serde_json::to_string_pretty(self)?,
            ExportFormat::Csv => self.to_csv()?,
        };
        async_fs::write(path, content).await?;
        Ok(())
    }

    /// Flat rendering with one row per snapshot, oldest first.
    ///
    /// Mood columns stay empty when mood is unavailable and `mood_status`
    /// says so. `tags` lists the evolution tags against the previous row.
    pub fn to_csv(&self) -> crate::Res<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header = vec![
            "window_start",
            "window_end",
            "event_count",
            "distinct_artists",
            "diversity_score",
            "discovery_count",
            "top_artist_ids",
            "distinct_genres",
            "genre_diversity",
            "top_genre_share",
            "top_genres",
            "mood_status",
            "primary_mood",
        ];
        header.extend(MOOD_COLUMNS);
        header.push("tags");
        writer.write_record(&header)?;

        for (i, snapshot) in self.snapshots.iter().enumerate() {
            let tags = i
                .checked_sub(1)
                .and_then(|prev| self.evolution.get(prev))
                .map(|e| {
                    e.narrative_tags
                        .iter()
                        .map(|t| t.to_string())
                        .collect::<Vec<_>>()
                        .join("; ")
                })
                .unwrap_or_default();

            let mut record = vec![
                snapshot.window.start.to_rfc3339_opts(SecondsFormat::Secs, true),
                snapshot.window.end.to_rfc3339_opts(SecondsFormat::Secs, true),
                snapshot.event_count.to_string(),
                snapshot.distinct_artists.to_string(),
                format!("{:.4}", snapshot.diversity_score),
                snapshot.discovery_count.to_string(),
                snapshot.top_artist_ids.join(";"),
                snapshot.distinct_genres.to_string(),
                format!("{:.4}", snapshot.genre_diversity),
                format!("{:.4}", snapshot.top_genre_share),
                snapshot.top_genres.join(";"),
                if snapshot.mood.is_available() {
                    "available".into()
                } else {
                    "unavailable".into()
                },
                snapshot
                    .primary_mood
                    .map(|m| m.to_string())
                    .unwrap_or_default(),
            ];
            record.extend(MOOD_COLUMNS.iter().map(|dimension| {
                snapshot
                    .mood
                    .vector()
                    .and_then(|v| v.get(*dimension))
                    .map(|value| format!("{:.4}", value))
                    .unwrap_or_default()
            }));
            record.push(tags);
            writer.write_record(&record)?;
        }

        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8(bytes)?)
    }
}
