//! # Analysis Module
//!
//! Historical analysis of the listening history held in the
//! [`SnapshotStore`](crate::management::SnapshotStore).
//!
//! ## Pipeline
//!
//! ```text
//! SnapshotStore ──query(window)──▶ metrics ──▶ MetricSnapshot (cached per window + params)
//!                                                   │
//!                                   evolution::compare(i, i + 1)
//!                                                   │
//!                                   HistoryReport (JSON export / tables)
//! ```
//!
//! - [`metrics`] - pure functions: diversity, mood, discovery, top artists,
//!   genres
//! - [`evolution`] - deltas and narrative tags between two adjacent snapshots
//! - [`report`] - the exportable document combining the latest N snapshots
//!
//! Missing audio features are an expected condition. They surface as
//! [`Mood::Unavailable`] all the way to the report instead of as zeros.

pub mod evolution;
pub mod metrics;
mod model;
pub mod report;

use std::collections::HashSet;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use model::{
    EvolutionReport, EvolutionTag, FeatureMap, ListeningEvent, MetricSnapshot, Mood, MoodLabel,
    TimeWindow,
};
pub use report::{ExportFormat, HistoryReport};

use crate::{
    management::{SnapshotStore, StoreError},
    warning,
};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("incompatible windows: baseline {baseline} must end before comparison {comparison} starts")]
    IncompatibleWindows {
        baseline: TimeWindow,
        comparison: TimeWindow,
    },
}

/// Knobs for computing snapshots from the store.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// How far back artists count as already known. `None` means all history.
    pub discovery_horizon: Option<TimeDelta>,
    pub top_artists: usize,
}

impl AnalysisOptions {
    pub fn params(&self) -> SnapshotParams {
        SnapshotParams {
            discovery_horizon_secs: self.discovery_horizon.map(|h| h.num_seconds()),
            top_artists: self.top_artists,
        }
    }
}

/// The options a cached snapshot was computed with. A cached snapshot is only
/// reused under equal params.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotParams {
    pub discovery_horizon_secs: Option<i64>,
    pub top_artists: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            discovery_horizon: None,
            top_artists: metrics::DEFAULT_TOP_ARTISTS,
        }
    }
}

/// Returns one snapshot per window, computing and caching the ones the store
/// does not have yet under the same options.
///
/// The discovery baseline of a window is every artist played in
/// `[window.start - horizon, window.start)`.
pub async fn snapshots_for(
    store: &mut SnapshotStore,
    windows: &[TimeWindow],
    options: &AnalysisOptions,
) -> Result<Vec<MetricSnapshot>, StoreError> {
    let params = options.params();
    let mut snapshots = Vec::with_capacity(windows.len());

    for window in windows {
        if let Some(cached) = store.cached_snapshot(window, &params) {
            snapshots.push(cached.clone());
            continue;
        }

        let events = store.query(*window);
        let known_from = options.discovery_horizon.map(|h| window.start - h);
        let known: HashSet<String> = store.artist_ids_between(known_from, window.start);
        let snapshot = metrics::snapshot(*window, events.as_slice(), &known, options.top_artists);

        match store.cache_snapshot(snapshot.clone(), params).await {
            Ok(()) => {}
            Err(e @ StoreError::OverlappingSnapshot { .. }) => {
                warning!("Snapshot not cached: {}", e);
            }
            Err(e) => return Err(e),
        }

        snapshots.push(snapshot);
    }

    Ok(snapshots)
}
