use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::context;
use crate::{
    error, info,
    management::StoreError,
    monitor::{self, MonitorOptions, StopReason},
    spotify::{self, player::RecentlyPlayedSource},
    success, warning,
};

/// Pulls the recently played tracks once and records the new ones.
pub async fn sync() {
    let history = context::history_config();
    let mut store = context::open_store(&history).await;
    let mut client = context::client().await;

    let pb = context::spinner("Fetching recently played tracks...");
    let events = spotify::player::fetch_recent_events(&mut client, None).await;
    pb.finish_and_clear();

    let events = match events {
        Ok(e) => e,
        Err(e) => error!("Failed to fetch recently played tracks. Err: {}", e),
    };

    let mut appended = 0;
    let mut duplicates = 0;
    let mut without_features = 0;
    for event in events {
        if !event.has_audio_features() {
            without_features += 1;
        }
        match store.append(event).await {
            Ok(()) => appended += 1,
            Err(StoreError::DuplicateEvent { .. }) => duplicates += 1,
            Err(e) => error!("Failed to record play. Err: {}", e),
        }
    }

    if without_features > 0 {
        warning!("{} plays have no audio features.", without_features);
    }
    success!(
        "Recorded {} new plays ({} already known). {} plays stored.",
        appended,
        duplicates,
        store.len()
    );
}

/// Keeps recording plays until interrupted or `duration_mins` elapse.
pub async fn monitor(interval_secs: Option<u64>, duration_mins: Option<u64>) {
    let history = context::history_config();
    let mut store = context::open_store(&history).await;
    let client = context::client().await;

    let after = store.latest_played_at().map(|t| t.timestamp_millis());
    let mut source = RecentlyPlayedSource::new(client, after);

    let options = MonitorOptions {
        interval: interval_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or_else(|| history.monitor_interval()),
        duration: duration_mins.map(|m| Duration::from_secs(m * 60)),
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    info!(
        "Monitoring plays every {} seconds. Press Ctrl+C to stop.",
        options.interval.as_secs()
    );

    match monitor::run(&mut store, &mut source, &options, &cancel).await {
        Ok(summary) => {
            let reason = match summary.stop {
                StopReason::Cancelled => "interrupted",
                StopReason::DeadlineReached => "duration reached",
            };
            success!(
                "Monitor stopped ({}). {} polls, {} new plays, {} already known.",
                reason,
                summary.polls,
                summary.appended,
                summary.duplicates
            );
        }
        Err(e) => error!("Monitor stopped on a store error. Err: {}", e),
    }
}
