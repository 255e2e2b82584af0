//! Cancellable polling loop feeding the listening history store.
//!
//! The loop asks a [`PlaySource`] for new plays on every tick and appends
//! them to the [`SnapshotStore`]. It ends when the cancellation token fires
//! or the optional run duration elapses, whichever comes first. A poll that
//! is still in flight when cancellation arrives is abandoned; nothing it
//! returned is appended.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::{
    analysis::ListeningEvent,
    management::{SnapshotStore, StoreError},
    warning,
};

/// Anything that can report plays since its previous poll.
#[allow(async_fn_in_trait)]
pub trait PlaySource {
    async fn poll(&mut self) -> crate::Res<Vec<ListeningEvent>>;
}

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub interval: Duration,
    /// Stop after this long. `None` runs until cancelled.
    pub duration: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    DeadlineReached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSummary {
    pub polls: usize,
    pub appended: usize,
    pub duplicates: usize,
    pub stop: StopReason,
}

/// Polls `source` every `options.interval` until `cancel` fires or the
/// duration elapses. The first poll happens immediately.
///
/// Poll failures are reported and skipped. Duplicate plays are counted, any
/// other store error ends the loop.
pub async fn run<S: PlaySource>(
    store: &mut SnapshotStore,
    source: &mut S,
    options: &MonitorOptions,
    cancel: &CancellationToken,
) -> Result<MonitorSummary, StoreError> {
    let deadline = options.duration.map(|d| Instant::now() + d);
    let mut ticker = interval(options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut summary = MonitorSummary {
        polls: 0,
        appended: 0,
        duplicates: 0,
        stop: StopReason::Cancelled,
    };

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                summary.stop = StopReason::Cancelled;
                break;
            }
            _ = until(deadline) => {
                summary.stop = StopReason::DeadlineReached;
                break;
            }
            _ = ticker.tick() => {}
        }

        let polled = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                summary.stop = StopReason::Cancelled;
                break;
            }
            polled = source.poll() => polled,
        };
        summary.polls += 1;

        let events = match polled {
            Ok(events) => events,
            Err(e) => {
                warning!("Poll failed: {}", e);
                continue;
            }
        };

        for event in events {
            match store.append(event).await {
                Ok(()) => summary.appended += 1,
                Err(StoreError::DuplicateEvent { .. }) => summary.duplicates += 1,
                Err(e) => return Err(e),
            }
        }
    }

    Ok(summary)
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
