use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, time::sleep};

use crate::{
    analysis::{ListeningEvent, MetricSnapshot, SnapshotParams, TimeWindow},
    warning,
};

const EVENTS_FILE: &str = "events.jsonl";
const SNAPSHOTS_FILE: &str = "snapshots.json";
const LOCK_FILE: &str = ".writer.lock";

const STALE_LOCK_AFTER: Duration = Duration::from_secs(60);
const RETRY_BASE_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("track {track_id} played at {played_at} is already recorded")]
    DuplicateEvent {
        track_id: String,
        played_at: DateTime<Utc>,
    },
    #[error("store is locked by another writer (gave up after {attempts} attempts)")]
    WriteConflict { attempts: u32 },
    #[error("snapshot window {window} overlaps cached window {existing}")]
    OverlappingSnapshot {
        window: TimeWindow,
        existing: TimeWindow,
    },
    #[error("invalid account id {0:?}")]
    InvalidAccount(String),
    #[error("corrupt event log at line {line}: {source}")]
    CorruptLog {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Two plays of the same track closer than this are the same play.
    pub dedup_tolerance: TimeDelta,
    /// Lock attempts after the first one before giving up with `WriteConflict`.
    pub write_retries: u32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            dedup_tolerance: TimeDelta::seconds(2),
            write_retries: 5,
        }
    }
}

/// Point-in-time view of the events in a window.
///
/// Holds the log as it was when the query ran; later appends are not visible.
/// Iterating is lazy and can be restarted any number of times.
#[derive(Debug, Clone)]
pub struct EventRange {
    events: Arc<Vec<ListeningEvent>>,
    start: usize,
    end: usize,
}

impl EventRange {
    pub fn iter(&self) -> std::slice::Iter<'_, ListeningEvent> {
        self.as_slice().iter()
    }

    pub fn as_slice(&self) -> &[ListeningEvent] {
        &self.events[self.start..self.end]
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl<'a> IntoIterator for &'a EventRange {
    type Item = &'a ListeningEvent;
    type IntoIter = std::slice::Iter<'a, ListeningEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedSnapshot {
    params: SnapshotParams,
    snapshot: MetricSnapshot,
}

/// Append-only listening history of one account plus its snapshot cache.
///
/// Layout under `<root>/accounts/<account>/`:
/// - `events.jsonl` - one event per line, in arrival order
/// - `snapshots.json` - cached metric snapshots, non-overlapping windows
/// - `.writer.lock` - present while a writer holds the store
pub struct SnapshotStore {
    dir: PathBuf,
    account: String,
    options: StoreOptions,
    // sorted by played_at
    events: Arc<Vec<ListeningEvent>>,
    snapshots: Vec<CachedSnapshot>,
    log_len: u64,
}

impl SnapshotStore {
    pub async fn open(
        root: impl AsRef<Path>,
        account: &str,
        options: StoreOptions,
    ) -> Result<Self, StoreError> {
        validate_account(account)?;
        let dir = root.as_ref().join("accounts").join(account);
        tokio::fs::create_dir_all(&dir).await?;

        let mut store = Self {
            dir,
            account: account.to_string(),
            options,
            events: Arc::new(Vec::new()),
            snapshots: Vec::new(),
            log_len: 0,
        };
        store.reload().await?;
        Ok(store)
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn latest_played_at(&self) -> Option<DateTime<Utc>> {
        self.events.last().map(|e| e.played_at)
    }

    /// Appends a play to the log.
    ///
    /// Fails with `DuplicateEvent` when the same track is already recorded
    /// within the de-duplication tolerance of `played_at`. Cached snapshots
    /// the event can affect (every window ending after `played_at`) are
    /// dropped.
    pub async fn append(&mut self, event: ListeningEvent) -> Result<(), StoreError> {
        let _lock = self.lock().await?;
        self.sync_if_changed().await?;

        if let Some(existing) = self.find_duplicate(&event) {
            return Err(StoreError::DuplicateEvent {
                track_id: existing.track_id.clone(),
                played_at: existing.played_at,
            });
        }

        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.events_path())
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        self.log_len = file.metadata().await?.len();

        let played_at = event.played_at;
        let events = Arc::make_mut(&mut self.events);
        let idx = events.partition_point(|e| e.played_at <= played_at);
        events.insert(idx, event);

        let before = self.snapshots.len();
        self.snapshots.retain(|s| s.snapshot.window.end <= played_at);
        if self.snapshots.len() != before {
            self.persist_snapshots().await?;
        }

        Ok(())
    }

    /// Events with `played_at` in `window`, oldest first.
    pub fn query(&self, window: TimeWindow) -> EventRange {
        let start = self.events.partition_point(|e| e.played_at < window.start);
        let end = self
            .events
            .partition_point(|e| e.played_at < window.end)
            .max(start);

        EventRange {
            events: Arc::clone(&self.events),
            start,
            end,
        }
    }

    /// Artist ids played in `[from, until)`; `from = None` starts at the
    /// beginning of the history.
    pub fn artist_ids_between(
        &self,
        from: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> HashSet<String> {
        self.events
            .iter()
            .filter(|e| from.is_none_or(|from| e.played_at >= from) && e.played_at < until)
            .flat_map(|e| e.artist_ids.iter().cloned())
            .collect()
    }

    /// Deletes every event played before `before` and returns how many were
    /// removed. The whole snapshot cache is dropped because discovery counts
    /// depend on the pruned history.
    pub async fn prune(&mut self, before: DateTime<Utc>) -> Result<usize, StoreError> {
        let _lock = self.lock().await?;
        self.sync_if_changed().await?;

        let removed = self.events.partition_point(|e| e.played_at < before);
        if removed == 0 {
            return Ok(0);
        }

        let kept: Vec<ListeningEvent> = self.events[removed..].to_vec();
        let mut content = String::new();
        for event in &kept {
            content.push_str(&serde_json::to_string(event)?);
            content.push('\n');
        }

        let tmp = self.dir.join(format!("{EVENTS_FILE}.tmp"));
        tokio::fs::write(&tmp, &content).await?;
        tokio::fs::rename(&tmp, self.events_path()).await?;

        self.log_len = content.len() as u64;
        self.events = Arc::new(kept);
        self.snapshots.clear();
        self.persist_snapshots().await?;

        Ok(removed)
    }

    /// The cached snapshot of `window`, if it was computed with `params`.
    pub fn cached_snapshot(
        &self,
        window: &TimeWindow,
        params: &SnapshotParams,
    ) -> Option<&MetricSnapshot> {
        self.snapshots
            .iter()
            .find(|s| s.snapshot.window == *window && s.params == *params)
            .map(|s| &s.snapshot)
    }

    /// Every cached snapshot, oldest window first.
    pub fn snapshots(&self) -> Vec<&MetricSnapshot> {
        self.snapshots.iter().map(|s| &s.snapshot).collect()
    }

    /// Caches a snapshot computed with `params`. A snapshot for the same
    /// window is replaced whatever its params; one whose window overlaps a
    /// different cached window is rejected.
    pub async fn cache_snapshot(
        &mut self,
        snapshot: MetricSnapshot,
        params: SnapshotParams,
    ) -> Result<(), StoreError> {
        let _lock = self.lock().await?;
        self.sync_if_changed().await?;

        let window = snapshot.window;
        if let Some(existing) = self
            .snapshots
            .iter()
            .map(|s| s.snapshot.window)
            .find(|w| *w != window && w.overlaps(&window))
        {
            return Err(StoreError::OverlappingSnapshot { window, existing });
        }

        self.snapshots.retain(|s| s.snapshot.window != window);
        self.snapshots.push(CachedSnapshot { params, snapshot });
        self.snapshots.sort_by_key(|s| s.snapshot.window.start);
        self.persist_snapshots().await
    }

    pub async fn clear_snapshots(&mut self) -> Result<(), StoreError> {
        let _lock = self.lock().await?;
        self.snapshots.clear();
        self.persist_snapshots().await
    }

    fn find_duplicate(&self, event: &ListeningEvent) -> Option<&ListeningEvent> {
        let tolerance = self.options.dedup_tolerance;
        let from = event.played_at - tolerance;
        let until = event.played_at + tolerance;

        let start = self.events.partition_point(|e| e.played_at < from);
        self.events[start..]
            .iter()
            .take_while(|e| e.played_at <= until)
            .find(|e| e.track_id == event.track_id)
    }

    async fn lock(&self) -> Result<WriterLock, StoreError> {
        let mut attempt: u32 = 0;
        loop {
            if let Some(lock) = WriterLock::try_acquire(&self.dir).await? {
                return Ok(lock);
            }

            if attempt >= self.options.write_retries {
                return Err(StoreError::WriteConflict {
                    attempts: attempt + 1,
                });
            }

            sleep(RETRY_BASE_DELAY * 2u32.pow(attempt.min(8))).await;
            attempt += 1;
        }
    }

    /// Reloads from disk if another writer grew or rewrote the log.
    async fn sync_if_changed(&mut self) -> Result<(), StoreError> {
        let len = match tokio::fs::metadata(self.events_path()).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        if len != self.log_len {
            self.reload().await?;
        }
        Ok(())
    }

    async fn reload(&mut self) -> Result<(), StoreError> {
        let content = read_optional(&self.events_path()).await?.unwrap_or_default();

        let mut events = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let event: ListeningEvent = serde_json::from_str(line)
                .map_err(|source| StoreError::CorruptLog {
                    line: idx + 1,
                    source,
                })?;
            events.push(event);
        }
        events.sort_by_key(|e| e.played_at);

        // The cache can always be recomputed, so an unreadable one is dropped
        self.snapshots = match read_optional(&self.snapshots_path()).await? {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warning!("Discarding unreadable snapshot cache: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };
        self.events = Arc::new(events);
        self.log_len = content.len() as u64;
        Ok(())
    }

    async fn persist_snapshots(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.snapshots)?;
        tokio::fs::write(self.snapshots_path(), json).await?;
        Ok(())
    }

    fn events_path(&self) -> PathBuf {
        self.dir.join(EVENTS_FILE)
    }

    fn snapshots_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOTS_FILE)
    }
}

/// Exclusive lock file; released when dropped.
///
/// The file holds an owner token. A lock taken over by another writer after
/// being judged stale is left alone on drop.
struct WriterLock {
    path: PathBuf,
    owner: String,
}

impl WriterLock {
    async fn try_acquire(dir: &Path) -> Result<Option<Self>, StoreError> {
        let path = dir.join(LOCK_FILE);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                let owner = format!("{}-{:016x}", std::process::id(), rand::random::<u64>());
                file.write_all(owner.as_bytes()).await?;
                file.flush().await?;
                Ok(Some(Self { path, owner }))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if is_stale(&path).await {
                    let _ = tokio::fs::remove_file(&path).await;
                }
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        if std::fs::read_to_string(&self.path).is_ok_and(|owner| owner == self.owner) {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

async fn is_stale(path: &Path) -> bool {
    let Ok(meta) = tokio::fs::metadata(path).await else {
        return false;
    };
    meta.modified()
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK_AFTER)
}

async fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn validate_account(account: &str) -> Result<(), StoreError> {
    let valid = !account.is_empty()
        && account != "."
        && account != ".."
        && account
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidAccount(account.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_is_exclusive_and_released() {
        let dir = tempfile::tempdir().unwrap();

        let lock = WriterLock::try_acquire(dir.path()).await.unwrap().unwrap();
        assert!(WriterLock::try_acquire(dir.path()).await.unwrap().is_none());

        drop(lock);
        assert!(!dir.path().join(LOCK_FILE).exists());
        assert!(WriterLock::try_acquire(dir.path()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_drop_keeps_lock_taken_over_by_another_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE);

        let lock = WriterLock::try_acquire(dir.path()).await.unwrap().unwrap();

        // Our lock went stale and another writer recreated it
        std::fs::remove_file(&path).unwrap();
        std::fs::write(&path, "4242-00000000000000ff").unwrap();

        drop(lock);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "4242-00000000000000ff");
    }
}
