//! Process-wide registry of directory watches.
//!
//! Constructed once at the composition root and shared via `Arc`.
//! Each started watch gets its own notify watcher, an event channel,
//! and a debounce loop task; the registry tracks the lot and exposes
//! the start/stop/list/status lifecycle to the command layer.
//!
//! Scans for a given watch are serialized by construction: the
//! debounce loop runs each scan inline before selecting on events
//! again, so a new scan cannot start while the previous one is still
//! running. Events arriving mid-scan simply re-arm the deadline
//! afterwards.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use atelier_client::StatusPoller;
use atelier_core::error::CoreError;
use atelier_pipeline::{process_files, BatchOptions, FileJob, HistoryStore};

use crate::entry::{StartWatch, WatchEntry};
use crate::scanner::collect_changed_files;

/// Per-registry defaults applied when a watch does not override them.
#[derive(Debug, Clone)]
pub struct WatchDefaults {
    /// Quiet period before a scan fires.
    pub debounce: Duration,
    /// Pipeline options for scan dispatch.
    pub batch: BatchOptions,
}

impl Default for WatchDefaults {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            batch: BatchOptions::default(),
        }
    }
}

/// Bookkeeping for one registered watch.
struct WatchSlot {
    entry: WatchEntry,
    /// Child of the registry's master token; fired on stop.
    cancel: CancellationToken,
    task: Option<tokio::task::JoinHandle<()>>,
}

/// Owns every watch in the process.
pub struct WatchRegistry {
    poller: Arc<StatusPoller>,
    history: Arc<HistoryStore>,
    defaults: WatchDefaults,
    watches: RwLock<HashMap<Uuid, WatchSlot>>,
    /// Master cancellation token, fired during shutdown.
    shutdown: CancellationToken,
}

impl WatchRegistry {
    pub fn new(
        poller: Arc<StatusPoller>,
        history: Arc<HistoryStore>,
        defaults: WatchDefaults,
    ) -> Self {
        Self {
            poller,
            history,
            defaults,
            watches: RwLock::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Start watching a directory.
    ///
    /// Rejects paths that are not existing directories, and paths that
    /// already have an active watch (stopping the old watch first is
    /// the intended way to change a watch's parameters).
    pub async fn start(self: &Arc<Self>, params: StartWatch) -> Result<WatchEntry, CoreError> {
        if !params.path.is_dir() {
            return Err(CoreError::Configuration(format!(
                "watch path is not a directory: {}",
                params.path.display()
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = spawn_fs_watcher(&params.path, params.recursive, tx)?;

        self.register(params, rx, Some(watcher)).await
    }

    /// Soft-deactivate a watch. The entry stays queryable; only the
    /// observation stops. Stopping an already-stopped watch is a
    /// no-op.
    pub async fn stop(&self, id: Uuid) -> Result<WatchEntry, CoreError> {
        let mut watches = self.watches.write().await;
        let slot = watches.get_mut(&id).ok_or(CoreError::NotFound {
            entity: "watch",
            id: id.to_string(),
        })?;

        if slot.entry.active {
            slot.entry.active = false;
            slot.cancel.cancel();
            tracing::info!(watch_id = %id, path = %slot.entry.path.display(), "Watch stopped");
        }
        Ok(slot.entry.clone())
    }

    /// All entries, optionally filtered to active ones, oldest first.
    pub async fn list(&self, active_only: bool) -> Vec<WatchEntry> {
        let watches = self.watches.read().await;
        let mut entries: Vec<WatchEntry> = watches
            .values()
            .map(|slot| slot.entry.clone())
            .filter(|entry| entry.active || !active_only)
            .collect();
        entries.sort_by_key(|entry| entry.created_at);
        entries
    }

    /// One entry by id, including its `last_scan_time`.
    pub async fn status(&self, id: Uuid) -> Result<WatchEntry, CoreError> {
        self.watches
            .read()
            .await
            .get(&id)
            .map(|slot| slot.entry.clone())
            .ok_or(CoreError::NotFound {
                entity: "watch",
                id: id.to_string(),
            })
    }

    /// Number of watches still observing their directory.
    pub async fn active_count(&self) -> usize {
        self.watches
            .read()
            .await
            .values()
            .filter(|slot| slot.entry.active)
            .count()
    }

    /// Stop every watch and wait briefly for the loop tasks to exit.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down watch registry");
        self.shutdown.cancel();

        // Collect handles first: a loop task mid-scan may need the
        // registry lock to exit cleanly.
        let mut handles = Vec::new();
        {
            let mut watches = self.watches.write().await;
            for slot in watches.values_mut() {
                slot.entry.active = false;
                slot.cancel.cancel();
                if let Some(task) = slot.task.take() {
                    handles.push(task);
                }
            }
        }
        for task in handles {
            let _ = tokio::time::timeout(Duration::from_secs(5), task).await;
        }
    }

    // ---- private helpers ----

    /// Validate, record, and spawn the debounce loop for a new watch.
    ///
    /// Split from [`start`](Self::start) so tests can inject a raw
    /// event channel instead of a live notify watcher.
    async fn register(
        self: &Arc<Self>,
        params: StartWatch,
        events: mpsc::UnboundedReceiver<()>,
        watcher: Option<RecommendedWatcher>,
    ) -> Result<WatchEntry, CoreError> {
        let mut watches = self.watches.write().await;

        if let Some(existing) = watches
            .values()
            .find(|slot| slot.entry.active && slot.entry.path == params.path)
        {
            return Err(CoreError::Conflict(format!(
                "already watching {} (watch {})",
                params.path.display(),
                existing.entry.id
            )));
        }

        let debounce = params.debounce.unwrap_or(self.defaults.debounce);
        let entry = WatchEntry {
            id: Uuid::now_v7(),
            path: params.path,
            operation: params.operation,
            params: params.params,
            output_folder: params.output_folder,
            active: true,
            recursive: params.recursive,
            debounce_ms: debounce.as_millis() as u64,
            last_scan_time: None,
            created_at: Utc::now(),
        };

        let cancel = self.shutdown.child_token();
        let task = tokio::spawn(run_watch_loop(
            Arc::clone(self),
            entry.id,
            events,
            cancel.clone(),
            debounce,
            watcher,
        ));

        tracing::info!(
            watch_id = %entry.id,
            path = %entry.path.display(),
            operation = %entry.operation,
            debounce_ms = entry.debounce_ms,
            "Watch started",
        );

        watches.insert(
            entry.id,
            WatchSlot {
                entry: entry.clone(),
                cancel,
                task: Some(task),
            },
        );
        Ok(entry)
    }

    /// Run one scan for `id`: enumerate changed files, dispatch them
    /// through the pipeline, then advance `last_scan_time`.
    async fn run_scan(&self, id: Uuid, cancel: &CancellationToken) {
        let snapshot = {
            let watches = self.watches.read().await;
            match watches.get(&id) {
                Some(slot) if slot.entry.active => slot.entry.clone(),
                _ => return,
            }
        };

        let scan_started = Utc::now();
        let since = snapshot.last_scan_time.map(std::time::SystemTime::from);

        let path = snapshot.path.clone();
        let recursive = snapshot.recursive;
        let listing =
            tokio::task::spawn_blocking(move || collect_changed_files(&path, since, recursive))
                .await;

        let files = match listing {
            Ok(Ok(files)) => files,
            Ok(Err(err)) => {
                tracing::warn!(watch_id = %id, error = %err, "Scan enumeration failed");
                return;
            }
            Err(err) => {
                tracing::error!(watch_id = %id, error = %err, "Scan task panicked");
                return;
            }
        };

        if !files.is_empty() {
            tracing::info!(watch_id = %id, count = files.len(), "Scan dispatching files");

            let jobs: Vec<FileJob> = files
                .into_iter()
                .map(|input| FileJob {
                    input,
                    operation: snapshot.operation.clone(),
                    params: snapshot.params.clone(),
                    output_folder: snapshot.output_folder.clone(),
                })
                .collect();

            match process_files(
                jobs,
                &self.defaults.batch,
                &self.poller,
                &self.history,
                None,
                cancel,
            )
            .await
            {
                Ok(report) => {
                    tracing::info!(
                        watch_id = %id,
                        succeeded = report.succeeded,
                        failed = report.failed,
                        "Scan finished",
                    );
                }
                Err(CoreError::Cancelled) => return,
                Err(err) => {
                    // Leave last_scan_time untouched so these files
                    // are retried on the next scan.
                    tracing::error!(watch_id = %id, error = %err, "Scan dispatch failed");
                    return;
                }
            }
        }

        let mut watches = self.watches.write().await;
        if let Some(slot) = watches.get_mut(&id) {
            slot.entry.last_scan_time = Some(scan_started);
        }
    }
}

/// Wire a notify watcher that forwards relevant change events into
/// the debounce channel.
fn spawn_fs_watcher(
    path: &std::path::Path,
    recursive: bool,
    tx: mpsc::UnboundedSender<()>,
) -> Result<RecommendedWatcher, CoreError> {
    let watched = path.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                if matches!(
                    event.kind,
                    notify::EventKind::Create(_) | notify::EventKind::Modify(_)
                ) {
                    let _ = tx.send(());
                }
            }
            Err(err) => {
                tracing::warn!(path = %watched.display(), error = %err, "Watcher error");
            }
        }
    })
    .map_err(|e| CoreError::Configuration(format!("failed to create watcher: {e}")))?;

    let mode = if recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };
    watcher
        .watch(path, mode)
        .map_err(|e| CoreError::Configuration(format!("failed to watch path: {e}")))?;

    Ok(watcher)
}

/// What the debounce loop should do next.
enum Step {
    Exit,
    Event(Option<()>),
    Scan,
}

/// Per-watch debounce loop.
///
/// Every raw event re-arms the deadline to the full debounce period; a
/// scan fires only once the deadline elapses with no further event.
/// The notify watcher is owned here so it lives exactly as long as the
/// loop.
async fn run_watch_loop(
    registry: Arc<WatchRegistry>,
    id: Uuid,
    mut events: mpsc::UnboundedReceiver<()>,
    cancel: CancellationToken,
    debounce: Duration,
    _watcher: Option<RecommendedWatcher>,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        let step = match deadline {
            Some(at) => tokio::select! {
                _ = cancel.cancelled() => Step::Exit,
                event = events.recv() => Step::Event(event),
                _ = tokio::time::sleep_until(at) => Step::Scan,
            },
            None => tokio::select! {
                _ = cancel.cancelled() => Step::Exit,
                event = events.recv() => Step::Event(event),
            },
        };

        match step {
            Step::Exit => break,
            // Event source closed; nothing further can arrive.
            Step::Event(None) => break,
            Step::Event(Some(())) => {
                deadline = Some(Instant::now() + debounce);
            }
            Step::Scan => {
                deadline = None;
                registry.run_scan(id, &cancel).await;
            }
        }
    }

    tracing::debug!(watch_id = %id, "Watch loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    use async_trait::async_trait;
    use atelier_client::{
        ClientError, GenerationClient, JobHandle, JobRequest, PollOptions, RemoteStatus,
    };
    use atelier_throttle::{RateLimiter, RetryOptions};

    /// Completes every job on the first status check.
    struct InstantClient;

    #[async_trait]
    impl GenerationClient for InstantClient {
        async fn submit(
            &self,
            _request: &JobRequest,
            _cancel: &CancellationToken,
            _timeout: Option<Duration>,
        ) -> Result<JobHandle, ClientError> {
            Ok(JobHandle::new("job-1"))
        }

        async fn get_status(
            &self,
            _handle: &JobHandle,
            _cancel: &CancellationToken,
            _timeout: Option<Duration>,
        ) -> Result<RemoteStatus, ClientError> {
            Ok(RemoteStatus::Completed(serde_json::json!({"ok": true})))
        }
    }

    fn registry() -> (Arc<WatchRegistry>, Arc<HistoryStore>) {
        let history = Arc::new(HistoryStore::new());
        let poller = Arc::new(StatusPoller::new(
            Arc::new(InstantClient),
            Arc::new(RateLimiter::new(1_000.0, 1_000.0).unwrap()),
            RetryOptions::default(),
        ));
        let defaults = WatchDefaults {
            debounce: Duration::from_millis(200),
            batch: BatchOptions {
                poll: PollOptions {
                    initial_interval: Duration::from_millis(10),
                    ..PollOptions::default()
                },
                ..BatchOptions::default()
            },
        };
        let registry = Arc::new(WatchRegistry::new(poller, history.clone(), defaults));
        (registry, history)
    }

    /// Under the paused clock the sleeps are virtual; the generous
    /// iteration count covers the real-time scan task finishing.
    async fn wait_for(history: &HistoryStore, count: usize) {
        for _ in 0..2_000 {
            if history.len().await >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!(
            "history never reached {count} records, has {}",
            history.len().await
        );
    }

    #[tokio::test]
    async fn start_rejects_missing_directories() {
        let (registry, _) = registry();
        let result = registry
            .start(StartWatch::new("/definitely/not/a/real/dir", "upscale"))
            .await;
        assert_matches!(result, Err(CoreError::Configuration(_)));
    }

    #[tokio::test]
    async fn duplicate_active_path_is_a_conflict() {
        let (registry, _) = registry();
        let dir = tempfile::tempdir().unwrap();

        registry
            .start(StartWatch::new(dir.path(), "upscale"))
            .await
            .unwrap();
        let second = registry.start(StartWatch::new(dir.path(), "restyle")).await;

        assert_matches!(second, Err(CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn stopped_path_can_be_watched_again() {
        let (registry, _) = registry();
        let dir = tempfile::tempdir().unwrap();

        let first = registry
            .start(StartWatch::new(dir.path(), "upscale"))
            .await
            .unwrap();
        registry.stop(first.id).await.unwrap();

        let second = registry.start(StartWatch::new(dir.path(), "upscale")).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn stop_soft_deletes_and_list_filters() {
        let (registry, _) = registry();
        let dir = tempfile::tempdir().unwrap();

        let entry = registry
            .start(StartWatch::new(dir.path(), "upscale"))
            .await
            .unwrap();
        assert_eq!(registry.active_count().await, 1);

        let stopped = registry.stop(entry.id).await.unwrap();
        assert!(!stopped.active);

        // Still queryable, excluded from the active view.
        assert_eq!(registry.list(false).await.len(), 1);
        assert!(registry.list(true).await.is_empty());
        assert_eq!(registry.active_count().await, 0);

        // Stopping again is a no-op.
        assert!(registry.stop(entry.id).await.is_ok());
    }

    #[tokio::test]
    async fn status_of_unknown_watch_is_not_found() {
        let (registry, _) = registry();
        let result = registry.status(Uuid::now_v7()).await;
        assert_matches!(result, Err(CoreError::NotFound { entity: "watch", .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_events_produces_exactly_one_scan() {
        let (registry, history) = registry();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"a").unwrap();
        std::fs::write(dir.path().join("b.png"), b"b").unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        let entry = registry
            .register(StartWatch::new(dir.path(), "upscale"), rx, None)
            .await
            .unwrap();

        // Five rapid events, each well inside the 200ms quiet period.
        for _ in 0..5 {
            tx.send(()).unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // Let the deadline elapse and the scan run.
        tokio::time::sleep(Duration::from_millis(300)).await;
        wait_for(&history, 2).await;

        // One scan over two files: exactly two records, not ten.
        assert_eq!(history.len().await, 2);

        let status = registry.status(entry.id).await.unwrap();
        assert!(status.last_scan_time.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn second_scan_only_sees_newer_files() {
        let (registry, history) = registry();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"a").unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        registry
            .register(StartWatch::new(dir.path(), "upscale"), rx, None)
            .await
            .unwrap();

        tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        wait_for(&history, 1).await;
        assert_eq!(history.len().await, 1);

        // No new files: another burst scans nothing further. The
        // pre-existing file's mtime is older than last_scan_time.
        tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        tokio::task::yield_now().await;
        assert_eq!(history.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_watch_scans_nothing() {
        let (registry, history) = registry();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"a").unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        let entry = registry
            .register(StartWatch::new(dir.path(), "upscale"), rx, None)
            .await
            .unwrap();
        registry.stop(entry.id).await.unwrap();

        let _ = tx.send(());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(history.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_deactivates_everything() {
        let (registry, _) = registry();
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();

        registry
            .start(StartWatch::new(dir_a.path(), "upscale"))
            .await
            .unwrap();
        registry
            .start(StartWatch::new(dir_b.path(), "restyle"))
            .await
            .unwrap();

        registry.shutdown().await;
        assert_eq!(registry.active_count().await, 0);
        assert_eq!(registry.list(false).await.len(), 2);
    }
}
