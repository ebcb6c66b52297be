//! Panel controller: owns the loaded batch list, per-batch submit tasks,
//! the append-only log and the event subscriptions of one panel.
//!
//! A host (the CLI, or anything else that renders) mounts the panel through
//! [`PanelHost`], which builds it once and hands the same instance back until
//! it is unmounted.

use crate::api::PlaylistApi;
use crate::error::{ApiError, Result};
use crate::loader::PlaylistLoader;
use crate::models::{Batch, LoadedPlaylist, SubmissionResult};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct LogLine {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl std::fmt::Display for LogLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lvl = match self.level {
            LogLevel::Info => "INFO",
            LogLevel::Error => "ERROR",
        };
        write!(f, "[{}] {} {}", self.at.format("%H:%M:%S"), lvl, self.message)
    }
}

#[derive(Debug, Clone)]
pub enum PanelEvent {
    Log(LogLine),
    Loaded { playlist_id: String, batches: usize },
    SubmissionFinished { task_id: Uuid, index: usize, ok: bool, status: Option<u16> },
}

/// A running batch submission. `id` is stable for the lifetime of the task.
pub struct BatchTask {
    pub id: Uuid,
    pub index: usize,
    handle: JoinHandle<Result<SubmissionResult>>,
}

impl BatchTask {
    pub async fn wait(self) -> Result<SubmissionResult> {
        match self.handle.await {
            Ok(res) => res,
            Err(e) => Err(ApiError::Network(format!("submission task {} aborted: {}", self.id, e))),
        }
    }
}

/// Per-batch outcomes of `submit_many`, paired with the 0-based batch index.
pub type BatchResults = Vec<(usize, Result<SubmissionResult>)>;

/// In-flight marks are keyed by load generation and batch index, so a
/// submission left over from an earlier load never blocks the current list.
type InFlightKey = (u64, usize);

/// Clears the in-flight mark for a batch when the submission finishes,
/// whatever the outcome.
struct InFlightGuard {
    panel: Arc<PanelController>,
    key: InFlightKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.panel.in_flight.lock() {
            set.remove(&self.key);
        }
    }
}

pub struct PanelController {
    api: Arc<dyn PlaylistApi>,
    loader: PlaylistLoader,
    state: RwLock<Option<LoadedPlaylist>>,
    // bumped under the state write lock on every successful load
    generation: AtomicU64,
    in_flight: Mutex<HashSet<InFlightKey>>,
    log: Mutex<Vec<LogLine>>,
    events: Mutex<Option<broadcast::Sender<PanelEvent>>>,
}

impl PanelController {
    pub fn new(api: Arc<dyn PlaylistApi>, batch_size: usize) -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            loader: PlaylistLoader::new(Arc::clone(&api), batch_size),
            api,
            state: RwLock::new(None),
            generation: AtomicU64::new(0),
            in_flight: Mutex::new(HashSet::new()),
            log: Mutex::new(Vec::new()),
            events: Mutex::new(Some(tx)),
        }
    }

    /// Subscribe to panel events. Returns `None` once the panel is torn down.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<PanelEvent>> {
        self.events.lock().ok()?.as_ref().map(|tx| tx.subscribe())
    }

    fn emit(&self, ev: PanelEvent) {
        if let Ok(guard) = self.events.lock() {
            if let Some(tx) = guard.as_ref() {
                // no receivers is fine
                let _ = tx.send(ev);
            }
        }
    }

    fn append_log(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => info!("{}", message),
            LogLevel::Error => error!("{}", message),
        }
        let line = LogLine { at: Utc::now(), level, message };
        if let Ok(mut log) = self.log.lock() {
            log.push(line.clone());
        }
        self.emit(PanelEvent::Log(line));
    }

    pub fn log_lines(&self) -> Vec<LogLine> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub async fn loaded(&self) -> Option<LoadedPlaylist> {
        self.state.read().await.clone()
    }

    /// Whether batch `index` of the currently loaded list is being submitted.
    pub fn is_in_flight(&self, index: usize) -> bool {
        let key = (self.generation.load(Ordering::SeqCst), index);
        self.in_flight.lock().map(|s| s.contains(&key)).unwrap_or(false)
    }

    /// Load a playlist and replace the batch list. On failure the previous
    /// list stays as it was.
    pub async fn load(&self, playlist_id: &str) -> Result<LoadedPlaylist> {
        self.append_log(LogLevel::Info, format!("Loading playlist {}", playlist_id.trim()));
        match self.loader.load(playlist_id).await {
            Ok(loaded) => {
                {
                    let mut state = self.state.write().await;
                    self.generation.fetch_add(1, Ordering::SeqCst);
                    *state = Some(loaded.clone());
                }
                self.append_log(
                    LogLevel::Info,
                    format!(
                        "Loaded {} songs: {} hashes, {} keys in {} batch(es)",
                        loaded.song_count,
                        loaded.identifiers.hashes.len(),
                        loaded.identifiers.keys.len(),
                        loaded.batches.len()
                    ),
                );
                self.emit(PanelEvent::Loaded {
                    playlist_id: loaded.playlist_id.clone(),
                    batches: loaded.batches.len(),
                });
                Ok(loaded)
            }
            Err(e) => {
                self.append_log(LogLevel::Error, format!("Load failed: {}", e));
                Err(e)
            }
        }
    }

    /// Start submitting batch `index` (0-based). The batch stays marked in
    /// flight until the returned task finishes; a second submit meanwhile is refused.
    pub async fn submit(
        self: &Arc<Self>,
        index: usize,
        token: Option<String>,
    ) -> Result<BatchTask> {
        let (generation, playlist_id, batch) = {
            let state = self.state.read().await;
            let loaded = state
                .as_ref()
                .ok_or_else(|| ApiError::InvalidInput("load a playlist first".into()))?;
            let batch: Batch = loaded.batches.get(index).cloned().ok_or_else(|| {
                ApiError::InvalidInput(format!(
                    "no batch {} (have {})",
                    index + 1,
                    loaded.batches.len()
                ))
            })?;
            // read while the state lock is held so it matches `loaded`
            let generation = self.generation.load(Ordering::SeqCst);
            (generation, loaded.playlist_id.clone(), batch)
        };

        let key = (generation, index);
        let inserted = self
            .in_flight
            .lock()
            .map(|mut s| s.insert(key))
            .map_err(|_| ApiError::InvalidInput("panel state poisoned".into()))?;
        if !inserted {
            return Err(ApiError::InvalidInput(format!(
                "batch {} is already being submitted",
                index + 1
            )));
        }
        let guard = InFlightGuard { panel: Arc::clone(self), key };

        let id = Uuid::new_v4();
        self.append_log(
            LogLevel::Info,
            format!(
                "Submitting batch {} ({} hashes, {} keys)",
                index + 1,
                batch.hashes.len(),
                batch.keys.len()
            ),
        );

        let panel = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let _guard = guard;
            let res = panel.api.submit_batch(&playlist_id, &batch, token.as_deref()).await;
            let (ok, status) = match &res {
                Ok(r) if r.ok => {
                    let msg = format!("Batch {} OK ({})", index + 1, r.status);
                    panel.append_log(LogLevel::Info, msg);
                    (true, Some(r.status))
                }
                Ok(r) => {
                    let msg = format!("Batch {} failed ({}): {}", index + 1, r.status, r.data);
                    panel.append_log(LogLevel::Error, msg);
                    (false, Some(r.status))
                }
                Err(e) => {
                    panel.append_log(LogLevel::Error, format!("Batch {} error: {}", index + 1, e));
                    (false, None)
                }
            };
            panel.emit(PanelEvent::SubmissionFinished { task_id: id, index, ok, status });
            res
        });

        Ok(BatchTask { id, index, handle })
    }

    /// Submit every loaded batch concurrently and wait for all of them.
    pub async fn submit_all(self: &Arc<Self>, token: Option<String>) -> Result<BatchResults> {
        let count = self
            .state
            .read()
            .await
            .as_ref()
            .map(|l| l.batches.len())
            .ok_or_else(|| ApiError::InvalidInput("load a playlist first".into()))?;
        self.submit_many(&(0..count).collect::<Vec<_>>(), token).await
    }

    /// Submit the given batches concurrently. A batch that cannot start
    /// (bad index, already in flight) reports its error without stopping the others.
    pub async fn submit_many(
        self: &Arc<Self>,
        indices: &[usize],
        token: Option<String>,
    ) -> Result<BatchResults> {
        let mut started = Vec::new();
        let mut results = Vec::new();
        for &i in indices {
            match self.submit(i, token.clone()).await {
                Ok(task) => started.push(task),
                Err(e) => results.push((i, Err(e))),
            }
        }
        let finished = futures::future::join_all(started.into_iter().map(|t| {
            let index = t.index;
            async move { (index, t.wait().await) }
        }))
        .await;
        results.extend(finished);
        results.sort_by_key(|(i, _)| *i);
        Ok(results)
    }

    pub async fn render_summary(&self) -> String {
        match self.state.read().await.as_ref() {
            Some(l) => format!(
                "Playlist {} ({}): {} songs, {} hashes, {} keys, {} batch(es)",
                l.playlist_id,
                l.source,
                l.song_count,
                l.identifiers.hashes.len(),
                l.identifiers.keys.len(),
                l.batches.len()
            ),
            None => "No playlist loaded".to_string(),
        }
    }

    /// One text card per batch; `preview` adds the JSON payload.
    pub async fn render_cards(&self, preview: bool) -> String {
        let state = self.state.read().await;
        let loaded = match state.as_ref() {
            Some(l) => l,
            None => return String::new(),
        };
        let total = loaded.batches.len();
        let mut out = String::new();
        for b in &loaded.batches {
            let busy = if self.is_in_flight(b.index) { " [submitting]" } else { "" };
            out.push_str(&format!(
                "Batch {}/{}: {} hashes, {} keys{}\n",
                b.index + 1,
                total,
                b.hashes.len(),
                b.keys.len(),
                busy
            ));
            if preview {
                let body = serde_json::to_string_pretty(&b.payload()).unwrap_or_default();
                for line in body.lines() {
                    out.push_str("    ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        out
    }

    /// Drop event subscriptions. Receivers see the channel close once drained.
    pub fn teardown(&self) {
        self.append_log(LogLevel::Info, "Panel closed".into());
        if let Ok(mut ev) = self.events.lock() {
            ev.take();
        }
    }
}

/// Builds the panel on first mount and keeps returning it until unmounted.
pub struct PanelHost {
    api: Arc<dyn PlaylistApi>,
    batch_size: usize,
    panel: Mutex<Option<Arc<PanelController>>>,
}

impl PanelHost {
    pub fn new(api: Arc<dyn PlaylistApi>, batch_size: usize) -> Self {
        Self { api, batch_size, panel: Mutex::new(None) }
    }

    pub fn mount(&self) -> Arc<PanelController> {
        let mut slot = match self.panel.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let panel = slot.get_or_insert_with(|| {
            Arc::new(PanelController::new(Arc::clone(&self.api), self.batch_size))
        });
        Arc::clone(panel)
    }

    pub fn unmount(&self) {
        let taken = match self.panel.lock() {
            Ok(mut g) => g.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(p) = taken {
            p.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockApi;
    use serde_json::json;
    use std::time::Duration;

    fn songs(n: usize) -> serde_json::Value {
        let list: Vec<_> = (0..n)
            .map(|i| json!({ "hash": format!("{:040x}", i), "key": format!("k{}", i) }))
            .collect();
        json!({ "songs": list })
    }

    #[test]
    fn mount_is_idempotent_until_unmount() {
        let host = PanelHost::new(Arc::new(MockApi::new()), 100);
        let a = host.mount();
        let b = host.mount();
        assert!(Arc::ptr_eq(&a, &b));
        host.unmount();
        assert!(a.subscribe().is_none());
        let c = host.mount();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_batches() {
        let api = MockApi::new()
            .with_playlist("1", songs(150))
            .with_playlist("2", json!({ "name": "x" }));
        let panel = PanelController::new(Arc::new(api), 100);
        panel.load("1").await.unwrap();
        let err = panel.load("2").await.unwrap_err();
        assert!(matches!(err, ApiError::MissingDownloadUrl { .. }));
        let loaded = panel.loaded().await.unwrap();
        assert_eq!(loaded.playlist_id, "1");
        assert_eq!(loaded.batches.len(), 2);
        assert!(panel
            .log_lines()
            .iter()
            .any(|l| l.level == LogLevel::Error && l.message.contains("No downloadURL")));
    }

    #[tokio::test]
    async fn submit_before_load_is_refused() {
        let panel = Arc::new(PanelController::new(Arc::new(MockApi::new()), 100));
        assert!(panel.submit(0, None).await.is_err());
    }

    #[tokio::test]
    async fn batch_in_flight_cannot_be_resubmitted() {
        let api = MockApi::new()
            .with_playlist("1", songs(10))
            .with_submit_delay(Duration::from_millis(200));
        let panel = Arc::new(PanelController::new(Arc::new(api), 100));
        panel.load("1").await.unwrap();
        let task = panel.submit(0, None).await.unwrap();
        assert!(panel.is_in_flight(0));
        assert!(panel.submit(0, None).await.is_err());
        let res = task.wait().await.unwrap();
        assert!(res.ok);
        assert!(!panel.is_in_flight(0));
        // re-enabled after completion
        assert!(panel.submit(0, None).await.unwrap().wait().await.is_ok());
    }

    #[tokio::test]
    async fn reload_starts_with_no_batches_in_flight() {
        let api = MockApi::new()
            .with_playlist("a", songs(3))
            .with_playlist("b", json!({ "songs": [{ "key": "b1" }] }))
            .with_submit_delay(Duration::from_millis(300));
        let panel = Arc::new(PanelController::new(Arc::new(api), 100));
        panel.load("a").await.unwrap();
        let old = panel.submit(0, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        panel.load("b").await.unwrap();
        assert!(!panel.is_in_flight(0));
        assert!(!panel.render_cards(false).await.contains("[submitting]"));
        let new = panel.submit(0, None).await.unwrap();
        assert!(panel.is_in_flight(0));

        // the older submission finishing must not clear the new mark
        assert!(old.wait().await.unwrap().ok);
        assert!(panel.is_in_flight(0));
        assert!(new.wait().await.unwrap().ok);
        assert!(!panel.is_in_flight(0));
    }

    #[tokio::test]
    async fn failed_submission_is_logged_and_not_an_error() {
        let api = Arc::new(MockApi::new().with_playlist("1", songs(250)));
        api.set_status(400);
        let panel = Arc::new(PanelController::new(api.clone(), 100));
        panel.load("1").await.unwrap();
        let results = panel.submit_all(Some("tok".into())).await.unwrap();
        assert_eq!(results.len(), 3);
        for (_, r) in &results {
            let r = r.as_ref().unwrap();
            assert!(!r.ok);
            assert_eq!(r.status, 400);
        }
        assert_eq!(api.submissions().len(), 3);
        assert!(api.submissions().iter().all(|(_, _, t)| t.as_deref() == Some("tok")));
        let failed_lines =
            panel.log_lines().iter().filter(|l| l.message.contains("failed (400)")).count();
        assert_eq!(failed_lines, 3);
    }

    #[tokio::test]
    async fn subscribers_see_events_and_closure() {
        let api = MockApi::new().with_playlist("1", songs(1));
        let panel = PanelController::new(Arc::new(api), 100);
        let mut rx = panel.subscribe().unwrap();
        panel.load("1").await.unwrap();
        panel.teardown();
        let mut saw_loaded = false;
        loop {
            match rx.recv().await {
                Ok(PanelEvent::Loaded { batches, .. }) => {
                    assert_eq!(batches, 1);
                    saw_loaded = true;
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(_)) => {}
            }
        }
        assert!(saw_loaded);
    }

    #[tokio::test]
    async fn cards_render_with_preview() {
        let api = MockApi::new().with_playlist("1", songs(2));
        let panel = PanelController::new(Arc::new(api), 100);
        assert_eq!(panel.render_summary().await, "No playlist loaded");
        panel.load("1").await.unwrap();
        let cards = panel.render_cards(true).await;
        assert!(cards.starts_with("Batch 1/1: 2 hashes, 2 keys"));
        assert!(cards.contains("\"ignoreUnknown\": true"));
        assert!(panel.render_summary().await.contains("2 songs"));
    }
}
