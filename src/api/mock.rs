use super::PlaylistApi;
use crate::error::{ApiError, Result};
use crate::models::{Batch, SubmissionResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

/// In-memory API used in tests and dry runs. Serves canned documents and
/// records every submission it receives.
#[derive(Default)]
pub struct MockApi {
    playlists: HashMap<String, Value>,
    documents: HashMap<String, Value>,
    status: Mutex<u16>,
    delay: Option<Duration>,
    submissions: Mutex<Vec<(String, Batch, Option<String>)>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self { status: Mutex::new(200), ..Default::default() }
    }

    pub fn with_playlist(mut self, playlist_id: &str, meta: Value) -> Self {
        self.playlists.insert(playlist_id.to_string(), meta);
        self
    }

    pub fn with_document(mut self, url: &str, doc: Value) -> Self {
        self.documents.insert(url.to_string(), doc);
        self
    }

    /// Delay every submission, so tests can observe in-flight state.
    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Status code returned by subsequent submissions.
    pub fn set_status(&self, status: u16) {
        if let Ok(mut s) = self.status.lock() {
            *s = status;
        }
    }

    pub fn submissions(&self) -> Vec<(String, Batch, Option<String>)> {
        self.submissions.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PlaylistApi for MockApi {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_playlist(&self, playlist_id: &str) -> Result<Value> {
        info!("MockApi: fetch_playlist {}", playlist_id);
        self.playlists.get(playlist_id).cloned().ok_or_else(|| ApiError::HttpStatus {
            status: 404,
            url: format!("mock://playlists/id/{}", playlist_id),
        })
    }

    async fn fetch_json(&self, url: &str) -> Result<Value> {
        info!("MockApi: fetch_json {}", url);
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| ApiError::HttpStatus { status: 404, url: url.to_string() })
    }

    async fn submit_batch(
        &self,
        playlist_id: &str,
        batch: &Batch,
        token: Option<&str>,
    ) -> Result<SubmissionResult> {
        info!(
            "MockApi: submit_batch {} #{} -> {} hashes, {} keys",
            playlist_id,
            batch.index,
            batch.hashes.len(),
            batch.keys.len()
        );
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if let Ok(mut subs) = self.submissions.lock() {
            subs.push((playlist_id.to_string(), batch.clone(), token.map(String::from)));
        }
        let status = self.status.lock().map(|s| *s).unwrap_or(200);
        let ok = (200..300).contains(&status);
        let data = if ok { json!({ "ok": true }) } else { json!({ "error": "mock failure" }) };
        Ok(SubmissionResult { status, ok, data })
    }
}
