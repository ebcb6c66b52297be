pub mod beatsaver;
pub mod mock;

use crate::error::Result;
use crate::models::{Batch, SubmissionResult};
use serde_json::Value;

/// PlaylistApi trait: the operations the loader and panel need.
/// Implementations: beatsaver::BeatSaverClient and mock::MockApi.
#[async_trait::async_trait]
pub trait PlaylistApi: Send + Sync {
    /// Fetch playlist metadata (`GET /playlists/id/{id}`) as JSON.
    async fn fetch_playlist(&self, playlist_id: &str) -> Result<Value>;

    /// Fetch an arbitrary JSON document, used for the playlist download URL.
    /// Relative URLs are resolved against the API base.
    async fn fetch_json(&self, url: &str) -> Result<Value>;

    /// Submit one batch. Non-2xx responses are returned as `ok: false`,
    /// only transport failures are errors.
    async fn submit_batch(
        &self,
        playlist_id: &str,
        batch: &Batch,
        token: Option<&str>,
    ) -> Result<SubmissionResult>;

    /// Return the API's name (for logging)
    fn name(&self) -> &str;
}
