use super::PlaylistApi;
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::models::{Batch, SubmissionResult};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// BeatSaver playlist API client.
/// The base URL comes from config, or BEATSAVER_API_BASE when set (useful for tests).
pub struct BeatSaverClient {
    client: Client,
    api_base: String,
}

impl BeatSaverClient {
    pub fn new(api_base: &str, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ApiError::Network(format!("building HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            &cfg.effective_api_base(),
            Duration::from_secs(cfg.request_timeout_secs),
            &cfg.user_agent,
        )
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn playlist_url(&self, playlist_id: &str) -> String {
        format!("{}/playlists/id/{}", self.api_base, urlencoding::encode(playlist_id))
    }

    /// Absolute URLs pass through; anything else is joined onto the API base.
    fn resolve_url(&self, url: &str) -> Result<String> {
        if let Ok(abs) = url::Url::parse(url) {
            return Ok(abs.to_string());
        }
        let base = url::Url::parse(&format!("{}/", self.api_base))
            .map_err(|e| ApiError::InvalidInput(format!("bad API base {}: {}", self.api_base, e)))?;
        base.join(url)
            .map(|u| u.to_string())
            .map_err(|e| ApiError::InvalidInput(format!("bad download URL {}: {}", url, e)))
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            warn!("GET {} failed: {}", url, status);
            return Err(ApiError::HttpStatus { status: status.as_u16(), url: url.to_string() });
        }
        let txt = resp.text().await?;
        serde_json::from_str(&txt).map_err(|_| ApiError::InvalidJson { url: url.to_string() })
    }
}

#[async_trait]
impl PlaylistApi for BeatSaverClient {
    fn name(&self) -> &str {
        "beatsaver"
    }

    async fn fetch_playlist(&self, playlist_id: &str) -> Result<Value> {
        let url = self.playlist_url(playlist_id);
        self.get_json(&url).await
    }

    async fn fetch_json(&self, url: &str) -> Result<Value> {
        let url = self.resolve_url(url)?;
        self.get_json(&url).await
    }

    async fn submit_batch(
        &self,
        playlist_id: &str,
        batch: &Batch,
        token: Option<&str>,
    ) -> Result<SubmissionResult> {
        let url = format!("{}/batch", self.playlist_url(playlist_id));
        let mut req = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .json(&batch.payload());
        if let Some(t) = token.map(str::trim).filter(|t| !t.is_empty()) {
            req = req.header(AUTHORIZATION, format!("Bearer {}", t));
        }
        debug!(
            "POST {} batch {} ({} hashes, {} keys)",
            url,
            batch.index,
            batch.hashes.len(),
            batch.keys.len()
        );
        let resp = req.send().await?;
        let status = resp.status();
        let txt = resp.text().await?;
        let data = serde_json::from_str::<Value>(&txt).unwrap_or(Value::String(txt));
        if !status.is_success() {
            warn!("POST {} returned {}", url, status);
        }
        Ok(SubmissionResult {
            status: status.as_u16(),
            ok: status.is_success(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> BeatSaverClient {
        BeatSaverClient::new("https://api.example.test/", Duration::from_secs(5), "test").unwrap()
    }

    #[test]
    fn trailing_slash_is_dropped() {
        assert_eq!(client().api_base(), "https://api.example.test");
    }

    #[test]
    fn relative_download_urls_join_the_base() {
        let c = client();
        assert_eq!(
            c.resolve_url("/playlists/id/7/download").unwrap(),
            "https://api.example.test/playlists/id/7/download"
        );
        assert_eq!(
            c.resolve_url("https://cdn.example.test/p.bplist").unwrap(),
            "https://cdn.example.test/p.bplist"
        );
    }

    #[test]
    fn playlist_ids_are_escaped() {
        assert_eq!(client().playlist_url("a b"), "https://api.example.test/playlists/id/a%20b");
    }
}
