use crate::api::PlaylistApi;
use crate::batch::build_batches;
use crate::error::{ApiError, Result};
use crate::models::{LoadedPlaylist, PlaylistSource, SourceKind};
use crate::normalize::normalize_songs;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Metadata fields that may carry the playlist download URL, in preference order.
/// Dotted names are nested lookups.
const DOWNLOAD_FIELDS: [&str; 4] =
    ["downloadURL", "playlistDownloadURL", "downloadUrl", "playlist.downloadURL"];

fn lookup<'a>(doc: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted.split('.').try_fold(doc, |v, part| v.get(part))
}

/// Classify a metadata document: inline songs, or a download reference.
/// `None` means neither shape was recognized.
pub fn detect_meta_source(meta: &Value) -> Option<PlaylistSource> {
    if let Some(songs) = meta.get("songs").and_then(Value::as_array) {
        return Some(PlaylistSource::Inline(songs.clone()));
    }
    DOWNLOAD_FIELDS.iter().find_map(|field| {
        lookup(meta, field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| PlaylistSource::Download(s.to_string()))
    })
}

/// Classify a downloaded playlist document: top-level `songs` or `playlist.songs`.
pub fn detect_download_source(doc: &Value) -> Option<PlaylistSource> {
    if let Some(songs) = doc.get("songs").and_then(Value::as_array) {
        return Some(PlaylistSource::Inline(songs.clone()));
    }
    lookup(doc, "playlist.songs")
        .and_then(Value::as_array)
        .map(|songs| PlaylistSource::Nested(songs.clone()))
}

/// Turns a playlist id into submission-ready batches.
pub struct PlaylistLoader {
    api: Arc<dyn PlaylistApi>,
    batch_size: usize,
}

impl PlaylistLoader {
    pub fn new(api: Arc<dyn PlaylistApi>, batch_size: usize) -> Self {
        Self { api, batch_size }
    }

    pub async fn load(&self, playlist_id: &str) -> Result<LoadedPlaylist> {
        let playlist_id = playlist_id.trim();
        if playlist_id.is_empty() {
            return Err(ApiError::InvalidInput("enter a playlist id".into()));
        }

        let meta = self.api.fetch_playlist(playlist_id).await?;
        let (source, songs) = match detect_meta_source(&meta) {
            Some(PlaylistSource::Inline(songs)) => (SourceKind::Inline, songs),
            Some(PlaylistSource::Download(url)) => {
                debug!("playlist {} songs not inline, downloading {}", playlist_id, url);
                let doc = self.api.fetch_json(&url).await?;
                match detect_download_source(&doc) {
                    Some(PlaylistSource::Inline(songs)) => (SourceKind::Download, songs),
                    Some(PlaylistSource::Nested(songs)) => (SourceKind::DownloadNested, songs),
                    _ => return Err(ApiError::UnrecognizedShape { url }),
                }
            }
            _ => {
                return Err(ApiError::MissingDownloadUrl { playlist_id: playlist_id.to_string() });
            }
        };

        if songs.is_empty() {
            return Err(ApiError::NoSongs { playlist_id: playlist_id.to_string() });
        }

        let identifiers = normalize_songs(&songs);
        let batches = build_batches(&identifiers, self.batch_size)?;
        info!(
            "loaded playlist {} via {} from {}: {} songs, {} hashes, {} keys, {} batches",
            playlist_id,
            source,
            self.api.name(),
            songs.len(),
            identifiers.hashes.len(),
            identifiers.keys.len(),
            batches.len()
        );

        Ok(LoadedPlaylist {
            playlist_id: playlist_id.to_string(),
            source,
            song_count: songs.len(),
            identifiers,
            batches,
        })
    }
}
