use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Deduplicated song identifiers pulled out of a playlist document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierSet {
    pub keys: Vec<String>,
    pub hashes: Vec<String>,
}

impl IdentifierSet {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.hashes.is_empty()
    }
}

/// One group of identifiers submitted together. `index` is the 0-based
/// position in the batch list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub index: usize,
    pub hashes: Vec<String>,
    pub keys: Vec<String>,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty() && self.keys.is_empty()
    }

    /// JSON body sent to the batch endpoint.
    pub fn payload(&self) -> BatchPayload<'_> {
        BatchPayload {
            hashes: &self.hashes,
            keys: &self.keys,
            ignore_unknown: true,
            in_playlist: true,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPayload<'a> {
    pub hashes: &'a [String],
    pub keys: &'a [String],
    pub ignore_unknown: bool,
    pub in_playlist: bool,
}

/// Outcome of one batch POST. `data` holds the JSON body, or the raw text
/// as a JSON string when the body did not parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub status: u16,
    pub ok: bool,
    pub data: Value,
}

/// Where a playlist's song list came from.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaylistSource {
    /// top-level `songs` array
    Inline(Vec<Value>),
    /// `playlist.songs`, only seen on downloaded documents
    Nested(Vec<Value>),
    /// metadata only points at a download URL
    Download(String),
}

/// Which document shape the song list was finally read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `songs` on the metadata itself
    Inline,
    /// top-level `songs` on the downloaded document
    Download,
    /// `playlist.songs` on the downloaded document
    DownloadNested,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SourceKind::Inline => "inline",
            SourceKind::Download => "download",
            SourceKind::DownloadNested => "download-nested",
        };
        f.write_str(s)
    }
}

/// Result of a successful load: everything needed to render and submit.
#[derive(Debug, Clone)]
pub struct LoadedPlaylist {
    pub playlist_id: String,
    pub source: SourceKind,
    pub song_count: usize,
    pub identifiers: IdentifierSet,
    pub batches: Vec<Batch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_api_field_names() {
        let b = Batch { index: 0, hashes: vec!["h".into()], keys: vec!["k".into()] };
        let v = serde_json::to_value(b.payload()).unwrap();
        assert_eq!(v["hashes"][0], "h");
        assert_eq!(v["keys"][0], "k");
        assert_eq!(v["ignoreUnknown"], true);
        assert_eq!(v["inPlaylist"], true);
    }

    #[test]
    fn source_kind_labels() {
        assert_eq!(SourceKind::Inline.to_string(), "inline");
        assert_eq!(SourceKind::DownloadNested.to_string(), "download-nested");
    }
}
