use crate::models::IdentifierSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

static HASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{40}$").expect("static hash regex"));

const KEY_FIELDS: [&str; 2] = ["key", "id"];
const HASH_FIELDS: [&str; 2] = ["hash", "sha1"];

/// First non-empty trimmed value among `fields`. Numbers are stringified so
/// numeric ids still count.
fn first_field(song: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|f| {
        let s = match song.get(*f)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    })
}

pub fn is_valid_hash(candidate: &str) -> bool {
    HASH_RE.is_match(candidate)
}

/// Extract deduplicated keys and hashes from an untrusted song list.
///
/// Records without a usable key or hash simply contribute nothing; this
/// never fails. Order is first occurrence.
pub fn normalize_songs(songs: &[Value]) -> IdentifierSet {
    let mut out = IdentifierSet::default();
    let mut seen_keys: HashSet<String> = HashSet::new();
    let mut seen_hashes: HashSet<String> = HashSet::new();

    for song in songs.iter().filter(|s| s.is_object()) {
        if let Some(key) = first_field(song, &KEY_FIELDS) {
            if seen_keys.insert(key.clone()) {
                out.keys.push(key);
            }
        }
        if let Some(hash) = first_field(song, &HASH_FIELDS) {
            let hash = hash.to_ascii_lowercase();
            if is_valid_hash(&hash) && seen_hashes.insert(hash.clone()) {
                out.hashes.push(hash);
            }
        }
    }

    tracing::debug!(
        keys = out.keys.len(),
        hashes = out.hashes.len(),
        songs = songs.len(),
        "normalized song list"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const H: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn hash_case_duplicates_collapse() {
        let upper = H.to_ascii_uppercase();
        let songs = vec![json!({ "hash": upper }), json!({ "hash": H })];
        let ids = normalize_songs(&songs);
        assert_eq!(ids.hashes, vec![H.to_string()]);
        assert!(ids.keys.is_empty());
    }

    #[test]
    fn aliases_and_first_non_empty_wins() {
        let songs = vec![
            json!({ "key": "  ", "id": "1a2b", "hash": "", "sha1": H }),
            json!({ "id": 42 }),
            json!({ "key": "1a2b" }),
        ];
        let ids = normalize_songs(&songs);
        assert_eq!(ids.keys, vec!["1a2b".to_string(), "42".to_string()]);
        assert_eq!(ids.hashes, vec![H.to_string()]);
    }

    #[test]
    fn malformed_records_are_dropped() {
        let songs = vec![
            json!("not an object"),
            json!(null),
            json!({ "hash": "xyz" }),
            json!({ "hash": format!("{}0", H) }),
            json!({ "key": ["array"] }),
        ];
        let ids = normalize_songs(&songs);
        assert!(ids.is_empty());
    }

    #[test]
    fn hashes_are_trimmed_before_validation() {
        let songs = vec![json!({ "hash": format!("  {}\n", H) })];
        assert_eq!(normalize_songs(&songs).hashes, vec![H.to_string()]);
    }
}
