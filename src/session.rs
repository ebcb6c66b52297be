use tracing::{info, warn};

/// Look up `name` in a `Cookie:` header string ("a=1; b=2").
/// The value is percent-decoded; an undecodable value is returned as-is.
pub fn find_cookie(cookie_header: &str, name: &str) -> Option<String> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| decode(v))
}

/// Look up `name` in a Netscape cookies.txt jar, restricted to cookies whose
/// domain is `domain` or one of its subdomains. The last matching line wins,
/// as browsers append newer cookies.
pub fn find_cookie_in_jar(jar: &str, name: &str, domain: &str) -> Option<String> {
    let domain = domain.trim_start_matches('.').to_ascii_lowercase();
    jar.lines()
        .filter_map(|line| {
            // curl marks HttpOnly cookies with this prefix instead of a column
            let line = line.strip_prefix("#HttpOnly_").unwrap_or(line);
            if line.starts_with('#') || line.trim().is_empty() {
                return None;
            }
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 7 {
                return None;
            }
            let host = cols[0].trim_start_matches('.').to_ascii_lowercase();
            let host_ok = host == domain || host.ends_with(&format!(".{}", domain));
            if host_ok && cols[5] == name && !cols[6].trim().is_empty() {
                Some(decode(cols[6].trim()))
            } else {
                None
            }
        })
        .last()
}

fn decode(v: &str) -> String {
    urlencoding::decode(v).map(|s| s.into_owned()).unwrap_or_else(|_| v.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    /// Clipboard unavailable; the value was printed to stdout instead
    Printed,
}

/// Best-effort clipboard write. Falls back to printing the value so it can
/// still be copied by hand.
pub fn copy_to_clipboard(label: &str, value: &str) -> CopyOutcome {
    match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(value.to_string())) {
        Ok(()) => {
            info!("copied {} to clipboard", label);
            CopyOutcome::Copied
        }
        Err(e) => {
            warn!("clipboard error: {}", e);
            print_value(label, value);
            CopyOutcome::Printed
        }
    }
}

pub fn print_value(label: &str, value: &str) {
    println!("{} = {}", label, value);
}
