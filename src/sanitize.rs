use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::FALLBACK_FILE_NAME;

fn unsafe_chars() -> &'static Regex {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.\-]").expect("static regex compiles"))
}

/// Turns the last path segment of `url` into a safe, lowercase file name.
///
/// The segment is percent-decoded, every character outside `[A-Za-z0-9_.-]` becomes `_`,
/// surrounding `_` are trimmed. An empty result yields [`FALLBACK_FILE_NAME`].
pub fn sanitize_file_name(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    // Bytes that aren't UTF-8 after decoding turn into U+FFFD and then `_`.
    let decoded_bytes = urlencoding::decode_binary(segment.as_bytes());
    let decoded = String::from_utf8_lossy(&decoded_bytes);

    let safe = unsafe_chars().replace_all(&decoded, "_");
    let safe = safe.trim_matches('_');
    if safe.is_empty() {
        return FALLBACK_FILE_NAME.to_string();
    }
    safe.to_lowercase()
}

/// The name a downloaded document is stored under: the sanitized name, always ending in `.pdf`.
pub fn local_file_name(url: &Url) -> String {
    let mut name = sanitize_file_name(url);
    if !name.ends_with(".pdf") {
        name.push_str(".pdf");
    }
    name
}
