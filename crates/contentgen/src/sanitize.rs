//! Helpers for keeping log lines and span fields short and free of secrets.
//!
//! Signed URLs carry their signature in the query string and generated
//! images may arrive as multi-megabyte data URIs; neither belongs in a log.

/// Drops the query string (and fragment) of a URL.
///
/// - `https://cdn/x.png?expires=1&signature=abc` → `https://cdn/x.png`
/// - `data:image/png;base64,....` → `data:image/png;base64,<N bytes>`
pub fn redact_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("data:") {
        return match rest.split_once(',') {
            Some((header, payload)) => format!("data:{},<{} bytes>", header, payload.len()),
            None => "data:<invalid>".to_string(),
        };
    }
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].to_string()
}

/// Truncates to at most `max_chars` characters, marking the cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}…", &text[..byte_index]),
        None => text.to_string(),
    }
}
