/// Characters stripped from free-text input before it reaches the stores.
const STRIPPED_MARKUP: [char; 5] = ['<', '>', '"', '\'', '`'];

const SUSPICIOUS_SUBSTRINGS: [&str; 11] = [
    "<script",
    "javascript:",
    "vbscript:",
    "data:text/html",
    "' or '1'='1",
    "\" or \"1\"=\"1",
    "union select",
    "drop table",
    "; --",
    "/*",
    "../",
];

/// Removes control characters and markup characters, trims surrounding
/// whitespace, and caps the result at `max_len` characters.
pub fn sanitize_input(raw: &str, max_len: usize) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control() && !STRIPPED_MARKUP.contains(c))
        .collect();

    cleaned.trim().chars().take(max_len).collect()
}

/// Flags script-like or injection-like content without altering it.
pub fn detect_suspicious_input(raw: &str) -> bool {
    let lowered = raw.to_lowercase();
    SUSPICIOUS_SUBSTRINGS
        .iter()
        .any(|pattern| lowered.contains(pattern))
        || has_inline_event_handler(&lowered)
}

/// Matches an attribute-like `on<letters>=` such as ` onerror=` or ` onclick =`.
fn has_inline_event_handler(lowered: &str) -> bool {
    let bytes = lowered.as_bytes();
    let mut start = 0;
    while let Some(pos) = lowered[start..].find("on") {
        let at = start + pos;
        let preceded_by_separator =
            at > 0 && matches!(bytes[at - 1], b' ' | b'\t' | b'/' | b'"' | b'\'');
        let mut cursor = at + 2;
        while cursor < bytes.len() && bytes[cursor].is_ascii_alphabetic() {
            cursor += 1;
        }
        let has_name = cursor > at + 2;
        while cursor < bytes.len() && bytes[cursor] == b' ' {
            cursor += 1;
        }
        if preceded_by_separator && has_name && cursor < bytes.len() && bytes[cursor] == b'=' {
            return true;
        }
        start = at + 2;
    }
    false
}
