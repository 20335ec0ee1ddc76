//! String helpers shared by civic services.

/// Take at most `max_chars` characters from `s`.
///
/// Cuts on character boundaries, so multi-byte UTF-8 input (Devanagari,
/// emoji, accented text) is never split mid-character.
pub fn take_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// First `max_chars` characters of `s` followed by "...".
///
/// The marker is always appended, even when `s` is already short enough,
/// so callers can tell a truncated stand-in from a real summary.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    format!("{}...", take_chars(s, max_chars))
}

/// Sanitize a string for safe logging (redact credential patterns).
pub fn sanitize_for_log(s: &str) -> String {
    let patterns: &[(&str, &str)] = &[
        (r"(?i)(api[_-]?key|apikey)[=:]\s*\S{20,}", "$1=***REDACTED***"),
        (r"(?i)(token|secret)\s*[=:]\s*\S{10,}", "$1=***REDACTED***"),
        (r"(?i)bearer\s+\S{10,}", "Bearer ***REDACTED***"),
        (r"hf_[a-zA-Z0-9]{20,}", "***REDACTED_HF_TOKEN***"),
    ];

    let mut result = s.to_string();
    for (pattern, replacement) in patterns {
        if let Ok(re) = regex::Regex::new(pattern) {
            result = re.replace_all(&result, *replacement).to_string();
        }
    }
    result
}
