//! Canonical forms for the values used to join geometry onto table rows.

use serde_json::Value;

/// Parse a cell as a finite number. Blank cells are missing, not zero.
pub fn coerce_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// String form of a property used as a grouping key. `null` has no key.
pub fn key_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(number_string(n)),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn number_string(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    // 25013.0 prints as "25013"
    n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
}

/// Text of a property that carries a usable value: a non-empty string, a non-zero number or `true`.
pub fn present_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(number_string(n)),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// Strip a trailing `, <suffix>` clause (case-insensitive) and surrounding whitespace.
///
/// `normalize_name("Hampden County, Massachusetts", "Massachusetts")` is `"Hampden County"`.
pub fn normalize_name(raw: &str, suffix: &str) -> String {
    strip_suffix_clause(raw, suffix).trim().to_string()
}

fn strip_suffix_clause<'a>(raw: &'a str, suffix: &str) -> &'a str {
    if suffix.is_empty() {
        return raw;
    }
    let Some(comma) = raw.rfind(',') else {
        return raw;
    };
    let tail = raw[comma + 1..].trim_start();
    if tail.to_lowercase() == suffix.to_lowercase() {
        &raw[..comma]
    } else {
        raw
    }
}

/// Key under which a free-text area name is stored in the name index.
pub fn index_name(raw: &str, suffix: &str) -> String {
    normalize_name(raw, suffix).to_lowercase()
}

/// Key for looking up a town by name.
pub fn town_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}
