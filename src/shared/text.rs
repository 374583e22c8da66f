use serde_json::Value;

pub fn clamp_u64(value: u64, min: u64, max: u64) -> u64 {
    value.min(max).max(min)
}

pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}

/// Formats a JSON number the way JavaScript's `String()` would: integral
/// floats print without a trailing `.0`.
pub fn format_number(value: &serde_json::Number) -> String {
    if let Some(int) = value.as_i64() {
        return int.to_string();
    }
    if let Some(uint) = value.as_u64() {
        return uint.to_string();
    }
    match value.as_f64() {
        // Rust's Display for f64 already prints the shortest form
        // ("4", "0.5"), unlike serde_json's serializer ("4.0").
        Some(float) => format!("{float}"),
        None => value.to_string(),
    }
}

/// Text form of a tool-result value for placeholder insertion and log
/// lines. Strings pass through, numbers print JS-style, everything else
/// is JSON.
pub fn format_result_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(text) => text.clone(),
        Value::Number(number) => format_number(number),
        Value::Bool(flag) => flag.to_string(),
        other => other.to_string(),
    }
}

/// Compact JSON preview capped at `max_chars`, for thinking-log lines.
pub fn json_preview(value: &Value, max_chars: usize) -> String {
    truncate_text(&value.to_string(), max_chars)
}
