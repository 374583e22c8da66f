use serde_json::Value;

/// Walks `root` along `segments`, treating numeric segments as array
/// indices. Returns `None` as soon as a segment is absent; `Value::Null`
/// is a present value and is returned as such.
pub fn get_deep_value<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    if segments.is_empty() {
        return None;
    }
    let mut current = root;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Splits a dotted path into segments, rejecting empty segments and
/// characters outside the identifier set. Returns `None` on any invalid
/// segment so callers treat the whole expression as unparseable rather
/// than silently resolving a truncated path.
pub fn parse_dotted_path(raw: &str) -> Option<Vec<String>> {
    if raw.is_empty() {
        return None;
    }
    let mut segments = Vec::new();
    for segment in raw.split('.') {
        if segment.is_empty() {
            return None;
        }
        if !segment
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        {
            return None;
        }
        segments.push(segment.to_string());
    }
    Some(segments)
}
