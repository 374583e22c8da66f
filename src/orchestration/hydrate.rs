use crate::orchestration::NamedResult;
use crate::shared::json_path::{get_deep_value, parse_dotted_path};
use crate::shared::text::format_result_value;
use serde_json::Value;
use std::collections::BTreeMap;

pub const DEFAULT_FALLBACK: &str = "unavailable";

pub struct HydrationContext<'a> {
    /// Most recent successful tool result, for unqualified
    /// `{{tool_result.*}}` placeholders.
    pub last_result: Option<&'a Value>,
    pub named_results: &'a BTreeMap<String, NamedResult>,
    pub fallback: &'a str,
}

/// Rewrites `{{tool_result.<path>}}` and `{{tool.<stepId>[.<path>]}}`
/// placeholders. Unresolved paths substitute the fallback literal;
/// placeholders outside the two forms pass through untouched, which
/// makes hydration idempotent on an already-hydrated template.
pub fn hydrate_reply_template(template: &str, context: &HydrationContext<'_>) -> String {
    if template.trim().is_empty() {
        return template.to_string();
    }

    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        let Some(close_offset) = rest[open + 2..].find("}}") else {
            break;
        };
        let close = open + 2 + close_offset;
        output.push_str(&rest[..open]);
        let raw_placeholder = &rest[open..close + 2];
        let inner = rest[open + 2..close].trim();
        match substitute(inner, context) {
            Some(value) => output.push_str(&value),
            None => output.push_str(raw_placeholder),
        }
        rest = &rest[close + 2..];
    }
    output.push_str(rest);
    output
}

fn substitute(inner: &str, context: &HydrationContext<'_>) -> Option<String> {
    let segments = parse_dotted_path(inner)?;
    let (kind, path) = segments.split_first()?;
    match kind.as_str() {
        "tool_result" if !path.is_empty() => {
            Some(resolve_last_result(context.last_result, path, context.fallback))
        }
        "tool" if !path.is_empty() => Some(resolve_named(path, context)),
        _ => None,
    }
}

fn resolve_last_result(result: Option<&Value>, path: &[String], fallback: &str) -> String {
    let Some(result) = result else {
        return fallback.to_string();
    };
    let resolved = get_deep_value(result, path).or_else(|| {
        result
            .get("result")
            .and_then(|nested| get_deep_value(nested, path))
    });
    match resolved {
        // The last-result form treats null the same as an absent path.
        None | Some(Value::Null) => fallback.to_string(),
        Some(value) => format_result_value(value),
    }
}

fn resolve_named(path: &[String], context: &HydrationContext<'_>) -> String {
    let (step_id, rest) = match path.split_first() {
        Some(parts) => parts,
        None => return context.fallback.to_string(),
    };
    let Some(record) = context.named_results.get(step_id) else {
        return context.fallback.to_string();
    };
    if rest.is_empty() {
        return serde_json::to_value(record)
            .map(|value| value.to_string())
            .unwrap_or_else(|_| context.fallback.to_string());
    }
    match record.lookup(rest) {
        Some(value) => format_result_value(&value),
        None => context.fallback.to_string(),
    }
}
