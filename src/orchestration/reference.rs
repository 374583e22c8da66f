use crate::orchestration::NamedResult;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A `$tool.<stepId>[.<dotted.path>]` expression inside step
/// arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRef {
    pub step_id: String,
    pub path: Vec<String>,
}

impl ToolRef {
    /// Hand-written scan over the reference grammar. Anything that
    /// deviates (empty segment, stray character) is not a reference
    /// and passes through as a plain string value.
    pub fn parse(raw: &str) -> Option<Self> {
        let rest = raw.strip_prefix("$tool.")?;
        let mut segments = Vec::new();
        for segment in rest.split('.') {
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
        let step_id = segments.remove(0);
        Some(Self {
            step_id,
            path: segments,
        })
    }
}

impl std::fmt::Display for ToolRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "$tool.{}", self.step_id)?;
        for segment in &self.path {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArgs {
    pub value: Option<Map<String, Value>>,
    pub errors: Vec<String>,
}

/// Walks `args` recursively, replacing reference strings with values
/// from previously completed steps. Unknown step ids and undefined
/// paths are recorded as error strings rather than thrown; the caller
/// aborts the step if any are present.
pub fn resolve_arg_references(
    args: Option<&Map<String, Value>>,
    named_results: &BTreeMap<String, NamedResult>,
) -> ResolvedArgs {
    let Some(args) = args else {
        return ResolvedArgs {
            value: None,
            errors: Vec::new(),
        };
    };

    let mut errors = Vec::new();
    let mut resolved = Map::with_capacity(args.len());
    for (key, child) in args {
        resolved.insert(key.clone(), resolve_value(child, named_results, &mut errors));
    }
    ResolvedArgs {
        value: Some(resolved),
        errors,
    }
}

fn resolve_value(
    value: &Value,
    named_results: &BTreeMap<String, NamedResult>,
    errors: &mut Vec<String>,
) -> Value {
    match value {
        Value::String(raw) => match ToolRef::parse(raw) {
            Some(reference) => resolve_reference(&reference, named_results, errors),
            None => value.clone(),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_value(item, named_results, errors))
                .collect(),
        ),
        Value::Object(map) => {
            let mut clone = Map::with_capacity(map.len());
            for (key, child) in map {
                clone.insert(key.clone(), resolve_value(child, named_results, errors));
            }
            Value::Object(clone)
        }
        other => other.clone(),
    }
}

fn resolve_reference(
    reference: &ToolRef,
    named_results: &BTreeMap<String, NamedResult>,
    errors: &mut Vec<String>,
) -> Value {
    let Some(record) = named_results.get(&reference.step_id) else {
        errors.push(format!("$tool.{}", reference.step_id));
        return Value::Null;
    };
    if reference.path.is_empty() {
        return record
            .result
            .clone()
            .or_else(|| serde_json::to_value(record).ok())
            .unwrap_or(Value::Null);
    }
    match record.lookup(&reference.path) {
        Some(resolved) => resolved,
        None => {
            errors.push(reference.to_string());
            Value::Null
        }
    }
}
