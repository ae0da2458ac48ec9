//! Built-in field types.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::registry::FieldType;
use crate::schema::FieldSpec;
use crate::types::Value;

// ---------------------------------------------------------------------------
// Scalar parsing helpers
// ---------------------------------------------------------------------------

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(*n),
        Value::Float(x) if x.fract() == 0.0 && x.abs() < 9.007_199_254_740_992e15 => {
            Some(*x as i64)
        }
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn parse_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::String(s) => s.trim().parse().ok(),
        other => other.as_f64(),
    };
    parsed.filter(|x: &f64| x.is_finite())
}

fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Int(0) => Some(false),
        Value::Int(1) => Some(true),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn parse_time(value: &Value) -> Option<Value> {
    match value {
        Value::Time(_) => Some(value.clone()),
        Value::Int(secs) => DateTime::<Utc>::from_timestamp(*secs, 0).map(Value::from),
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s).map(Value::Time).ok().or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|naive| Value::from(naive.and_utc()))
            })
        }
        _ => None,
    }
}

/// Splits a comma-separated string or passes an array through.
fn list_items(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items.clone()),
        Value::String(s) if s.trim().is_empty() => Some(Vec::new()),
        Value::String(s) => Some(s.split(',').map(|part| Value::from(part.trim())).collect()),
        _ => None,
    }
}

fn param_i64(spec: &FieldSpec, name: &str) -> Option<i64> {
    spec.get_param(name).and_then(parse_int)
}

fn param_f64(spec: &FieldSpec, name: &str) -> Option<f64> {
    spec.get_param(name).and_then(parse_float)
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Signed 64-bit integer. Honours `min` / `max` params.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntType;

impl FieldType for IntType {
    fn validate(&self, value: &Value, spec: &FieldSpec) -> bool {
        parse_int(value).is_some_and(|n| {
            param_i64(spec, "min").is_none_or(|min| n >= min)
                && param_i64(spec, "max").is_none_or(|max| n <= max)
        })
    }

    fn transform(&self, value: Value, _spec: &FieldSpec) -> Value {
        parse_int(&value).map_or(value, Value::Int)
    }

    fn restore(&self, value: &Value, _spec: &FieldSpec) -> Option<Value> {
        value.as_i64().map(|n| Value::String(n.to_string()))
    }
}

/// 64-bit float. Honours `min` / `max` params.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatType;

impl FieldType for FloatType {
    fn validate(&self, value: &Value, spec: &FieldSpec) -> bool {
        parse_float(value).is_some_and(|x| {
            param_f64(spec, "min").is_none_or(|min| x >= min)
                && param_f64(spec, "max").is_none_or(|max| x <= max)
        })
    }

    fn transform(&self, value: Value, _spec: &FieldSpec) -> Value {
        parse_float(&value).map_or(value, Value::Float)
    }

    fn restore(&self, value: &Value, _spec: &FieldSpec) -> Option<Value> {
        value.as_f64().map(|x| Value::String(x.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BoolType;

impl FieldType for BoolType {
    fn validate(&self, value: &Value, _spec: &FieldSpec) -> bool {
        parse_bool(value).is_some()
    }

    fn transform(&self, value: Value, _spec: &FieldSpec) -> Value {
        parse_bool(&value).map_or(value, Value::Bool)
    }

    fn restore(&self, value: &Value, _spec: &FieldSpec) -> Option<Value> {
        value.as_bool().map(|b| Value::String(b.to_string()))
    }
}

/// Trimmed string. Scalars are accepted and stringified; `min_len` / `max_len`
/// params count characters after trimming.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringType;

impl FieldType for StringType {
    fn validate(&self, value: &Value, spec: &FieldSpec) -> bool {
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Int(_) | Value::Float(_) | Value::Bool(_) => value.to_string(),
            _ => return false,
        };
        let len = i64::try_from(text.chars().count()).unwrap_or(i64::MAX);
        param_i64(spec, "min_len").is_none_or(|min| len >= min)
            && param_i64(spec, "max_len").is_none_or(|max| len <= max)
    }

    fn transform(&self, value: Value, _spec: &FieldSpec) -> Value {
        match value {
            Value::String(s) => Value::String(s.trim().to_string()),
            Value::Int(_) | Value::Float(_) | Value::Bool(_) => Value::String(value.to_string()),
            other => other,
        }
    }

    fn restore(&self, value: &Value, _spec: &FieldSpec) -> Option<Value> {
        Some(value.clone())
    }
}

/// Timestamp: RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or unix seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeType;

impl FieldType for TimeType {
    fn validate(&self, value: &Value, _spec: &FieldSpec) -> bool {
        parse_time(value).is_some()
    }

    fn transform(&self, value: Value, _spec: &FieldSpec) -> Value {
        parse_time(&value).unwrap_or(value)
    }

    fn restore(&self, value: &Value, _spec: &FieldSpec) -> Option<Value> {
        match value {
            Value::Time(t) => Some(Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))),
            _ => None,
        }
    }
}

/// JSON sub-document: an object/array, or a string holding one.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonType;

impl JsonType {
    fn parse(value: &Value) -> Option<Value> {
        match value {
            Value::Map(_) | Value::Array(_) => Some(value.clone()),
            Value::String(s) => match serde_json::from_str::<serde_json::Value>(s) {
                Ok(json @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => {
                    Some(Value::from(json))
                }
                _ => None,
            },
            _ => None,
        }
    }
}

impl FieldType for JsonType {
    fn validate(&self, value: &Value, _spec: &FieldSpec) -> bool {
        Self::parse(value).is_some()
    }

    fn transform(&self, value: Value, _spec: &FieldSpec) -> Value {
        Self::parse(&value).unwrap_or(value)
    }

    fn restore(&self, value: &Value, _spec: &FieldSpec) -> Option<Value> {
        match value {
            Value::Map(_) | Value::Array(_) => Some(Value::String(value.to_json().to_string())),
            _ => None,
        }
    }
}

/// List of integers, from an array or a comma-separated string.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntsType;

impl FieldType for IntsType {
    fn validate(&self, value: &Value, _spec: &FieldSpec) -> bool {
        list_items(value).is_some_and(|items| items.iter().all(|item| parse_int(item).is_some()))
    }

    fn transform(&self, value: Value, _spec: &FieldSpec) -> Value {
        match list_items(&value) {
            Some(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| parse_int(&item).map_or(item, Value::Int))
                    .collect(),
            ),
            None => value,
        }
    }

    fn restore(&self, value: &Value, _spec: &FieldSpec) -> Option<Value> {
        let items = value.as_array()?;
        let parts: Option<Vec<String>> = items
            .iter()
            .map(|item| item.as_i64().map(|n| n.to_string()))
            .collect();
        parts.map(|parts| Value::String(parts.join(",")))
    }
}

/// List of trimmed strings, from an array or a comma-separated string.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringsType;

impl FieldType for StringsType {
    fn validate(&self, value: &Value, _spec: &FieldSpec) -> bool {
        list_items(value).is_some_and(|items| {
            items
                .iter()
                .all(|item| matches!(item, Value::String(_) | Value::Int(_) | Value::Float(_)))
        })
    }

    fn transform(&self, value: Value, _spec: &FieldSpec) -> Value {
        match list_items(&value) {
            Some(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| Value::String(item.to_string().trim().to_string()))
                    .collect(),
            ),
            None => value,
        }
    }
}
