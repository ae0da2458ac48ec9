//! Dynamic value model shared by the mapping engine and the predicate compiler.
//!
//! Records flowing through the data mapping layer are string-keyed maps of
//! heterogeneous values. [`Value`] is the closed set of shapes such a value can
//! take, so every coercion path is an exhaustive `match` rather than a runtime
//! type probe.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A string-keyed record of dynamic values.
///
/// Uses `BTreeMap` so iteration (and therefore mapping and compilation
/// output) is deterministic.
pub type Record = BTreeMap<String, Value>;

/// Textual form of an empty object, treated as "absent" for non-required fields.
pub const EMPTY_OBJECT_FORM: &str = "{}";

/// Generic runtime value carried by records.
///
/// Serializes untagged, so a `Value` round-trips through JSON as the natural
/// JSON shape. `Time` serializes as an RFC 3339 string and `Bytes` as an array
/// of octets; both deserialize back as `String` / `Array`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// Explicit null.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer. Narrower integer shapes are promoted to this.
    Int(i64),
    /// 64-bit float. `f32` shapes are promoted to this.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered sequence of values.
    Array(Vec<Value>),
    /// Nested record.
    Map(Record),
    /// Timestamp with an explicit UTC offset.
    Time(DateTime<FixedOffset>),
    /// Raw binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Short name of the variant, used in log fields and error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Time(_) => "time",
            Self::Bytes(_) => "bytes",
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_map(&self) -> Option<&Record> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Whether the value counts as "absent" for presence checks.
    ///
    /// A value is usable only if its formatted form is non-empty. The
    /// empty-object form `{}` also counts as absent unless the field is
    /// required, in which case the field's own validation still runs.
    #[must_use]
    pub fn is_absent(&self, required: bool) -> bool {
        if self.is_null() {
            return true;
        }
        let formatted = self.to_string();
        formatted.is_empty() || (!required && formatted == EMPTY_OBJECT_FORM)
    }

    /// Converts every `Time` in this value (including inside arrays) to `offset`.
    #[must_use]
    pub fn with_timezone(self, offset: FixedOffset) -> Self {
        match self {
            Self::Time(t) => Self::Time(t.with_timezone(&offset)),
            Self::Array(items) => Self::Array(
                items
                    .into_iter()
                    .map(|item| item.with_timezone(offset))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Converts into a `serde_json::Value`. `Time` becomes an RFC 3339 string,
    /// `Bytes` an array of numbers, and non-finite floats `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(n) => serde_json::Value::from(*n),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Array(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json).collect())
            }
            Self::Map(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Self::Time(t) => {
                serde_json::Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Self::Bytes(b) => serde_json::Value::Array(
                b.iter().map(|byte| serde_json::Value::from(*byte)).collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(m) => {
                f.write_str("{")?;
                for (i, (key, item)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {item}")?;
                }
                f.write_str("}")
            }
            Self::Time(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Bytes(b) => f.write_str(&hex::encode(b)),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map_or(Self::Null, Self::Float),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Self::Map(obj.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Self::Int(i64::from(n))
                }
            }
        )*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Self::Float(f64::from(x))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(t: DateTime<FixedOffset>) -> Self {
        Self::Time(t)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Time(t.fixed_offset())
    }
}

impl From<Record> for Value {
    fn from(m: Record) -> Self {
        Self::Map(m)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

/// Builds a [`Record`] from `key => value` pairs.
///
/// ```
/// use gantry_core::{record, Value};
///
/// let r = record! { "name" => "ada", "age" => 36 };
/// assert_eq!(r["age"], Value::Int(36));
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::types::Record::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut r = $crate::types::Record::new();
        $(
            r.insert(::std::string::String::from($key), $crate::types::Value::from($value));
        )+
        r
    }};
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn empty_map_formats_as_empty_object_form() {
        assert_eq!(Value::Map(Record::new()).to_string(), EMPTY_OBJECT_FORM);
    }

    #[test]
    fn empty_object_is_absent_only_when_not_required() {
        let empty = Value::Map(Record::new());
        assert!(empty.is_absent(false));
        assert!(!empty.is_absent(true));
    }

    #[test]
    fn empty_string_and_null_are_absent() {
        assert!(Value::from("").is_absent(true));
        assert!(Value::Null.is_absent(false));
        assert!(!Value::from(0).is_absent(true));
        assert!(!Value::Array(vec![]).is_absent(false));
    }

    #[test]
    fn narrow_numbers_promote() {
        assert_eq!(Value::from(7_i8), Value::Int(7));
        assert_eq!(Value::from(7_u32), Value::Int(7));
        assert_eq!(Value::from(1.5_f32), Value::Float(1.5));
    }

    #[test]
    fn json_conversion_preserves_shape() {
        let json = serde_json::json!({"a": 1, "b": [true, "x"], "c": null, "d": 2.5});
        let value = Value::from(json.clone());
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn with_timezone_converts_nested_times() {
        let utc = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let value = Value::Array(vec![Value::from(utc), Value::from("untouched")]);

        let converted = value.with_timezone(plus_two);
        let items = converted.as_array().unwrap();
        assert_eq!(items[0].to_string(), "2024-01-01T14:00:00+02:00");
        assert_eq!(items[1], Value::from("untouched"));
    }

    #[test]
    fn record_macro_builds_records() {
        let r = record! { "a" => 1, "b" => "two" };
        assert_eq!(r.len(), 2);
        assert_eq!(r["b"], Value::from("two"));
        assert!(record! {}.is_empty());
    }

    #[test]
    fn untagged_deserialization_reads_plain_json() {
        let value: Value = serde_json::from_str(r#"{"n": 3, "s": "x"}"#).unwrap();
        assert_eq!(value, Value::Map(record! { "n" => 3, "s" => "x" }));
    }
}
