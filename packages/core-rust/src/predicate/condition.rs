//! Condition trees accepted by the predicate compiler.

use crate::types::{Record, Value};

/// Ordering directive. Contributes to `ORDER BY`, never to the predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Asc,
    Desc,
    /// Random order; the column is ignored.
    Random,
}

/// Comparison selected by an operator-map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `col LIKE '%v%'`.
    Like,
    /// Same as [`Operator::Like`].
    LikeFull,
    /// `col LIKE 'v%'`.
    LikeLeft,
    /// `col LIKE '%v'`.
    LikeRight,
    /// `? = ANY(col)`.
    Any,
    /// `col IN(?,...)`.
    In,
    /// `col NOT IN(?,...)`.
    NotIn,
    /// Any other SQL comparison token (`>`, `<=`, `<>`, `ILIKE`, ...), emitted
    /// verbatim as `col <token> ?`.
    Compare(String),
}

impl Operator {
    /// Parses an operator-map key. Recognized keywords are case-insensitive;
    /// anything else becomes [`Operator::Compare`].
    #[must_use]
    pub fn parse(token: &str) -> Self {
        let trimmed = token.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "LIKE" => Self::Like,
            "LIKE_FULL" => Self::LikeFull,
            "LIKE_LEFT" => Self::LikeLeft,
            "LIKE_RIGHT" => Self::LikeRight,
            "ANY" => Self::Any,
            "IN" => Self::In,
            "NOT IN" | "NOT_IN" => Self::NotIn,
            _ => Self::Compare(trimmed.to_string()),
        }
    }
}

/// Typed list operand for `IN` / `NOT IN`.
///
/// The element type decides the zero value bound when the list is empty.
#[derive(Debug, Clone, PartialEq)]
pub enum InList {
    Ints(Vec<i64>),
    Strings(Vec<String>),
    Values(Vec<Value>),
}

impl InList {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Ints(items) => items.len(),
            Self::Strings(items) => items.len(),
            Self::Values(items) => items.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value bound in place of an empty list.
    #[must_use]
    pub const fn zero_value(&self) -> Value {
        match self {
            Self::Ints(_) => Value::Int(0),
            Self::Strings(_) => Value::String(String::new()),
            Self::Values(_) => Value::Null,
        }
    }

    /// Parameters to bind: one per element, or the zero value when empty.
    #[must_use]
    pub fn params(&self) -> Vec<Value> {
        if self.is_empty() {
            return vec![self.zero_value()];
        }
        match self {
            Self::Ints(items) => items.iter().copied().map(Value::Int).collect(),
            Self::Strings(items) => items.iter().cloned().map(Value::String).collect(),
            Self::Values(items) => items.clone(),
        }
    }
}

impl From<Vec<i64>> for InList {
    fn from(items: Vec<i64>) -> Self {
        Self::Ints(items)
    }
}

impl From<Vec<i32>> for InList {
    fn from(items: Vec<i32>) -> Self {
        Self::Ints(items.into_iter().map(i64::from).collect())
    }
}

impl From<Vec<String>> for InList {
    fn from(items: Vec<String>) -> Self {
        Self::Strings(items)
    }
}

impl From<Vec<&str>> for InList {
    fn from(items: Vec<&str>) -> Self {
        Self::Strings(items.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<Value>> for InList {
    fn from(items: Vec<Value>) -> Self {
        Self::Values(items)
    }
}

/// Right-hand side of an operator-map entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    List(InList),
}

macro_rules! operand_from_scalar {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(value: $t) -> Self {
                    Self::Value(Value::from(value))
                }
            }
        )*
    };
}

operand_from_scalar!(i32, i64, f64, bool, &str, String, Value);

impl From<InList> for Operand {
    fn from(list: InList) -> Self {
        Self::List(list)
    }
}

/// Constraint on one key of a [`ConditionMap`].
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `col = ?`; `Eq(Value::Null)` compiles like [`Condition::Null`].
    Eq(Value),
    /// `col IS NULL`.
    Null,
    /// `col IS NOT NULL`.
    NotNull,
    /// Ordering directive.
    Order(SortOrder),
    /// Operator-map: every entry compiled and AND-joined.
    Ops(Vec<(Operator, Operand)>),
    /// Nested OR-group of condition maps. The key it is stored under is not
    /// used as a column.
    AnyOf(Vec<ConditionMap>),
}

/// One AND-group of field constraints, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionMap {
    entries: Vec<(String, Condition)>,
}

impl ConditionMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a raw condition.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, condition: Condition) -> Self {
        self.entries.push((key.into(), condition));
        self
    }

    #[must_use]
    pub fn eq(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(key, Condition::Eq(value.into()))
    }

    #[must_use]
    pub fn is_null(self, key: impl Into<String>) -> Self {
        self.with(key, Condition::Null)
    }

    #[must_use]
    pub fn not_null(self, key: impl Into<String>) -> Self {
        self.with(key, Condition::NotNull)
    }

    #[must_use]
    pub fn asc(self, key: impl Into<String>) -> Self {
        self.with(key, Condition::Order(SortOrder::Asc))
    }

    #[must_use]
    pub fn desc(self, key: impl Into<String>) -> Self {
        self.with(key, Condition::Order(SortOrder::Desc))
    }

    #[must_use]
    pub fn random(self) -> Self {
        self.with("", Condition::Order(SortOrder::Random))
    }

    /// Adds an operator to `key`. Consecutive operators on the same key share
    /// one operator-map.
    #[must_use]
    pub fn op(mut self, key: impl Into<String>, op: Operator, operand: impl Into<Operand>) -> Self {
        let key = key.into();
        let operand = operand.into();
        if let Some((last_key, Condition::Ops(ops))) = self.entries.last_mut() {
            if *last_key == key {
                ops.push((op, operand));
                return self;
            }
        }
        self.with(key, Condition::Ops(vec![(op, operand)]))
    }

    /// Adds a nested OR-group.
    #[must_use]
    pub fn any_of(self, key: impl Into<String>, groups: Vec<Self>) -> Self {
        self.with(key, Condition::AnyOf(groups))
    }

    /// Equality conditions for every entry of `record`; nulls become `IS NULL`.
    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        record.iter().fold(Self::new(), |map, (key, value)| match value {
            Value::Null => map.is_null(key.clone()),
            other => map.eq(key.clone(), other.clone()),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.entries.iter().map(|(k, c)| (k.as_str(), c))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Condition)> for ConditionMap {
    fn from_iter<I: IntoIterator<Item = (K, Condition)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, c)| (k.into(), c)).collect(),
        }
    }
}
