//! Condition tree → parameterized SQL predicate.
//!
//! Structured filters never fail on malformed shapes: anything the compiler
//! cannot express degrades to "no fragment" and the surrounding clause is
//! built from what remains. The only error is exceeding the nesting bound.
//!
//! # LIKE literals
//!
//! The `LIKE` family embeds its operand directly into the SQL text, escaping
//! single quotes by doubling them, instead of binding a parameter. Existing
//! callers depend on that literal shape. Treat it as an injection surface:
//! never route untrusted input into a `LIKE` operand without validating it
//! through a schema first.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use super::condition::{Condition, ConditionMap, InList, Operand, Operator, SortOrder};
use crate::types::Value;
use crate::DEFAULT_MAX_DEPTH;

/// Predicate emitted when no clause was produced.
pub const TAUTOLOGY: &str = "1=1";

/// Ordering expression emitted for [`SortOrder::Random`].
pub const RANDOM_ORDER: &str = "RANDOM()";

static ORDER_BY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\border\s+by\b").expect("ORDER BY pattern is valid"));

// ---------------------------------------------------------------------------
// Input / output
// ---------------------------------------------------------------------------

/// What to compile.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Hand-written clause with positional parameters, passed through as-is.
    Raw { sql: String, params: Vec<Value> },
    /// Condition maps, OR-joined.
    Conditions(Vec<ConditionMap>),
}

impl Filter {
    #[must_use]
    pub fn raw<I, V>(sql: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Raw {
            sql: sql.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<ConditionMap> for Filter {
    fn from(map: ConditionMap) -> Self {
        Self::Conditions(vec![map])
    }
}

impl From<Vec<ConditionMap>> for Filter {
    fn from(maps: Vec<ConditionMap>) -> Self {
        Self::Conditions(maps)
    }
}

impl From<&str> for Filter {
    fn from(sql: &str) -> Self {
        Self::Raw {
            sql: sql.to_string(),
            params: Vec::new(),
        }
    }
}

/// A compiled predicate. `order_by` is empty or starts with `ORDER BY `.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compiled {
    pub predicate: String,
    pub params: Vec<Value>,
    pub order_by: String,
}

impl Compiled {
    /// `WHERE <predicate>`, or an empty string for an empty predicate.
    #[must_use]
    pub fn where_clause(&self) -> String {
        if self.predicate.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.predicate)
        }
    }

    #[must_use]
    pub fn order_clause(&self) -> &str {
        &self.order_by
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("condition tree nested deeper than {max} levels")]
    DepthExceeded { max: usize },
}

// ---------------------------------------------------------------------------
// Compiler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct Compiler {
    max_depth: usize,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-call accumulator.
#[derive(Default)]
struct Output {
    params: Vec<Value>,
    orders: Vec<String>,
}

impl Compiler {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Compiles `filter`.
    ///
    /// # Errors
    ///
    /// [`CompileError::DepthExceeded`] when nested OR-groups go deeper than
    /// the configured bound.
    pub fn compile(&self, filter: impl Into<Filter>) -> Result<Compiled, CompileError> {
        match filter.into() {
            Filter::Raw { sql, params } => Ok(split_raw(&sql, params)),
            Filter::Conditions(maps) => {
                let mut out = Output::default();
                let predicate = self
                    .compile_group(&maps, 1, &mut out)?
                    .unwrap_or_else(|| TAUTOLOGY.to_string());
                let order_by = if out.orders.is_empty() {
                    String::new()
                } else {
                    format!("ORDER BY {}", out.orders.join(", "))
                };
                debug!(
                    maps = maps.len(),
                    params = out.params.len(),
                    orders = out.orders.len(),
                    "compiled predicate"
                );
                Ok(Compiled {
                    predicate,
                    params: out.params,
                    order_by,
                })
            }
        }
    }

    /// OR-joins the clauses of `maps`; `None` when none produced a clause.
    fn compile_group(
        &self,
        maps: &[ConditionMap],
        depth: usize,
        out: &mut Output,
    ) -> Result<Option<String>, CompileError> {
        if depth > self.max_depth {
            return Err(CompileError::DepthExceeded {
                max: self.max_depth,
            });
        }
        let mut clauses = Vec::new();
        for map in maps {
            if let Some(clause) = self.compile_map(map, depth, out)? {
                clauses.push(clause);
            }
        }
        Ok((!clauses.is_empty()).then(|| clauses.join(" OR ")))
    }

    /// AND-joins one map's fragments inside parentheses.
    fn compile_map(
        &self,
        map: &ConditionMap,
        depth: usize,
        out: &mut Output,
    ) -> Result<Option<String>, CompileError> {
        let mut fragments = Vec::new();
        for (key, condition) in map.iter() {
            let col = column(key);
            let fragment = match condition {
                Condition::Eq(Value::Null) | Condition::Null => Some(format!("{col} IS NULL")),
                Condition::NotNull => Some(format!("{col} IS NOT NULL")),
                Condition::Eq(Value::Map(_)) => None,
                Condition::Eq(value) => {
                    out.params.push(value.clone());
                    Some(format!("{col} = ?"))
                }
                Condition::Order(order) => {
                    out.orders.push(match order {
                        SortOrder::Asc => format!("{col} ASC"),
                        SortOrder::Desc => format!("{col} DESC"),
                        SortOrder::Random => RANDOM_ORDER.to_string(),
                    });
                    None
                }
                Condition::Ops(ops) => operator_map(&col, ops, out),
                Condition::AnyOf(groups) => self
                    .compile_group(groups, depth + 1, out)?
                    .map(|group| format!("({group})")),
            };
            fragments.extend(fragment);
        }
        Ok((!fragments.is_empty()).then(|| format!("({})", fragments.join(" AND "))))
    }
}

/// Compiles with the default depth bound.
///
/// # Errors
///
/// See [`Compiler::compile`].
pub fn compile(filter: impl Into<Filter>) -> Result<Compiled, CompileError> {
    Compiler::new().compile(filter)
}

// ---------------------------------------------------------------------------
// Fragments
// ---------------------------------------------------------------------------

fn split_raw(sql: &str, params: Vec<Value>) -> Compiled {
    let (predicate, order_by) = match ORDER_BY.find(sql) {
        Some(found) => (&sql[..found.start()], sql[found.start()..].trim()),
        None => (sql, ""),
    };
    Compiled {
        predicate: predicate.trim().to_string(),
        params,
        order_by: order_by.to_string(),
    }
}

fn operator_map(col: &str, ops: &[(Operator, Operand)], out: &mut Output) -> Option<String> {
    let fragments: Vec<String> = ops
        .iter()
        .filter_map(|(op, operand)| operator(col, op, operand, out))
        .collect();
    (!fragments.is_empty()).then(|| format!("({})", fragments.join(" AND ")))
}

fn operator(col: &str, op: &Operator, operand: &Operand, out: &mut Output) -> Option<String> {
    match (op, operand) {
        (Operator::Like | Operator::LikeFull, Operand::Value(value)) => {
            like_literal(value).map(|text| format!("{col} LIKE '%{text}%'"))
        }
        (Operator::LikeLeft, Operand::Value(value)) => {
            like_literal(value).map(|text| format!("{col} LIKE '{text}%'"))
        }
        (Operator::LikeRight, Operand::Value(value)) => {
            like_literal(value).map(|text| format!("{col} LIKE '%{text}'"))
        }
        (Operator::Any, Operand::Value(value)) => {
            out.params.push(value.clone());
            Some(format!("? = ANY({col})"))
        }
        (Operator::In, _) => Some(in_list(col, "IN", &list_of(operand), out)),
        (Operator::NotIn, _) => Some(in_list(col, "NOT IN", &list_of(operand), out)),
        (Operator::Compare(token), Operand::Value(value)) if !token.is_empty() => {
            out.params.push(value.clone());
            Some(format!("{col} {token} ?"))
        }
        _ => None,
    }
}

/// LIKE operand with single quotes doubled; containers and null have none.
fn like_literal(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Map(_) | Value::Array(_) => None,
        other => Some(other.to_string().replace('\'', "''")),
    }
}

fn list_of(operand: &Operand) -> InList {
    match operand {
        Operand::List(list) => list.clone(),
        Operand::Value(Value::Null) => InList::Values(Vec::new()),
        Operand::Value(Value::Array(items)) => InList::Values(items.clone()),
        Operand::Value(other) => InList::Values(vec![other.clone()]),
    }
}

fn in_list(col: &str, keyword: &str, list: &InList, out: &mut Output) -> String {
    let params = list.params();
    let placeholders = vec!["?"; params.len()].join(",");
    out.params.extend(params);
    format!("{col} {keyword}({placeholders})")
}

/// Column reference for `key`; `:` segments become bracket access
/// (`tags:0` → `tags[0]`, `meta:lang` → `meta['lang']`).
fn column(key: &str) -> String {
    let mut segments = key.split(':');
    let mut col = segments.next().unwrap_or_default().to_string();
    for segment in segments {
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            let _ = write!(col, "[{segment}]");
        } else {
            let _ = write!(col, "['{}']", segment.replace('\'', "''"));
        }
    }
    col
}
