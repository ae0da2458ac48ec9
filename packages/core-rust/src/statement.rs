//! SQL statements assembled around compiled predicates.

use crate::predicate::{CompileError, Compiler, Filter};
use crate::types::Value;

/// Positional placeholder syntax of the target driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Placeholder {
    /// `?`, as emitted by the compiler.
    #[default]
    Question,
    /// `$1`, `$2`, ...
    Dollar,
}

/// Rewrites `?` placeholders into `style`.
///
/// Question marks inside single- or double-quoted literals are left alone, so
/// `LIKE` literals containing `?` survive.
#[must_use]
pub fn rebind(sql: &str, style: Placeholder) -> String {
    if style == Placeholder::Question {
        return sql.to_string();
    }
    let mut out = String::with_capacity(sql.len() + 8);
    let mut quote: Option<char> = None;
    let mut index = 0_usize;
    for ch in sql.chars() {
        match (quote, ch) {
            // A doubled quote closes and reopens, which keeps escapes intact.
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '?') => {
                index += 1;
                out.push('$');
                out.push_str(&index.to_string());
                continue;
            }
            (None, _) => {}
        }
        out.push(ch);
    }
    out
}

/// SQL text with its positional parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// `SELECT` builder over a [`Filter`].
#[derive(Debug, Clone)]
pub struct Select {
    table: String,
    columns: Vec<String>,
    filter: Option<Filter>,
    limit: Option<u64>,
    offset: Option<u64>,
    placeholder: Placeholder,
    compiler: Compiler,
}

impl Select {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filter: None,
            limit: None,
            offset: None,
            placeholder: Placeholder::default(),
            compiler: Compiler::new(),
        }
    }

    /// Selected columns; `*` when none are given.
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub const fn placeholders(mut self, style: Placeholder) -> Self {
        self.placeholder = style;
        self
    }

    #[must_use]
    pub const fn compiler(mut self, compiler: Compiler) -> Self {
        self.compiler = compiler;
        self
    }

    /// Renders the statement.
    ///
    /// # Errors
    ///
    /// Propagates [`CompileError`] from compiling the filter.
    pub fn build(self) -> Result<Statement, CompileError> {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut sql = format!("SELECT {columns} FROM {}", self.table);
        let mut params = Vec::new();

        if let Some(filter) = self.filter {
            let compiled = self.compiler.compile(filter)?;
            let where_clause = compiled.where_clause();
            if !where_clause.is_empty() {
                sql.push(' ');
                sql.push_str(&where_clause);
            }
            if !compiled.order_by.is_empty() {
                sql.push(' ');
                sql.push_str(&compiled.order_by);
            }
            params = compiled.params;
        }
        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ");
            sql.push_str(&limit.to_string());
        }
        if let Some(offset) = self.offset {
            sql.push_str(" OFFSET ");
            sql.push_str(&offset.to_string());
        }

        Ok(Statement {
            sql: rebind(&sql, self.placeholder),
            params,
        })
    }
}
