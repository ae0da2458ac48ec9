use std::fmt;

use crate::types::Value;

/// Failure codes attached to engine-generated failures. A collaborator maps
/// them to numeric statuses.
pub mod codes {
    /// A required field was missing or empty.
    pub const MISSING_ARGUMENT: &str = "missing_argument";
    /// A field value failed validation or encoding.
    pub const INVALID_ARGUMENT: &str = "invalid_argument";
}

/// Lookup of registered failure keys.
///
/// The engine asks whether a schema-coded key such as
/// `user.mapping.empty.email` exists before falling back to the generic
/// `user.mapping.empty` key.
pub trait KeyCatalog: Send + Sync {
    fn contains(&self, key: &str) -> bool;
}

/// Category of a mapping failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    EmptyRequiredField,
    InvalidFieldValue,
    /// A nested schema failed. Wraps the child's kind; the failure's code,
    /// key and arguments are the child's, unchanged.
    NestedMappingFailure(Box<FailureKind>),
    /// Nesting went deeper than the mapper's bound.
    DepthExceeded,
}

impl FailureKind {
    /// The kind at the bottom of any nesting.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::NestedMappingFailure(inner) => inner.root(),
            other => other,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRequiredField => f.write_str("empty required field"),
            Self::InvalidFieldValue => f.write_str("invalid field value"),
            Self::NestedMappingFailure(inner) => write!(f, "nested: {inner}"),
            Self::DepthExceeded => f.write_str("depth exceeded"),
        }
    }
}

/// Structured mapping failure: a `(code, key, args)` triple plus its kind.
///
/// The key is resolved to a localized message by the caller; `args` fill the
/// message's placeholders.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} `{field}`: {key}")]
pub struct MappingFailure {
    pub kind: FailureKind,
    pub code: String,
    pub key: String,
    pub args: Vec<Value>,
    /// Name of the field that failed (the innermost one for nested failures).
    pub field: String,
}

impl MappingFailure {
    #[must_use]
    pub fn new(kind: FailureKind, code: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            key: key.into(),
            args: Vec::new(),
            field: String::new(),
        }
    }

    /// An [`FailureKind::EmptyRequiredField`] failure with the default code.
    #[must_use]
    pub fn empty(key: impl Into<String>) -> Self {
        Self::new(FailureKind::EmptyRequiredField, codes::MISSING_ARGUMENT, key)
    }

    /// An [`FailureKind::InvalidFieldValue`] failure with the default code.
    #[must_use]
    pub fn invalid(key: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidFieldValue, codes::INVALID_ARGUMENT, key)
    }

    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn for_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    /// Marks the failure as having come from a nested schema. Everything but
    /// the kind is left untouched.
    #[must_use]
    pub fn nested(mut self) -> Self {
        self.kind = FailureKind::NestedMappingFailure(Box::new(self.kind));
        self
    }
}
