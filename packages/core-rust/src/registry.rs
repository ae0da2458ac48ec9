//! Name-keyed registries of field types and ciphers.
//!
//! Schemas refer to behaviour by name (`type: "int"`, `encode: "base64"`).
//! The registries resolve those names to trait objects. Unknown names resolve
//! to an identity implementation, so a lookup never fails.
//!
//! Registries are populated at startup and read concurrently afterwards;
//! registering while mappings are in flight is not a supported pattern.

use std::sync::Arc;

use dashmap::DashMap;

use crate::builtins;
use crate::schema::FieldSpec;
use crate::types::Value;

// ---------------------------------------------------------------------------
// FieldType
// ---------------------------------------------------------------------------

/// Validation and coercion behaviour for a named field type.
pub trait FieldType: Send + Sync {
    /// Returns `true` if `value` is acceptable for a field declared as this type.
    fn validate(&self, value: &Value, spec: &FieldSpec) -> bool;

    /// Coerces an already-validated (or defaulted) value into canonical form.
    fn transform(&self, value: Value, spec: &FieldSpec) -> Value;

    /// Inverse of [`transform`](Self::transform), if the type defines one.
    ///
    /// Used when shaping stored values back into their input form.
    fn restore(&self, _value: &Value, _spec: &FieldSpec) -> Option<Value> {
        None
    }
}

/// Accepts everything and passes values through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityType;

impl FieldType for IdentityType {
    fn validate(&self, _value: &Value, _spec: &FieldSpec) -> bool {
        true
    }

    fn transform(&self, value: Value, _spec: &FieldSpec) -> Value {
        value
    }

    fn restore(&self, value: &Value, _spec: &FieldSpec) -> Option<Value> {
        Some(value.clone())
    }
}

// ---------------------------------------------------------------------------
// Cipher
// ---------------------------------------------------------------------------

/// Errors raised by a [`Cipher`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CipherError {
    #[error("{cipher} cannot process a {kind} value")]
    UnsupportedValue {
        cipher: &'static str,
        kind: &'static str,
    },
    #[error("malformed {cipher} input: {reason}")]
    Malformed { cipher: &'static str, reason: String },
}

/// Reversible encoding applied to field values (`encode` after validation,
/// `decode` before it).
pub trait Cipher: Send + Sync {
    fn encode(&self, value: &Value) -> Result<Value, CipherError>;

    fn decode(&self, value: &Value) -> Result<Value, CipherError>;
}

/// Leaves values untouched in both directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCipher;

impl Cipher for IdentityCipher {
    fn encode(&self, value: &Value) -> Result<Value, CipherError> {
        Ok(value.clone())
    }

    fn decode(&self, value: &Value) -> Result<Value, CipherError> {
        Ok(value.clone())
    }
}

// ---------------------------------------------------------------------------
// TypeRegistry
// ---------------------------------------------------------------------------

/// Registry of named [`FieldType`]s.
pub struct TypeRegistry {
    types: DashMap<String, Arc<dyn FieldType>>,
    identity: Arc<dyn FieldType>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            types: DashMap::new(),
            identity: Arc::new(IdentityType),
        }
    }

    /// Registers (or replaces) the type under `name`.
    pub fn register(&self, name: impl Into<String>, field_type: Arc<dyn FieldType>) {
        self.types.insert(name.into(), field_type);
    }

    /// Returns the registered type, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn FieldType>> {
        self.types.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the registered type, falling back to [`IdentityType`].
    #[must_use]
    pub fn resolve(&self, name: &str) -> Arc<dyn FieldType> {
        self.get(name).unwrap_or_else(|| Arc::clone(&self.identity))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// CryptoRegistry
// ---------------------------------------------------------------------------

/// Registry of named [`Cipher`]s.
pub struct CryptoRegistry {
    ciphers: DashMap<String, Arc<dyn Cipher>>,
    identity: Arc<dyn Cipher>,
}

impl CryptoRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ciphers: DashMap::new(),
            identity: Arc::new(IdentityCipher),
        }
    }

    /// Registers (or replaces) the cipher under `name`.
    pub fn register(&self, name: impl Into<String>, cipher: Arc<dyn Cipher>) {
        self.ciphers.insert(name.into(), cipher);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Cipher>> {
        self.ciphers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the registered cipher, falling back to [`IdentityCipher`].
    #[must_use]
    pub fn resolve(&self, name: &str) -> Arc<dyn Cipher> {
        self.get(name).unwrap_or_else(|| Arc::clone(&self.identity))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.ciphers.contains_key(name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ciphers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for CryptoRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

/// The pair of registries consulted by the mapping engine.
#[derive(Default)]
pub struct Registries {
    pub types: TypeRegistry,
    pub ciphers: CryptoRegistry,
}

impl Registries {
    /// Empty registries: every name resolves to the identity behaviour.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registries pre-populated with the built-in types and ciphers.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registries = Self::new();
        builtins::register_types(&registries.types);
        builtins::register_ciphers(&registries.ciphers);
        registries
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
