//! Declarative field schemas consumed by the mapping engine.
//!
//! A [`Schema`] maps field names to [`FieldSpec`]s. Schemas are built once
//! (in code via the builder methods, or from a JSON document via
//! [`Schema::from_json`]) and shared read-only across any number of mapping
//! calls.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use crate::mapping::MappingFailure;
use crate::registry::Registries;
use crate::types::{Record, Value};

/// Per-field validator override.
pub type ValidateFn = Arc<dyn Fn(&Value, &FieldSpec) -> bool + Send + Sync>;

/// Per-field coercer override.
pub type TransformFn = Arc<dyn Fn(Value, &FieldSpec) -> Value + Send + Sync>;

/// Zero-argument default generator.
pub type GeneratorFn = Arc<dyn Fn() -> DefaultSeed + Send + Sync>;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Raw shape produced by a default constant or generator.
///
/// Narrow numeric shapes are kept distinct here and normalized by
/// [`DefaultSeed::normalize`]: `i8`/`i16`/`i32` widen to `i64`, `f32` widens
/// to `f64`, and lists normalize element-wise.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultSeed {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Str(String),
    Time(DateTime<FixedOffset>),
    List(Vec<DefaultSeed>),
    Value(Value),
}

impl DefaultSeed {
    /// Converts the seed into a [`Value`], promoting numeric subtypes.
    #[must_use]
    pub fn normalize(self) -> Value {
        match self {
            Self::I8(n) => Value::Int(i64::from(n)),
            Self::I16(n) => Value::Int(i64::from(n)),
            Self::I32(n) => Value::Int(i64::from(n)),
            Self::I64(n) => Value::Int(n),
            Self::F32(x) => Value::Float(f64::from(x)),
            Self::F64(x) => Value::Float(x),
            Self::Bool(b) => Value::Bool(b),
            Self::Str(s) => Value::String(s),
            Self::Time(t) => Value::Time(t),
            Self::List(items) => Value::Array(items.into_iter().map(Self::normalize).collect()),
            Self::Value(v) => v,
        }
    }
}

macro_rules! seed_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for DefaultSeed {
                fn from(v: $t) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

seed_from!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    bool => Bool,
    String => Str,
    DateTime<FixedOffset> => Time,
    Value => Value,
);

impl From<&str> for DefaultSeed {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl<T: Into<DefaultSeed>> From<Vec<T>> for DefaultSeed {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// Default for an absent field: a constant or a lazily invoked generator.
#[derive(Clone)]
pub enum DefaultValue {
    Const(DefaultSeed),
    Generator(GeneratorFn),
}

impl DefaultValue {
    /// Produces the default value, invoking the generator if there is one.
    #[must_use]
    pub fn materialize(&self) -> Value {
        match self {
            Self::Const(seed) => seed.clone().normalize(),
            Self::Generator(generate) => generate().normalize(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(seed) => f.debug_tuple("Const").field(seed).finish(),
            Self::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure overrides
// ---------------------------------------------------------------------------

/// Replacement for the generic failure of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureOverride {
    /// Use this failure key instead of the schema-coded one.
    Key(String),
    /// Return this failure as-is.
    Failure(MappingFailure),
}

impl From<&str> for FailureOverride {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for FailureOverride {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<MappingFailure> for FailureOverride {
    fn from(failure: MappingFailure) -> Self {
        Self::Failure(failure)
    }
}

// ---------------------------------------------------------------------------
// FieldSpec
// ---------------------------------------------------------------------------

/// Declarative description of one schema field.
#[derive(Clone, Default)]
pub struct FieldSpec {
    /// Name into the type registry.
    pub field_type: Option<String>,
    /// Missing or empty values fail unless a default exists.
    pub required: bool,
    /// Explicit nulls are kept as null instead of defaulting.
    pub nullable: bool,
    pub default: Option<DefaultValue>,
    /// Cipher applied before validation.
    pub decode: Option<String>,
    /// Cipher applied after validation, unless the field was decoded.
    pub encode: Option<String>,
    /// Schema applied to a nested object or to each object of an array.
    pub children: Option<Arc<Schema>>,
    pub on_empty: Option<FailureOverride>,
    pub on_invalid: Option<FailureOverride>,
    pub validate: Option<ValidateFn>,
    pub transform: Option<TransformFn>,
    /// Display name passed as the argument of generic failures.
    pub label: Option<String>,
    /// Parameters read by validators (`min`, `max`, `max_len`, ...).
    pub params: Record,
}

impl FieldSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `FieldSpec::new().of_type(name)`.
    #[must_use]
    pub fn typed(name: impl Into<String>) -> Self {
        Self::new().of_type(name)
    }

    #[must_use]
    pub fn of_type(mut self, name: impl Into<String>) -> Self {
        self.field_type = Some(name.into());
        self
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, seed: impl Into<DefaultSeed>) -> Self {
        self.default = Some(DefaultValue::Const(seed.into()));
        self
    }

    #[must_use]
    pub fn default_with<F>(mut self, generate: F) -> Self
    where
        F: Fn() -> DefaultSeed + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Generator(Arc::new(generate)));
        self
    }

    #[must_use]
    pub fn decode(mut self, cipher: impl Into<String>) -> Self {
        self.decode = Some(cipher.into());
        self
    }

    #[must_use]
    pub fn encode(mut self, cipher: impl Into<String>) -> Self {
        self.encode = Some(cipher.into());
        self
    }

    #[must_use]
    pub fn children(mut self, schema: Schema) -> Self {
        self.children = Some(Arc::new(schema));
        self
    }

    #[must_use]
    pub fn on_empty(mut self, over: impl Into<FailureOverride>) -> Self {
        self.on_empty = Some(over.into());
        self
    }

    #[must_use]
    pub fn on_invalid(mut self, over: impl Into<FailureOverride>) -> Self {
        self.on_invalid = Some(over.into());
        self
    }

    #[must_use]
    pub fn validate_with<F>(mut self, validate: F) -> Self
    where
        F: Fn(&Value, &Self) -> bool + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }

    #[must_use]
    pub fn transform_with<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value, &Self) -> Value + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Looks up a validator parameter.
    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("field_type", &self.field_type)
            .field("required", &self.required)
            .field("nullable", &self.nullable)
            .field("default", &self.default)
            .field("decode", &self.decode)
            .field("encode", &self.encode)
            .field("children", &self.children)
            .field("on_empty", &self.on_empty)
            .field("on_invalid", &self.on_invalid)
            .field("validate", &self.validate.as_ref().map(|_| ".."))
            .field("transform", &self.transform.as_ref().map(|_| ".."))
            .field("label", &self.label)
            .field("params", &self.params)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Errors raised while building or verifying a schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid schema document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("field `{field}` uses unregistered type `{name}`")]
    UnknownType { field: String, name: String },
    #[error("field `{field}` uses unregistered cipher `{name}`")]
    UnknownCipher { field: String, name: String },
}

/// Ordered mapping of field name to [`FieldSpec`].
#[derive(Debug, Clone, Default)]
pub struct Schema {
    /// Prefix for schema-coded failure keys (`<namespace>.mapping.empty.<field>`).
    pub namespace: String,
    fields: BTreeMap<String, FieldSpec>,
}

impl Schema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn namespaced(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldSpec)> {
        self.fields.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parses a schema document.
    ///
    /// ```json
    /// { "namespace": "user",
    ///   "fields": { "age": { "type": "int", "required": true, "params": { "min": 0 } } } }
    /// ```
    ///
    /// # Errors
    ///
    /// [`SchemaError::Parse`] for malformed JSON or unknown keys anywhere in
    /// the document.
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let doc: SchemaDocument = serde_json::from_str(text)?;
        Ok(doc.into_schema())
    }

    /// Checks that every type and cipher name (recursively) is registered.
    ///
    /// Mapping itself never requires this: unknown names fall back to the
    /// identity behaviour. Call it at startup to catch typos.
    ///
    /// # Errors
    ///
    /// The first unregistered type or cipher name.
    pub fn verify(&self, registries: &Registries) -> Result<(), SchemaError> {
        for (name, spec) in &self.fields {
            if let Some(type_name) = &spec.field_type {
                if !registries.types.contains(type_name) {
                    return Err(SchemaError::UnknownType {
                        field: name.clone(),
                        name: type_name.clone(),
                    });
                }
            }
            for cipher in [&spec.decode, &spec.encode].into_iter().flatten() {
                if !registries.ciphers.contains(cipher) {
                    return Err(SchemaError::UnknownCipher {
                        field: name.clone(),
                        name: cipher.clone(),
                    });
                }
            }
            if let Some(children) = &spec.children {
                children.verify(registries)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON documents
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaDocument {
    #[serde(default)]
    namespace: String,
    fields: BTreeMap<String, FieldDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldDocument {
    #[serde(rename = "type", default)]
    field_type: Option<String>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    nullable: bool,
    #[serde(default)]
    default: Option<serde_json::Value>,
    #[serde(default)]
    decode: Option<String>,
    #[serde(default)]
    encode: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    params: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    on_empty: Option<String>,
    #[serde(default)]
    on_invalid: Option<String>,
    #[serde(default)]
    children: Option<BTreeMap<String, FieldDocument>>,
}

impl SchemaDocument {
    fn into_schema(self) -> Schema {
        fields_into_schema(&self.namespace, self.fields)
    }
}

fn fields_into_schema(namespace: &str, fields: BTreeMap<String, FieldDocument>) -> Schema {
    fields
        .into_iter()
        .fold(Schema::namespaced(namespace), |schema, (name, doc)| {
            schema.field(name, doc.into_spec(namespace))
        })
}

impl FieldDocument {
    fn into_spec(self, namespace: &str) -> FieldSpec {
        FieldSpec {
            field_type: self.field_type,
            required: self.required,
            nullable: self.nullable,
            default: self
                .default
                .map(|json| DefaultValue::Const(DefaultSeed::Value(Value::from(json)))),
            decode: self.decode,
            encode: self.encode,
            children: self
                .children
                .map(|fields| Arc::new(fields_into_schema(namespace, fields))),
            on_empty: self.on_empty.map(FailureOverride::Key),
            on_invalid: self.on_invalid.map(FailureOverride::Key),
            validate: None,
            transform: None,
            label: self.label,
            params: self
                .params
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
