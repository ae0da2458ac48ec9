//! Schema-driven mapping engine.
//!
//! [`Mapper::map`] walks a [`Schema`] against an input [`Record`] and writes a
//! cleaned record: values are decoded, validated, converted to the caller's
//! timezone, coerced, recursively mapped through child schemas, and encoded.
//! Missing values are defaulted or reported. The first failure aborts the
//! call and nothing is written to the output; in lenient mode failing fields
//! are dropped instead.

mod failure;

pub use failure::{codes, FailureKind, KeyCatalog, MappingFailure};

use std::sync::Arc;

use tracing::{debug, trace};

use crate::context::LocaleContext;
use crate::registry::{FieldType, Registries};
use crate::schema::{FailureOverride, FieldSpec, Schema};
use crate::types::{Record, Value};
use crate::DEFAULT_MAX_DEPTH;

/// Mode switches for a mapping call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapOptions {
    /// Partial-update mode: absent fields are never defaulted or reported
    /// missing, and explicit nulls are kept as "clear this field".
    pub nullable: bool,
    /// Failing fields are omitted from the output instead of failing the call.
    pub lenient: bool,
}

impl MapOptions {
    /// Strict, non-nullable mapping.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            nullable: false,
            lenient: false,
        }
    }

    /// Lenient mapping, as used for shaping responses.
    #[must_use]
    pub const fn lenient() -> Self {
        Self {
            nullable: false,
            lenient: true,
        }
    }

    /// Partial-update mapping.
    #[must_use]
    pub const fn partial() -> Self {
        Self {
            nullable: true,
            lenient: false,
        }
    }
}

/// Which failure family a field failure belongs to.
#[derive(Debug, Clone, Copy)]
enum Stem {
    Empty,
    Error,
}

impl Stem {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Error => "error",
        }
    }
}

/// Outcome of mapping a single field.
enum FieldOutcome {
    Write(Value),
    Omit,
}

// ---------------------------------------------------------------------------
// Mapper
// ---------------------------------------------------------------------------

/// The mapping engine. Cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct Mapper {
    registries: Arc<Registries>,
    catalog: Option<Arc<dyn KeyCatalog>>,
    max_depth: usize,
}

impl Mapper {
    #[must_use]
    pub fn new(registries: Arc<Registries>) -> Self {
        Self {
            registries,
            catalog: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Consults `catalog` to decide between schema-coded and generic failure keys.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn KeyCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Maximum nesting of child schemas.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub const fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Maps `input` through `schema`, extending `output` with the result.
    ///
    /// On failure `output` is left untouched.
    ///
    /// # Errors
    ///
    /// The first field failure, unless `options.lenient` is set.
    pub fn map(
        &self,
        schema: &Schema,
        input: &Record,
        output: &mut Record,
        options: MapOptions,
        locale: &LocaleContext,
    ) -> Result<(), MappingFailure> {
        let mapped = self.map_record(schema, input, options, locale, 0)?;
        output.extend(mapped);
        Ok(())
    }

    /// Convenience wrapper returning a fresh record.
    ///
    /// # Errors
    ///
    /// See [`Mapper::map`].
    pub fn map_new(
        &self,
        schema: &Schema,
        input: &Record,
        options: MapOptions,
        locale: &LocaleContext,
    ) -> Result<Record, MappingFailure> {
        self.map_record(schema, input, options, locale, 0)
    }

    /// Reverses type coercion for every typed field present in `record`.
    ///
    /// Fields whose type defines no inverse, and fields absent from the
    /// schema, are copied unchanged.
    #[must_use]
    pub fn restore(&self, schema: &Schema, record: &Record) -> Record {
        record
            .iter()
            .map(|(name, value)| {
                let restored = schema
                    .get(name)
                    .and_then(|spec| {
                        let type_name = spec.field_type.as_deref()?;
                        self.registries.types.resolve(type_name).restore(value, spec)
                    })
                    .unwrap_or_else(|| value.clone());
                (name.clone(), restored)
            })
            .collect()
    }

    fn map_record(
        &self,
        schema: &Schema,
        input: &Record,
        options: MapOptions,
        locale: &LocaleContext,
        depth: usize,
    ) -> Result<Record, MappingFailure> {
        let mut output = Record::new();
        for (name, spec) in schema.iter() {
            match self.map_field(schema, name, spec, input, options, locale, depth)? {
                FieldOutcome::Write(value) => {
                    output.insert(name.clone(), value);
                }
                FieldOutcome::Omit => {}
            }
        }
        Ok(output)
    }

    #[allow(clippy::too_many_arguments)]
    fn map_field(
        &self,
        schema: &Schema,
        name: &str,
        spec: &FieldSpec,
        input: &Record,
        options: MapOptions,
        locale: &LocaleContext,
        depth: usize,
    ) -> Result<FieldOutcome, MappingFailure> {
        let raw = input.get(name);
        let explicit_null = matches!(raw, Some(Value::Null));
        let absent = raw.is_none_or(|value| value.is_absent(spec.required));

        if absent {
            return self.map_absent(schema, name, spec, explicit_null, options, locale, depth);
        }

        let mut value = raw.cloned().unwrap_or_default();

        let mut decoded = false;
        if let Some(cipher) = &spec.decode {
            match self.registries.ciphers.resolve(cipher).decode(&value) {
                Ok(plain) => {
                    value = plain;
                    decoded = true;
                }
                Err(err) => debug!(
                    field = name,
                    cipher = %cipher,
                    error = %err,
                    "decode failed, keeping raw value"
                ),
            }
        }

        let field_type = spec
            .field_type
            .as_deref()
            .map(|type_name| self.registries.types.resolve(type_name));

        if field_type.is_some() || spec.validate.is_some() || spec.transform.is_some() {
            if !validate(field_type.as_deref(), spec, &value) {
                if options.lenient {
                    debug!(field = name, kind = value.kind(), "invalid value dropped");
                    return Ok(FieldOutcome::Omit);
                }
                return Err(self.failure(schema, name, spec, Stem::Error));
            }
            value = match locale.timezone {
                // Coercion can turn strings into times, so convert on both sides.
                Some(timezone) => {
                    transform(field_type.as_deref(), spec, value.with_timezone(timezone))
                        .with_timezone(timezone)
                }
                None => transform(field_type.as_deref(), spec, value),
            };
        }

        let Some(value) = self.map_children(schema, name, spec, value, options, locale, depth)?
        else {
            return Ok(FieldOutcome::Omit);
        };

        if decoded {
            return Ok(FieldOutcome::Write(value));
        }
        self.finish(schema, name, spec, value, options)
    }

    #[allow(clippy::too_many_arguments)]
    fn map_absent(
        &self,
        schema: &Schema,
        name: &str,
        spec: &FieldSpec,
        explicit_null: bool,
        options: MapOptions,
        locale: &LocaleContext,
        depth: usize,
    ) -> Result<FieldOutcome, MappingFailure> {
        if spec.required && spec.default.is_none() && !options.nullable {
            if options.lenient {
                debug!(field = name, "required field missing, skipped");
                return Ok(FieldOutcome::Omit);
            }
            return Err(self.failure(schema, name, spec, Stem::Empty));
        }

        let keep_null = explicit_null && (options.nullable || spec.nullable);

        if let Some(default) = &spec.default {
            if !options.nullable && !keep_null {
                let mut value = default.materialize();
                trace!(field = name, kind = value.kind(), "default applied");
                if let Some(type_name) = &spec.field_type {
                    let field_type = self.registries.types.resolve(type_name);
                    value = transform(Some(field_type.as_ref()), spec, value);
                }
                let Some(value) =
                    self.map_children(schema, name, spec, value, options, locale, depth)?
                else {
                    return Ok(FieldOutcome::Omit);
                };
                return self.finish(schema, name, spec, value, options);
            }
        }

        if keep_null {
            return Ok(FieldOutcome::Write(Value::Null));
        }
        Ok(FieldOutcome::Omit)
    }

    /// Applies the child schema, if any. `None` means the field is dropped.
    #[allow(clippy::too_many_arguments)]
    fn map_children(
        &self,
        schema: &Schema,
        name: &str,
        spec: &FieldSpec,
        value: Value,
        options: MapOptions,
        locale: &LocaleContext,
        depth: usize,
    ) -> Result<Option<Value>, MappingFailure> {
        let Some(children) = &spec.children else {
            return Ok(Some(value));
        };

        if depth + 1 > self.max_depth {
            if options.lenient {
                return Ok(None);
            }
            return Err(MappingFailure::new(
                FailureKind::DepthExceeded,
                codes::INVALID_ARGUMENT,
                format!("{}.mapping.depth", schema.namespace),
            )
            .with_arg(i64::try_from(self.max_depth).unwrap_or(i64::MAX))
            .for_field(name));
        }

        let items = match value {
            Value::Map(record) => {
                return match self.map_record(children, &record, options, locale, depth + 1) {
                    Ok(mapped) => Ok(Some(Value::Map(mapped))),
                    Err(failure) => Err(failure.nested()),
                };
            }
            Value::Array(items) => items,
            other => {
                if options.lenient {
                    debug!(
                        field = name,
                        kind = other.kind(),
                        "non-object value for nested schema dropped"
                    );
                    return Ok(None);
                }
                return Err(self.failure(schema, name, spec, Stem::Error));
            }
        };

        let mut mapped = Vec::with_capacity(items.len());
        for item in items {
            let Value::Map(record) = item else {
                if options.lenient {
                    return Ok(None);
                }
                return Err(self.failure(schema, name, spec, Stem::Error));
            };
            let element = self
                .map_record(children, &record, options, locale, depth + 1)
                .map_err(MappingFailure::nested)?;
            mapped.push(Value::Map(element));
        }
        Ok(Some(Value::Array(mapped)))
    }

    /// Encodes the value if the field asks for it.
    fn finish(
        &self,
        schema: &Schema,
        name: &str,
        spec: &FieldSpec,
        value: Value,
        options: MapOptions,
    ) -> Result<FieldOutcome, MappingFailure> {
        let Some(cipher) = &spec.encode else {
            return Ok(FieldOutcome::Write(value));
        };
        match self.registries.ciphers.resolve(cipher).encode(&value) {
            Ok(encoded) => Ok(FieldOutcome::Write(encoded)),
            Err(err) => {
                debug!(field = name, cipher = %cipher, error = %err, "encode failed");
                if options.lenient {
                    Ok(FieldOutcome::Omit)
                } else {
                    Err(self.failure(schema, name, spec, Stem::Error))
                }
            }
        }
    }

    /// Builds the failure for `name`: field override first, then the
    /// schema-coded key if the catalog knows it, then the generic key with the
    /// field's display name as argument.
    fn failure(&self, schema: &Schema, name: &str, spec: &FieldSpec, stem: Stem) -> MappingFailure {
        let (over, kind, code) = match stem {
            Stem::Empty => (
                &spec.on_empty,
                FailureKind::EmptyRequiredField,
                codes::MISSING_ARGUMENT,
            ),
            Stem::Error => (
                &spec.on_invalid,
                FailureKind::InvalidFieldValue,
                codes::INVALID_ARGUMENT,
            ),
        };
        let label = spec.label.as_deref().unwrap_or(name);

        let key = match over {
            Some(FailureOverride::Failure(failure)) => return failure.clone(),
            Some(FailureOverride::Key(key)) => key.clone(),
            None => {
                let coded = format!("{}.mapping.{}.{name}", schema.namespace, stem.as_str());
                if self.catalog.as_ref().is_some_and(|c| c.contains(&coded)) {
                    coded
                } else {
                    format!("{}.mapping.{}", schema.namespace, stem.as_str())
                }
            }
        };
        MappingFailure::new(kind, code, key)
            .with_arg(label)
            .for_field(name)
    }
}

fn validate(field_type: Option<&dyn FieldType>, spec: &FieldSpec, value: &Value) -> bool {
    match (&spec.validate, field_type) {
        (Some(validate), _) => validate(value, spec),
        (None, Some(field_type)) => field_type.validate(value, spec),
        (None, None) => true,
    }
}

fn transform(field_type: Option<&dyn FieldType>, spec: &FieldSpec, value: Value) -> Value {
    match (&spec.transform, field_type) {
        (Some(transform), _) => transform(value, spec),
        (None, Some(field_type)) => field_type.transform(value, spec),
        (None, None) => value,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
