//! Gantry Core: schema-driven record mapping and SQL predicate compilation.

pub mod builtins;
pub mod context;
pub mod mapping;
pub mod predicate;
pub mod registry;
pub mod schema;
pub mod statement;
pub mod types;

/// Recursion bound shared by the mapping engine and the predicate compiler.
pub const DEFAULT_MAX_DEPTH: usize = 32;

pub use context::LocaleContext;
pub use mapping::{FailureKind, KeyCatalog, MapOptions, Mapper, MappingFailure};
pub use predicate::{
    compile, CompileError, Compiled, Compiler, Condition, ConditionMap, Filter, InList, Operand,
    Operator, SortOrder,
};
pub use registry::{Cipher, CipherError, FieldType, Registries};
pub use schema::{FieldSpec, Schema, SchemaError};
pub use statement::{rebind, Placeholder, Select, Statement};
pub use types::{Record, Value};
