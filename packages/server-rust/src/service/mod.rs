//! Lifecycle-managed services.
//!
//! - `registry`: the `ManagedService` trait and the `ServiceRegistry` that
//!   initializes services in order and shuts them down in reverse.
//! - `mapping`: named schemas, the mapping engine and the predicate compiler.

pub mod mapping;
pub mod registry;

pub use mapping::{BindError, MappingService};
pub use registry::{ManagedService, ServiceContext, ServiceRegistry};
