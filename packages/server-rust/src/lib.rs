//! Gantry Server: configuration, logging, service lifecycle and HTTP
//! argument binding around the `gantry-core` mapping engine.

pub mod catalog;
pub mod config;
pub mod logging;
pub mod network;
pub mod service;

pub use catalog::MessageCatalog;
pub use config::{LogConfig, LogFormat, MappingConfig, ServerConfig};
pub use logging::init_tracing;
pub use network::{ApiError, NetworkConfig, NetworkModule};
pub use service::{BindError, ManagedService, MappingService, ServiceContext, ServiceRegistry};
