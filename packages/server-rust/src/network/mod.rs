//! HTTP surface: configuration, middleware, request binding, handlers and
//! the server lifecycle.

pub mod binding;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;

pub use binding::{ApiError, Args, Locale};
pub use config::NetworkConfig;
pub use handlers::AppState;
pub use module::NetworkModule;
