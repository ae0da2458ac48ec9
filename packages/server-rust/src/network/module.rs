//! Network module with deferred startup lifecycle.
//!
//! `new()` wires shared state, `start()` binds the TCP listener, and
//! `serve()` accepts connections until the shutdown future resolves. Callers
//! learn the bound port between `start()` and `serve()`.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use super::config::NetworkConfig;
use super::handlers::{
    filter_handler, health_handler, list_handler, liveness_handler, validate_handler, AppState,
};
use super::middleware::build_http_layers;
use crate::service::MappingService;

pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    mapping: Arc<MappingService>,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, mapping: Arc<MappingService>) -> Self {
        Self {
            config,
            listener: None,
            mapping,
        }
    }

    #[must_use]
    pub fn mapping(&self) -> Arc<MappingService> {
        Arc::clone(&self.mapping)
    }

    /// Assembles the router with all routes and middleware.
    ///
    /// Routes:
    /// - `GET /health` -- health JSON
    /// - `GET /health/live` -- liveness probe
    /// - `GET /schemas` -- registered schema names
    /// - `POST /schemas/{name}/validate` -- strict argument binding
    /// - `POST /schemas/{name}/filter` -- bound arguments compiled to a predicate
    pub fn build_router(&self) -> Router {
        let state = AppState {
            mapping: Arc::clone(&self.mapping),
            config: Arc::new(self.config.clone()),
            start_time: Instant::now(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/schemas", get(list_handler))
            .route("/schemas/{name}/validate", post(validate_handler))
            .route("/schemas/{name}/filter", post(filter_handler))
            .layer(build_http_layers(&self.config))
            .with_state(state)
    }

    /// Binds the TCP listener and returns the bound port, which differs from
    /// the configured one when port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let port = listener.local_addr()?.port();

        info!(host = %self.config.host, port, "TCP listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves requests until `shutdown` resolves, then lets in-flight
    /// requests finish.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server hits
    /// a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.build_router();
        let Some(listener) = self.listener.take() else {
            anyhow::bail!("start() must be called before serve()");
        };

        info!("serving HTTP");
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use gantry_core::{FieldSpec, Schema};
    use tower::ServiceExt;

    use super::*;
    use crate::catalog::MessageCatalog;
    use crate::config::MappingConfig;

    fn test_module() -> NetworkModule {
        let catalog = Arc::new(MessageCatalog::with_defaults("en"));
        catalog.insert("de", ".mapping.empty", "{0} fehlt");
        let mapping = Arc::new(MappingService::new(MappingConfig::default(), catalog));
        mapping
            .register_schema(
                "users",
                Schema::new()
                    .field("id", FieldSpec::typed("int").required())
                    .field("email", FieldSpec::typed("string").required().label("E-mail"))
                    .field("born", FieldSpec::typed("time")),
            )
            .unwrap();
        NetworkModule::new(NetworkConfig::default(), mapping)
    }

    async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = test_module().build_router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_route_responds() {
        let (status, json) = send(Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["schemas"], 1);
    }

    #[tokio::test]
    async fn list_route_names_schemas() {
        let (status, json) = send(Request::get("/schemas").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["schemas"], serde_json::json!(["users"]));
    }

    #[tokio::test]
    async fn validate_returns_cleaned_record() {
        let (status, json) = send(post(
            "/schemas/users/validate?id=7",
            r#"{ "email": " a@b.test ", "unknown": 1 }"#,
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({ "id": 7, "email": "a@b.test" }));
    }

    #[tokio::test]
    async fn validate_converts_times_to_request_timezone() {
        let request = Request::post("/schemas/users/validate")
            .header("content-type", "application/json")
            .header("x-timezone", "+02:00")
            .body(Body::from(
                r#"{ "id": 1, "email": "a@b", "born": "2000-01-01T00:00:00Z" }"#,
            ))
            .unwrap();
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["born"], "2000-01-01T02:00:00+02:00");
    }

    #[tokio::test]
    async fn validate_failure_is_localized() {
        let request = Request::post("/schemas/users/validate?id=1")
            .header("accept-language", "de")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "missing_argument");
        assert_eq!(json["key"], ".mapping.empty");
        assert_eq!(json["message"], "E-mail fehlt");
    }

    #[tokio::test]
    async fn unknown_schema_is_not_found() {
        let (status, json) = send(post("/schemas/nope/validate", "{}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["key"], "schema.not_found");
    }

    #[tokio::test]
    async fn filter_compiles_partial_arguments() {
        let (status, json) = send(post("/schemas/users/filter", r#"{ "id": "5" }"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["predicate"], "(id = ?)");
        assert_eq!(json["params"], serde_json::json!([5]));
        assert_eq!(json["where"], "WHERE (id = ?)");
        assert_eq!(json["order_by"], "");
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let (status, json) = send(post("/schemas/users/validate", "[1]")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "malformed_request");
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = NetworkModule::new(
            NetworkConfig {
                host: "127.0.0.1".to_string(),
                ..NetworkConfig::default()
            },
            test_module().mapping(),
        );
        let port = module.start().await.unwrap();
        assert!(port > 0);
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let err = test_module().serve(std::future::ready(())).await.unwrap_err();
        assert!(err.to_string().contains("start()"));
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_signal() {
        let mut module = NetworkModule::new(
            NetworkConfig {
                host: "127.0.0.1".to_string(),
                ..NetworkConfig::default()
            },
            test_module().mapping(),
        );
        module.start().await.unwrap();
        module.serve(std::future::ready(())).await.unwrap();
    }
}
