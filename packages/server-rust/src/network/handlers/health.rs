//! Health and liveness endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;

/// Reports uptime and the number of registered schemas. Always 200.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "state": "ready",
        "schemas": state.mapping.schema_names().len(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Liveness probe.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use gantry_core::Schema;

    use super::*;
    use crate::catalog::MessageCatalog;
    use crate::config::MappingConfig;
    use crate::network::NetworkConfig;
    use crate::service::MappingService;

    fn test_state() -> AppState {
        AppState {
            mapping: Arc::new(MappingService::new(
                MappingConfig::default(),
                Arc::new(MessageCatalog::new("en")),
            )),
            config: Arc::new(NetworkConfig::default()),
            start_time: Instant::now(),
        }
    }

    #[tokio::test]
    async fn health_handler_reports_schema_count() {
        let state = test_state();
        state.mapping.register_schema("a", Schema::new()).unwrap();

        let json = health_handler(State(state)).await.0;
        assert_eq!(json["state"], "ready");
        assert_eq!(json["schemas"], 1);
        assert!(json["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn liveness_handler_always_returns_200() {
        assert_eq!(liveness_handler().await, StatusCode::OK);
    }
}
