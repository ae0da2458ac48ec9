//! Request argument extraction and failure rendering.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::header::ACCEPT_LANGUAGE;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gantry_core::context::parse_offset;
use gantry_core::{LocaleContext, MappingFailure, Record, Value};
use serde::Serialize;
use tracing::warn;

use crate::catalog::MessageCatalog;
use crate::service::BindError;

/// Header carrying the caller's UTC offset, e.g. `+02:00`.
pub const TIMEZONE_HEADER: &str = "x-timezone";

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// A failure rendered as `{ "code", "key", "message" }`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code} {key}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub key: String,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    key: &'a str,
    message: &'a str,
}

impl ApiError {
    #[must_use]
    pub fn new(
        status: StatusCode,
        code: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code: code.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// A malformed request: unreadable body, bad query string or header.
    #[must_use]
    pub fn malformed(key: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "malformed_request", key, message)
    }

    /// Resolves a mapping failure against the catalog.
    #[must_use]
    pub fn from_failure(
        failure: &MappingFailure,
        catalog: &MessageCatalog,
        language: Option<&str>,
    ) -> Self {
        Self::new(
            catalog.status(&failure.code),
            failure.code.clone(),
            failure.key.clone(),
            catalog.resolve(language, failure),
        )
    }

    /// Renders any binding error.
    #[must_use]
    pub fn from_bind(err: &BindError, catalog: &MessageCatalog, language: Option<&str>) -> Self {
        match err {
            BindError::UnknownSchema(name) => {
                let key = "schema.not_found";
                let message = catalog.message(language, key, &[Value::from(name.as_str())]);
                let message = if message == key {
                    format!("unknown schema `{name}`")
                } else {
                    message
                };
                Self::new(StatusCode::NOT_FOUND, "not_found", key, message)
            }
            BindError::Mapping(failure) => Self::from_failure(failure, catalog, language),
            BindError::Compile(err) => Self::new(
                StatusCode::BAD_REQUEST,
                "invalid_argument",
                "filter.depth",
                err.to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(
            status = self.status.as_u16(),
            code = %self.code,
            key = %self.key,
            "request rejected"
        );
        let body = ErrorBody {
            code: &self.code,
            key: &self.key,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

/// Request arguments: the query string merged with a JSON object body.
/// Body fields win over query parameters of the same name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(pub Record);

impl<S> FromRequest<S> for Args
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut record = Record::new();
        if req.uri().query().is_some() {
            let Query(query) = Query::<BTreeMap<String, String>>::try_from_uri(req.uri())
                .map_err(|err| ApiError::malformed("request.query", err.body_text()))?;
            record.extend(query.into_iter().map(|(k, v)| (k, Value::String(v))));
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|err| ApiError::malformed("request.body", err.body_text()))?;
        if !body.iter().all(u8::is_ascii_whitespace) {
            let json: serde_json::Value = serde_json::from_slice(&body)
                .map_err(|err| ApiError::malformed("request.body", err.to_string()))?;
            match Value::from(json) {
                Value::Map(fields) => record.extend(fields),
                other => {
                    return Err(ApiError::malformed(
                        "request.body",
                        format!("expected a JSON object, got {}", other.kind()),
                    ))
                }
            }
        }
        Ok(Self(record))
    }
}

/// Caller locale from `Accept-Language` (first tag) and `X-Timezone`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Locale(pub LocaleContext);

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let language = parts
            .headers
            .get(ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok())
            .and_then(primary_language);

        let timezone = match parts.headers.get(TIMEZONE_HEADER) {
            None => None,
            Some(value) => {
                let text = value.to_str().unwrap_or_default();
                Some(parse_offset(text).ok_or_else(|| {
                    ApiError::malformed("request.timezone", format!("invalid UTC offset `{text}`"))
                })?)
            }
        };

        Ok(Self(LocaleContext { language, timezone }))
    }
}

/// `de-CH, de;q=0.9, en;q=0.8` → `de-CH`; `*` names no language.
fn primary_language(header: &str) -> Option<String> {
    let tag = header.split(',').next()?.split(';').next()?.trim();
    (!tag.is_empty() && tag != "*").then(|| tag.to_string())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use gantry_core::record;

    use super::*;

    async fn args(req: HttpRequest<Body>) -> Result<Args, ApiError> {
        Args::from_request(req, &()).await
    }

    async fn locale(req: HttpRequest<Body>) -> Result<Locale, ApiError> {
        let (mut parts, _) = req.into_parts();
        Locale::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn args_merge_query_and_body() {
        let req = HttpRequest::post("/x?page=2&name=query")
            .header("content-type", "application/json")
            .body(Body::from(r#"{ "name": "body", "tags": ["a"] }"#))
            .unwrap();

        let Args(record) = args(req).await.unwrap();
        assert_eq!(
            record,
            record! {
                "page" => "2",
                "name" => "body",
                "tags" => vec!["a"],
            }
        );
    }

    #[tokio::test]
    async fn empty_body_yields_query_only() {
        let req = HttpRequest::get("/x?id=1").body(Body::empty()).unwrap();
        assert_eq!(args(req).await.unwrap().0, record! { "id" => "1" });
    }

    #[tokio::test]
    async fn non_object_body_is_rejected() {
        let req = HttpRequest::post("/x").body(Body::from("[1, 2]")).unwrap();
        let err = args(req).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.key, "request.body");

        let req = HttpRequest::post("/x").body(Body::from("{ nope")).unwrap();
        assert_eq!(args(req).await.unwrap_err().key, "request.body");
    }

    #[tokio::test]
    async fn locale_reads_language_and_timezone() {
        let req = HttpRequest::get("/")
            .header(ACCEPT_LANGUAGE, "de-CH, de;q=0.9, en;q=0.8")
            .header(TIMEZONE_HEADER, "+02:00")
            .body(Body::empty())
            .unwrap();
        let Locale(ctx) = locale(req).await.unwrap();
        assert_eq!(ctx.language.as_deref(), Some("de-CH"));
        assert_eq!(ctx.timezone, chrono::FixedOffset::east_opt(7200));
    }

    #[tokio::test]
    async fn locale_rejects_bad_timezone() {
        let req = HttpRequest::get("/")
            .header(TIMEZONE_HEADER, "Europe/Berlin")
            .body(Body::empty())
            .unwrap();
        assert_eq!(locale(req).await.unwrap_err().key, "request.timezone");

        for offset in ["+999999", "+1193046", "-24:00"] {
            let req = HttpRequest::get("/")
                .header(TIMEZONE_HEADER, offset)
                .body(Body::empty())
                .unwrap();
            assert_eq!(locale(req).await.unwrap_err().key, "request.timezone");
        }
    }

    #[tokio::test]
    async fn missing_headers_give_empty_locale() {
        let req = HttpRequest::get("/").body(Body::empty()).unwrap();
        assert_eq!(locale(req).await.unwrap().0, LocaleContext::new());
    }

    #[test]
    fn primary_language_parsing() {
        assert_eq!(primary_language("en-US,en;q=0.5").as_deref(), Some("en-US"));
        assert_eq!(primary_language("fr;q=0.7").as_deref(), Some("fr"));
        assert_eq!(primary_language("*"), None);
        assert_eq!(primary_language(""), None);
    }

    #[test]
    fn failures_resolve_through_catalog() {
        let catalog = MessageCatalog::with_defaults("en");
        let failure = MappingFailure::empty(".mapping.empty").with_arg("email");
        let err = ApiError::from_failure(&failure, &catalog, None);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "missing_argument");
        assert_eq!(err.message, "email is required");

        let unknown = BindError::UnknownSchema("users".into());
        let missing = ApiError::from_bind(&unknown, &catalog, None);
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        assert_eq!(missing.message, "unknown schema `users`");
    }
}
