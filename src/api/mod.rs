pub mod ingredients;
pub mod markets;
pub mod meals;
pub mod patch;
pub mod query;
pub mod types;

use std::sync::Arc;

use axum::{
    http::{header, HeaderMap, Method},
    routing::get,
    Json, Router,
};
use sea_orm::DatabaseConnection;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Application state shared across handlers
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Config,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        Self { db, config }
    }

    /// Base URL for retrieval links (configured, else from the Host header).
    /// The scheme comes from `X-Forwarded-Proto` when a proxy sets it, and is
    /// otherwise `https` only for port 443.
    pub fn base_url(&self, headers: &HeaderMap) -> String {
        if let Some(base) = &self.config.public_base_url {
            return base.clone();
        }

        let forwarded_proto = headers
            .get(FORWARDED_PROTO)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| v == "http" || v == "https");

        headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(|host| match forwarded_proto.as_deref() {
                Some(proto) => format!("{}://{}", proto, host),
                None if host.ends_with(":443") => {
                    format!("https://{}", host.trim_end_matches(":443"))
                }
                None => format!("http://{}", host),
            })
            .unwrap_or_else(|| format!("http://localhost:{}", self.config.port))
    }
}

/// Build the full application router
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .nest("/ingredients", ingredients::router())
        .nest("/meals", meals::router())
        .nest("/markets", markets::router())
        // Health check
        .route("/health", get(health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Health check endpoint
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
pub(crate) mod test_support {
    //! In-memory app and request helpers for handler tests.

    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    pub const BASE_URL: &str = "http://test.local";

    pub async fn test_state() -> Arc<AppState> {
        let db = crate::db::connect("sqlite::memory:").await.unwrap();
        crate::db::create_tables(&db).await.unwrap();

        let config = Config {
            public_base_url: Some(BASE_URL.to_string()),
            ..Config::default()
        };

        Arc::new(AppState::new(db, config))
    }

    pub async fn test_app() -> Router {
        router(test_state().await)
    }

    /// Send one request and decode the JSON reply (`Null` for an empty body)
    pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, json)
    }

    /// Last path segment of a retrieval URL
    pub fn id_from_url(url: &Value) -> String {
        url.as_str()
            .and_then(|u| u.rsplit('/').next())
            .unwrap()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health() {
        let app = test_app().await;
        let (status, body) = send(&app, Method::GET, "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_base_url_from_host_header() {
        let db = crate::db::connect("sqlite::memory:").await.unwrap();
        let state = AppState::new(db, Config::default());

        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "gfood.example".parse().unwrap());
        assert_eq!(state.base_url(&headers), "http://gfood.example");

        headers.insert(header::HOST, "127.0.0.1".parse().unwrap());
        assert_eq!(state.base_url(&headers), "http://127.0.0.1");

        headers.insert(header::HOST, "gfood.example:443".parse().unwrap());
        assert_eq!(state.base_url(&headers), "https://gfood.example");

        headers.insert(header::HOST, "localhost:5000".parse().unwrap());
        assert_eq!(state.base_url(&headers), "http://localhost:5000");

        headers.insert(header::HOST, "gfood.example".parse().unwrap());
        headers.insert(FORWARDED_PROTO, "HTTPS, http".parse().unwrap());
        assert_eq!(state.base_url(&headers), "https://gfood.example");

        assert_eq!(state.base_url(&HeaderMap::new()), "http://localhost:5000");
    }
}
