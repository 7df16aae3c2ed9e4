//! HTTP read layer over the provider store.
//!
//! Serves `GET /languages` and `GET /languages/{id}`. Handlers only read the
//! store; updates happen on the watcher's dispatch thread.

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_TYPE, COOKIE};
use axum::http::{HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use thiserror::Error;
use tower_http::cors::CorsLayer;

use crate::config::WebServerConfig;
use crate::provider::{LanguageModel, ProviderStore};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid CORS origin '{origin}': {reason}")]
    InvalidOrigin { origin: String, reason: String },

    #[error("Cannot bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Build the router. CORS is only enabled in debug mode.
pub fn router(store: Arc<ProviderStore>, config: &WebServerConfig) -> Result<Router, ServerError> {
    let mut app = Router::new()
        .route("/languages", get(list_languages).options(preflight))
        .route("/languages/{id}", get(get_language).options(preflight))
        .layer(axum::middleware::from_fn(log_requests))
        .with_state(store);

    if config.debug {
        app = app.layer(cors_layer(&config.cors_origin)?);
    }

    Ok(app)
}

/// Bind `config.address` and serve until `shutdown` resolves.
pub async fn serve<F>(
    store: Arc<ProviderStore>,
    config: &WebServerConfig,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(store, config)?;

    let listener = tokio::net::TcpListener::bind(&config.address)
        .await
        .map_err(|source| ServerError::Bind {
            address: config.address.clone(),
            source,
        })?;

    crate::log_event!("http", "listening", "{}", config.address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    crate::log_event!("http", "stopped");
    Ok(())
}

fn cors_layer(origin: &str) -> Result<CorsLayer, ServerError> {
    let origin_header =
        HeaderValue::from_str(origin).map_err(|e| ServerError::InvalidOrigin {
            origin: origin.to_string(),
            reason: e.to_string(),
        })?;

    Ok(CorsLayer::new()
        .allow_origin(origin_header)
        .allow_methods([Method::GET])
        .allow_headers([CONTENT_TYPE, COOKIE])
        .allow_credentials(true))
}

async fn log_requests(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;
    crate::debug_event!("http", "request", "{method} {uri} -> {}", response.status());
    response
}

async fn list_languages(State(store): State<Arc<ProviderStore>>) -> Json<Vec<Arc<LanguageModel>>> {
    let mut languages: Vec<_> = store.languages().into_values().collect();
    languages.sort_by(|a, b| a.id.cmp(&b.id));
    Json(languages)
}

async fn get_language(
    State(store): State<Arc<ProviderStore>>,
    Path(id): Path<String>,
) -> Response {
    match store.language(&id) {
        Some(lang) => Json(lang).into_response(),
        None => fail(StatusCode::NOT_FOUND, "not found"),
    }
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

fn fail(code: StatusCode, message: &str) -> Response {
    (
        code,
        Json(serde_json::json!({
            "code": code.as_u16(),
            "error": message,
        })),
    )
        .into_response()
}
