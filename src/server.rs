//! HTTP transport.
//!
//! Each SOAP endpoint hands the raw body to the shared [`RequestDispatcher`].
//! Oversized bodies are rejected with 413 by the body-limit layer before they
//! reach the pipeline.

use crate::config::ServerConfig;
use crate::dispatcher::RequestDispatcher;
use crate::error::ServerError;
use crate::response::SOAP_CONTENT_TYPE;
use crate::store::DeviceStore;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEVICE_SERVICE_PATH: &str = "/onvif/device_service";
pub const MEDIA_SERVICE_PATH: &str = "/onvif/media_service";
pub const PTZ_SERVICE_PATH: &str = "/onvif/ptz_service";

/// Router state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<RequestDispatcher>,
    pub max_request_size: usize,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        let store = Arc::new(DeviceStore::new(config));
        Self {
            dispatcher: Arc::new(RequestDispatcher::new(config, store)),
            max_request_size: config.settings.max_request_size,
        }
    }
}

/// Build the router. All SOAP endpoints share one dispatcher, so operations
/// are routed by name regardless of the path they arrive on.
pub fn app(state: AppState) -> Router {
    let limit = state.max_request_size;

    Router::new()
        .route(DEVICE_SERVICE_PATH, post(soap_handler))
        .route(MEDIA_SERVICE_PATH, post(soap_handler))
        .route(PTZ_SERVICE_PATH, post(soap_handler))
        .route("/healthz", get(healthz_handler))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

async fn soap_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let resp = state.dispatcher.handle(&body);
    debug!(
        operation = %resp.operation,
        status = resp.status,
        fault = resp.fault.map(|f| f.as_str()).unwrap_or("none"),
        "SOAP request handled"
    );

    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, SOAP_CONTENT_TYPE)], resp.body).into_response()
}

async fn healthz_handler(State(state): State<AppState>) -> Response {
    let stats = state.dispatcher.stats();
    let json = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "operations": state.dispatcher.registry().operations(),
        "requestsProcessed": stats.requests_processed,
        "faultsReturned": stats.faults_returned,
        "authFailures": stats.auth_failures,
    });
    (StatusCode::OK, Json(json)).into_response()
}

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn serve<F>(config: &ServerConfig, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", config.settings.bind_address, config.settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "ONVIF device server listening");

    axum::serve(listener, app(AppState::new(config)))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("ONVIF device server stopped");
    Ok(())
}
