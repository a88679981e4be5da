//! HTTP and WebSocket surface over the sync engine.
//!
//! Every page of the UI goes through these routes; engine events (notices,
//! confirmation prompts, loading state) are pushed over `/ws/events`.

pub mod routes;

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::remote::RemoteError;
use crate::sync::{SyncEngine, SyncError};

/// Shared application state
pub struct AppState {
    pub engine: Arc<SyncEngine>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self {
            engine,
            started_at: Instant::now(),
        }
    }
}

impl SyncError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SyncError::Remote(RemoteError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            SyncError::Remote(_) => StatusCode::BAD_GATEWAY,
            SyncError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SyncError::Backup(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SyncError::Cancelled => StatusCode::CONFLICT,
            SyncError::Forbidden(_) => StatusCode::FORBIDDEN,
            SyncError::Unauthenticated => StatusCode::UNAUTHORIZED,
            SyncError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health_check))
        .route("/api/state", get(routes::get_state))
        // Session
        .route("/api/session", get(routes::get_session))
        .route("/api/session/login", post(routes::login))
        .route("/api/session/logout", post(routes::logout))
        // Records
        .route(
            "/api/records/:collection",
            post(routes::add_record).put(routes::update_record),
        )
        .route("/api/records/:collection/upsert", post(routes::upsert_record))
        .route("/api/records/:collection/:id", delete(routes::delete_record))
        // Settings and assets
        .route("/api/settings", get(routes::get_settings).put(routes::save_settings))
        .route("/api/settings/logo", post(routes::upload_logo))
        .route("/api/images", post(routes::upload_image))
        .route("/api/remote", get(routes::remote_status).put(routes::configure_remote))
        // Bulk flows
        .route("/api/refresh", post(routes::refresh))
        .route("/api/classes/:class_id/clear-intra", post(routes::clear_class_intra))
        .route("/api/classes/:class_id/clear-p5", post(routes::clear_class_p5))
        .route("/api/reset", post(routes::reset_system))
        .route("/api/orphans", get(routes::list_orphans))
        .route("/api/cleanup", post(routes::cleanup))
        .route("/api/backup", get(routes::download_backup))
        .route("/api/restore", post(routes::restore))
        // Confirmation surface
        .route(
            "/api/confirm",
            get(routes::current_confirmation).post(routes::request_confirmation),
        )
        .route("/api/confirm/accept", post(routes::accept_confirmation))
        .route("/api/confirm/cancel", post(routes::cancel_confirmation))
        .route("/api/reports/:student_id", get(routes::report_card))
        .route("/ws/events", get(routes::ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
