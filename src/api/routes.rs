//! Route handlers.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::Engine as _;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, info, warn};

use super::AppState;
use crate::model::{CollectionName, SchoolSettings, Snapshot};
use crate::remote::{ImageFolder, RemoteConfig};
use crate::report::ReportCard;
use crate::storage::CacheStats;
use crate::sync::engine::{CleanupOutcome, DeletedIds, LogoKind};
use crate::sync::{ConfirmOptions, ConfirmVariant, MutationOutcome, OrphanReport, SyncError, SyncResult};

type AppStateRef = State<Arc<AppState>>;

// ============================================================================
// API TYPES
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    online: bool,
    logged_in: bool,
    cache: CacheStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    #[serde(flatten)]
    snapshot: Snapshot,
    is_loading: bool,
    online: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    content_type: Option<String>,
    /// Base64 payload, optionally as a `data:` URL.
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoUploadRequest {
    kind: LogoKind,
    #[serde(flatten)]
    upload: UploadRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUploadRequest {
    folder: ImageFolder,
    name: Option<String>,
    #[serde(flatten)]
    upload: UploadRequest,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClearIntraRequest {
    category: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResetRequest {
    keep_learning_objectives: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    status: &'static str,
    removed: OrphanReport,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPromptRequest {
    message: String,
    title: Option<String>,
    confirm_label: Option<String>,
    variant: Option<ConfirmVariant>,
}

/// Commands a UI may send over the event socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ClientCommand {
    Confirm,
    Cancel,
    Ping,
}

impl UploadRequest {
    fn decode(&self) -> SyncResult<(Bytes, String)> {
        let (prefix, payload) = match self.data.split_once(',') {
            Some((prefix, payload)) if prefix.starts_with("data:") => (Some(prefix), payload),
            _ => (None, self.data.as_str()),
        };
        let content_type = self
            .content_type
            .clone()
            .or_else(|| {
                prefix
                    .and_then(|p| p.strip_prefix("data:"))
                    .and_then(|p| p.split(';').next())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "image/jpeg".to_string());
        let body = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| SyncError::BadRequest(format!("invalid base64 payload: {}", e)))?;
        Ok((Bytes::from(body), content_type))
    }
}

fn collection(name: &str) -> SyncResult<CollectionName> {
    name.parse().map_err(SyncError::BadRequest)
}

// ============================================================================
// HTTP HANDLERS
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): AppStateRef) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        online: state.engine.is_online(),
        logged_in: state.engine.current_user().is_some(),
        cache: state.engine.cache().stats(),
    })
}

pub async fn get_state(State(state): AppStateRef) -> SyncResult<Json<StateResponse>> {
    if state.engine.current_user().is_none() {
        return Err(SyncError::Unauthenticated);
    }
    Ok(Json(StateResponse {
        snapshot: state.engine.snapshot(),
        is_loading: state.engine.is_loading(),
        online: state.engine.is_online(),
    }))
}

pub async fn get_session(State(state): AppStateRef) -> impl IntoResponse {
    Json(state.engine.session())
}

pub async fn login(
    State(state): AppStateRef,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, SyncError> {
    match state.engine.login(&payload.username, &payload.password).await? {
        Some(session) => Ok((StatusCode::OK, Json(json!(session)))),
        None => Ok((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Username atau password salah" })),
        )),
    }
}

pub async fn logout(State(state): AppStateRef) -> SyncResult<StatusCode> {
    state.engine.logout()?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_record(
    State(state): AppStateRef,
    Path(name): Path<String>,
    Json(record): Json<Value>,
) -> SyncResult<Json<MutationOutcome>> {
    Ok(Json(state.engine.add_json(collection(&name)?, record).await?))
}

pub async fn update_record(
    State(state): AppStateRef,
    Path(name): Path<String>,
    Json(record): Json<Value>,
) -> SyncResult<Json<MutationOutcome>> {
    Ok(Json(state.engine.update_json(collection(&name)?, record).await?))
}

pub async fn upsert_record(
    State(state): AppStateRef,
    Path(name): Path<String>,
    Json(record): Json<Value>,
) -> SyncResult<Json<MutationOutcome>> {
    Ok(Json(state.engine.upsert_json(collection(&name)?, record).await?))
}

pub async fn delete_record(
    State(state): AppStateRef,
    Path((name, id)): Path<(String, String)>,
) -> SyncResult<Json<MutationOutcome>> {
    Ok(Json(state.engine.delete_in(collection(&name)?, &id).await?))
}

pub async fn get_settings(State(state): AppStateRef) -> Json<SchoolSettings> {
    Json(state.engine.read(|s| s.settings.clone()))
}

pub async fn save_settings(
    State(state): AppStateRef,
    Json(settings): Json<SchoolSettings>,
) -> SyncResult<Json<MutationOutcome>> {
    Ok(Json(state.engine.set_settings(settings).await?))
}

pub async fn upload_logo(
    State(state): AppStateRef,
    Json(payload): Json<LogoUploadRequest>,
) -> SyncResult<Json<UploadResponse>> {
    let (body, content_type) = payload.upload.decode()?;
    let url = state.engine.upload_logo(payload.kind, body, &content_type).await?;
    Ok(Json(UploadResponse { url }))
}

pub async fn upload_image(
    State(state): AppStateRef,
    Json(payload): Json<ImageUploadRequest>,
) -> SyncResult<Json<UploadResponse>> {
    let (body, content_type) = payload.upload.decode()?;
    let url = state
        .engine
        .upload_image(payload.folder, body, &content_type, payload.name)
        .await?;
    Ok(Json(UploadResponse { url }))
}

pub async fn remote_status(State(state): AppStateRef) -> impl IntoResponse {
    Json(json!({ "online": state.engine.is_online() }))
}

pub async fn configure_remote(
    State(state): AppStateRef,
    Json(config): Json<RemoteConfig>,
) -> SyncResult<Json<Value>> {
    let config = RemoteConfig::new(&config.url, config.key);
    let refreshed = state.engine.configure_remote(config).await?;
    Ok(Json(json!({ "online": state.engine.is_online(), "refreshed": refreshed })))
}

pub async fn refresh(State(state): AppStateRef) -> SyncResult<Json<Value>> {
    if state.engine.current_user().is_none() {
        return Err(SyncError::Unauthenticated);
    }
    let refreshed = state.engine.refresh_data().await;
    Ok(Json(json!({ "refreshed": refreshed })))
}

pub async fn clear_class_intra(
    State(state): AppStateRef,
    Path(class_id): Path<String>,
    Json(payload): Json<ClearIntraRequest>,
) -> SyncResult<Json<DeletedIds>> {
    Ok(Json(
        state
            .engine
            .clear_class_intra_data(&class_id, &payload.category)
            .await?,
    ))
}

pub async fn clear_class_p5(
    State(state): AppStateRef,
    Path(class_id): Path<String>,
) -> SyncResult<Json<DeletedIds>> {
    Ok(Json(state.engine.clear_class_p5_data(&class_id).await?))
}

/// Blocks until the operator answers the confirmation prompt.
pub async fn reset_system(
    State(state): AppStateRef,
    payload: Option<Json<ResetRequest>>,
) -> SyncResult<StatusCode> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    state.engine.reset_system(request.keep_learning_objectives).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_orphans(State(state): AppStateRef) -> SyncResult<Json<OrphanReport>> {
    if state.engine.current_user().is_none() {
        return Err(SyncError::Unauthenticated);
    }
    Ok(Json(state.engine.compute_orphans()))
}

/// Blocks until the operator answers the confirmation prompt, when one is
/// needed.
pub async fn cleanup(State(state): AppStateRef) -> SyncResult<Json<CleanupResponse>> {
    let response = match state.engine.cleanup().await? {
        CleanupOutcome::Clean => CleanupResponse {
            status: "clean",
            removed: OrphanReport::default(),
        },
        CleanupOutcome::Declined => CleanupResponse {
            status: "declined",
            removed: OrphanReport::default(),
        },
        CleanupOutcome::Removed(report) => CleanupResponse {
            status: "removed",
            removed: report,
        },
    };
    Ok(Json(response))
}

pub async fn download_backup(State(state): AppStateRef) -> SyncResult<impl IntoResponse> {
    let document = state.engine.backup()?;
    let body = document.to_json_pretty()?;
    let disposition = format!("attachment; filename=\"{}\"", document.file_name());
    info!("Backup exported ({} bytes)", body.len());
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

/// Takes the backup file verbatim as the request body.
pub async fn restore(State(state): AppStateRef, body: String) -> SyncResult<StatusCode> {
    state.engine.restore(&body).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Opens a prompt on behalf of a page and blocks until it is answered.
pub async fn request_confirmation(
    State(state): AppStateRef,
    Json(payload): Json<ConfirmPromptRequest>,
) -> SyncResult<Json<Value>> {
    if state.engine.current_user().is_none() {
        return Err(SyncError::Unauthenticated);
    }
    let mut options = ConfirmOptions::new(payload.message);
    if let Some(title) = payload.title {
        options = options.with_title(title);
    }
    if let Some(label) = payload.confirm_label {
        options = options.with_confirm_label(label);
    }
    if let Some(variant) = payload.variant {
        options = options.with_variant(variant);
    }
    let confirmed = state.engine.confirm_action(options).await;
    Ok(Json(json!({ "confirmed": confirmed })))
}

pub async fn current_confirmation(State(state): AppStateRef) -> impl IntoResponse {
    Json(state.engine.confirmation().current())
}

pub async fn accept_confirmation(State(state): AppStateRef) -> impl IntoResponse {
    Json(json!({ "resolved": state.engine.confirmation().confirm() }))
}

pub async fn cancel_confirmation(State(state): AppStateRef) -> impl IntoResponse {
    Json(json!({ "resolved": state.engine.confirmation().cancel() }))
}

pub async fn report_card(
    State(state): AppStateRef,
    Path(student_id): Path<String>,
) -> Result<Json<ReportCard>, Response> {
    if state.engine.current_user().is_none() {
        return Err(SyncError::Unauthenticated.into_response());
    }
    state
        .engine
        .read(|s| ReportCard::build(s, &student_id))
        .map(Json)
        .ok_or_else(|| StatusCode::NOT_FOUND.into_response())
}

// ============================================================================
// WEBSOCKET HANDLER
// ============================================================================

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): AppStateRef) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_events(socket, state))
}

/// Streams engine events to one UI and applies its confirmation answers.
async fn handle_events(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut events = BroadcastStream::new(state.engine.subscribe());
    info!("Event stream opened");

    // A prompt opened before the socket connected would otherwise be missed.
    if let Some(request) = state.engine.confirmation().current() {
        let event = crate::sync::EngineEvent::ConfirmRequested { request };
        if let Ok(text) = serde_json::to_string(&event) {
            if ws_sender.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
    }

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(event)) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode event: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    warn!("Event stream lagged, {} events dropped", skipped);
                }
                None => break,
            },
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientCommand>(&text) {
                        Ok(ClientCommand::Confirm) => {
                            state.engine.confirmation().confirm();
                        }
                        Ok(ClientCommand::Cancel) => {
                            state.engine.confirmation().cancel();
                        }
                        Ok(ClientCommand::Ping) => {
                            if ws_sender.send(Message::Text(r#"{"type":"pong"}"#.to_string())).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => debug!("Ignoring client message: {}", e),
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Event socket error: {}", e);
                    break;
                }
            },
        }
    }

    info!("Event stream closed");
}
