// HTTP handlers - thin wrappers over the console service, operation bridge, logs and backup store

use super::{ApiError, AppState};
use crate::instances::DEFAULT_INSTANCE_ID;
use crate::logs::{LogKind, DEFAULT_TAIL_LINES};
use crate::operations::OperationKind;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceQuery {
    pub instance_id: Option<String>,
}

impl InstanceQuery {
    fn id(&self) -> &str {
        instance_or_default(&self.instance_id)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub instance_id: Option<String>,
    pub lines: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    pub instance_id: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RconRequest {
    pub instance_id: Option<String>,
    #[serde(default)]
    pub command: String,
}

fn instance_or_default(id: &Option<String>) -> &str {
    match id.as_deref() {
        Some(id) if !id.trim().is_empty() => id,
        _ => DEFAULT_INSTANCE_ID,
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_players(
    State(state): State<AppState>,
    Query(query): Query<InstanceQuery>,
) -> Result<Json<Value>, ApiError> {
    let players = state.console.list_players(query.id()).await?;
    Ok(Json(json!({ "players": players })))
}

pub async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<Value>, ApiError> {
    let instance_id = instance_or_default(&request.instance_id);
    state
        .console
        .send_server_message(instance_id, &request.message)
        .await?;
    Ok(Json(json!({ "message": "Broadcast sent" })))
}

pub async fn run_rcon(
    State(state): State<AppState>,
    Json(request): Json<RconRequest>,
) -> Result<Json<Value>, ApiError> {
    let command = request.command.trim();
    if command.is_empty() {
        return Err(ApiError::new(
            axum::http::StatusCode::BAD_REQUEST,
            "Command is required",
        ));
    }

    let instance_id = instance_or_default(&request.instance_id);
    tracing::info!("RCON command for {}: {}", instance_id, command);
    let output = state.console.run_rcon_command(instance_id, command).await?;
    Ok(Json(json!({ "output": output })))
}

pub async fn server_status(
    State(state): State<AppState>,
    Query(query): Query<InstanceQuery>,
) -> Result<Json<Value>, ApiError> {
    let status = state.bridge.service_status(query.id()).await?;
    Ok(Json(json!(status)))
}

pub async fn read_log(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Value>, ApiError> {
    let kind: LogKind = kind.parse()?;
    let instance_id = instance_or_default(&query.instance_id);
    let lines = state
        .logs
        .read_log(instance_id, kind, query.lines.unwrap_or(DEFAULT_TAIL_LINES))
        .await?;
    Ok(Json(json!({ "content": lines.join("\n"), "lines": lines.len() })))
}

pub async fn log_stats(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<InstanceQuery>,
) -> Result<Json<Value>, ApiError> {
    let kind: LogKind = kind.parse()?;
    let stats = state.logs.stats(query.id(), kind).await?;
    Ok(Json(json!(stats)))
}

/// Stream one server operation as SSE. The operation is cancelled when the client goes away.
pub async fn stream_operation(
    State(state): State<AppState>,
    Path(operation): Path<String>,
    Query(query): Query<InstanceQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let kind: OperationKind = operation.parse()?;
    tracing::info!("Streaming {} for instance {}", kind, query.id());

    let events = state.bridge.stream_operation(query.id(), kind)?;
    let stream = events.map(|event| Ok::<_, Infallible>(Event::default().data(event.to_json())));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub async fn list_backups(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let backups = state.backups.list().await?;
    Ok(Json(json!({ "backups": backups })))
}

pub async fn delete_backup(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let message = state.backups.delete(&filename).await?;
    Ok(Json(json!({ "message": message })))
}
