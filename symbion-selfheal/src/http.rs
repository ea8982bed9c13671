/**
 * REST API - HTTP surface of the selfheal kernel
 *
 * ROLE:
 * Thin request/response mapping between the dashboard and the kernel.
 * No decision logic lives here.
 *
 * ROUTES:
 * - /health, /system/health, /system/status, /snapshot
 * - /processes, /files (read, patch, targeted repair)
 * - /logs (read, append)
 * - /faults/inject, /faults/{kind}, /heal
 *
 * SECURITY:
 * - When SELFHEAL_API_KEY is set, the x-api-key header must match on every
 *   route except /health
 */

use crate::error::KernelError;
use crate::health::KernelHealth;
use crate::kernel::Kernel;
use crate::models::{
    DashboardSnapshot, Fault, FaultKind, FileEntry, FilePatch, HealResult, LogEntry, NewLogEntry, Process,
    ProcessPatch, SystemHealth,
};
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::warn;

impl IntoResponse for KernelError {
    fn into_response(self) -> Response {
        let code = match &self {
            KernelError::ProcessNotFound(_) | KernelError::FileNotFound(_) => StatusCode::NOT_FOUND,
            KernelError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            KernelError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (code, Json(serde_json::json!({ "ok": false, "error": self.to_string() }))).into_response()
    }
}

async fn require_api_key(req: Request, next: Next) -> Result<Response, StatusCode> {
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let expected = std::env::var("SELFHEAL_API_KEY").unwrap_or_default();
    if expected.is_empty() {
        return Ok(next.run(req).await);
    }

    let ok = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !ok {
        warn!("[http] rejected request to {} (bad api key)", req.uri().path());
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

#[derive(Clone)]
pub struct AppState {
    pub kernel: Arc<Kernel>,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_kernel_health))
        .route("/system/status", get(get_system_status))
        .route("/snapshot", get(get_snapshot))
        .route("/processes", get(get_processes))
        .route("/processes/{id}", get(get_process).patch(patch_process))
        .route("/processes/{id}/repair", post(repair_process))
        .route("/files", get(get_files))
        .route("/files/{id}", get(get_file).patch(patch_file))
        .route("/files/{id}/repair", post(repair_file))
        .route("/logs", get(get_logs).post(post_log))
        .route("/faults/inject", post(inject_faults))
        .route("/faults/{kind}", post(inject_fault))
        .route("/heal", post(heal_all))
        .with_state(app_state)
        .layer(middleware::from_fn(require_api_key))
}

// GET /system/health (kernel counters)
async fn get_kernel_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.kernel.kernel_health())
}

// GET /system/status (simulated OS verdict)
async fn get_system_status(State(app): State<AppState>) -> Json<SystemHealth> {
    Json(app.kernel.health())
}

async fn get_snapshot(State(app): State<AppState>) -> Json<DashboardSnapshot> {
    Json(app.kernel.snapshot())
}

async fn get_processes(State(app): State<AppState>) -> Json<Vec<Process>> {
    Json(app.kernel.processes())
}

async fn get_process(State(app): State<AppState>, Path(id): Path<u32>) -> Result<Json<Process>, KernelError> {
    app.kernel.process(id).map(Json)
}

async fn patch_process(
    State(app): State<AppState>,
    Path(id): Path<u32>,
    Json(patch): Json<ProcessPatch>,
) -> Result<Json<Process>, KernelError> {
    app.kernel.update_process(id, &patch).map(Json)
}

async fn repair_process(State(app): State<AppState>, Path(id): Path<u32>) -> Json<HealResult> {
    Json(app.kernel.repair_process(id))
}

async fn get_files(State(app): State<AppState>) -> Json<Vec<FileEntry>> {
    Json(app.kernel.files())
}

async fn get_file(State(app): State<AppState>, Path(id): Path<String>) -> Result<Json<FileEntry>, KernelError> {
    app.kernel.file(&id).map(Json)
}

async fn patch_file(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<FilePatch>,
) -> Result<Json<FileEntry>, KernelError> {
    app.kernel.update_file(&id, &patch).map(Json)
}

async fn repair_file(State(app): State<AppState>, Path(id): Path<String>) -> Json<HealResult> {
    Json(app.kernel.repair_file(&id))
}

async fn get_logs(State(app): State<AppState>) -> Json<Vec<LogEntry>> {
    Json(app.kernel.logs())
}

async fn post_log(
    State(app): State<AppState>,
    Json(entry): Json<NewLogEntry>,
) -> Result<(StatusCode, Json<LogEntry>), KernelError> {
    let stored = app.kernel.append_log(entry)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn inject_faults(State(app): State<AppState>) -> Json<Vec<Fault>> {
    Json(app.kernel.inject_faults())
}

// POST /faults/{kind} (single forced fault)
async fn inject_fault(
    State(app): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<serde_json::Value>, KernelError> {
    let kind: FaultKind = kind.parse().map_err(KernelError::InvalidInput)?;
    let fault = app.kernel.inject_fault(kind);
    Ok(Json(serde_json::json!({ "applied": fault.is_some(), "fault": fault })))
}

async fn heal_all(State(app): State<AppState>) -> Json<Vec<HealResult>> {
    Json(app.kernel.heal_all())
}
