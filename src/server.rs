//!
//! tabweave HTTP server
//! --------------------
//! Axum-based HTTP API in front of the pipeline.
//!
//! Responsibilities:
//! - `GET /` health probe.
//! - `POST /process` accepting a request plan, running it on the blocking pool and
//!   answering with the output destination, or with the error kind mapped to a status.
//! - Startup folder checks and inventory logs.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::{error, info, warn};

use crate::config::{EngineConfig, ServerConfig};
use crate::error::AppError;
use crate::storage::FileStore;

pub mod plan;
pub mod query;
pub mod exec;

use exec::Pipeline;
use plan::RequestPlan;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self { Self { pipeline } }

    /// File-backed state: inputs from `input_dir`, output to `output_dir/output_file`.
    pub fn from_config(config: &ServerConfig, engine: EngineConfig) -> Self {
        let store = Arc::new(
            FileStore::new(&config.input_dir, config.output_path()).with_unique_output(config.unique_output),
        );
        Self::new(Pipeline::new(engine, store.clone(), store))
    }
}

fn log_startup_folders(config: &ServerConfig) {
    let cwd = std::env::current_dir().ok();
    info!(
        target: "startup",
        "tabweave starting. cwd={:?}, input_dir={:?} (exists={}), output={:?}, unique_output={}",
        cwd, config.input_dir, config.input_dir.exists(), config.output_path(), config.unique_output
    );
    if let Ok(entries) = std::fs::read_dir(&config.input_dir) {
        let mut names: Vec<String> = entries.flatten().map(|e| e.file_name().to_string_lossy().to_string()).collect();
        names.sort();
        info!(target: "startup", "input tables available: {:?}", names);
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "tabweave ok" }))
        .route("/process", post(process_handler))
        .with_state(state)
}

/// Serve on an already bound listener.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn run_with_config(config: ServerConfig) -> anyhow::Result<()> {
    log_startup_folders(&config);
    std::fs::create_dir_all(&config.input_dir)
        .with_context(|| format!("Failed to create or access input folder: {}", config.input_dir.display()))?;
    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Failed to create or access output folder: {}", config.output_dir.display()))?;

    let state = AppState::from_config(&config, EngineConfig::default());
    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve(listener, state).await
}

fn error_response(err: &AppError) -> (StatusCode, Json<serde_json::Value>) {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({
        "status": "error",
        "code": err.code_str(),
        "message": err.to_string(),
    })))
}

async fn process_handler(
    State(state): State<AppState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> impl IntoResponse {
    let payload = match payload {
        Ok(Json(v)) => v,
        Err(rejection) => {
            warn!(target: "tabweave::http", "unreadable request body: {}", rejection.body_text());
            return error_response(&AppError::validation(format!("request body is not valid JSON: {}", rejection.body_text())));
        }
    };
    let plan: RequestPlan = match serde_json::from_value(payload) {
        Ok(p) => p,
        Err(e) => return error_response(&AppError::validation(format!("invalid request body: {}", e))),
    };
    let pipeline = state.pipeline.clone();
    match tokio::task::spawn_blocking(move || pipeline.run(&plan)).await {
        Ok(Ok(out)) => (StatusCode::OK, Json(json!({
            "status": "ok",
            "message": out.destination,
            "rows": out.rows,
        }))),
        Ok(Err(e)) => {
            if e.is_client_error() {
                warn!(target: "tabweave::http", "request rejected: {}", e);
            } else {
                error!(target: "tabweave::http", "pipeline failed: {}", e);
            }
            error_response(&e)
        }
        Err(join_err) => {
            // Convert panics to a 500 error response without crashing the server task
            let msg = if join_err.is_panic() {
                let payload = join_err.into_panic();
                if let Some(s) = payload.downcast_ref::<&str>() { s.to_string() }
                else if let Some(s) = payload.downcast_ref::<String>() { s.clone() }
                else { "panic".to_string() }
            } else {
                "cancelled".to_string()
            };
            error!(target: "panic", "HTTP process_handler panic: {}", msg);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({
                "status": "error",
                "code": "internal_panic",
                "message": "internal server error",
            })))
        }
    }
}
