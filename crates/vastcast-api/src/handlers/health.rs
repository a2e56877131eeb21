//! Health check handlers.

use std::path::Path;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub encoder: CheckStatus,
    pub output_dir: CheckStatus,
    pub background_image: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckStatus {
    fn ok(detail: Option<String>, latency_ms: u64) -> Self {
        Self {
            status: "ok".to_string(),
            detail,
            error: None,
            latency_ms: Some(latency_ms),
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            detail: None,
            error: Some(msg.into()),
            latency_ms: None,
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Readiness check endpoint (readiness probe).
/// Checks the encoder executable, the output directory and the background image.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let engine = state.pipeline.engine();
    let encoder_check = {
        let start = Instant::now();
        if engine.is_available() {
            CheckStatus::ok(
                Some(format!("{} ({})", engine.program().display(), engine.source())),
                start.elapsed().as_millis() as u64,
            )
        } else {
            CheckStatus::error(format!("FFmpeg not runnable at {}", engine.program().display()))
        }
    };

    let config = state.pipeline.config();
    let output_dir_check = {
        let start = Instant::now();
        match probe_writable(&config.output_dir).await {
            Ok(()) => CheckStatus::ok(None, start.elapsed().as_millis() as u64),
            Err(e) => CheckStatus::error(format!("{}: {e}", config.output_dir.display())),
        }
    };

    let background_check = match tokio::fs::metadata(&config.background_image).await {
        Ok(meta) if meta.is_file() => CheckStatus::ok(None, 0),
        _ => CheckStatus::error(format!(
            "background image missing: {}",
            config.background_image.display()
        )),
    };

    let all_ok = encoder_check.is_ok() && output_dir_check.is_ok() && background_check.is_ok();

    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks: ReadinessChecks {
            encoder: encoder_check,
            output_dir: output_dir_check,
            background_image: background_check,
        },
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

async fn probe_writable(dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let probe = dir.join(format!(".ready-{}", Uuid::new_v4().simple()));
    tokio::fs::write(&probe, b"ok").await?;
    tokio::fs::remove_file(&probe).await
}
