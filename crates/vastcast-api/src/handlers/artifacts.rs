//! Generated artifact delivery.

use axum::body::Body;
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderValue};
use axum::response::Response;
use serde::Deserialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::security::is_valid_artifact_name;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ArtifactQuery {
    /// Serve as an attachment
    #[serde(default)]
    pub download: bool,
}

/// Serve a generated QR code, video or log by filename.
pub async fn serve_artifact(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(query): Query<ArtifactQuery>,
    request: Request,
) -> ApiResult<Response> {
    if !is_valid_artifact_name(&filename) {
        debug!(filename = %filename, "Rejected artifact name");
        return Err(ApiError::not_found("Artifact not found"));
    }

    let path = state.pipeline.config().output_dir.join(&filename);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        _ => return Err(ApiError::not_found("Artifact not found")),
    }

    let response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let mut response = response.map(Body::new);

    if query.download {
        let disposition = format!("attachment; filename=\"{filename}\"");
        let value = HeaderValue::from_str(&disposition)
            .map_err(|e| ApiError::internal(format!("invalid content disposition: {e}")))?;
        response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}
