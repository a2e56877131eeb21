//! VAST conversion handler.

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use tracing::info;

use vastcast_vast::VastSource;

use crate::error::{ApiError, ApiResult, PipelineError};
use crate::services::ConversionOutput;
use crate::state::AppState;

const FILE_FIELD: &str = "vast_file";
const INPUT_FIELD: &str = "vast_input";

/// Conversion response.
#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub job_id: String,
    pub title: String,
    pub brand: String,
    pub media_file_url: String,
    pub raw_clickthrough_url: String,
    pub resolved_url: String,
    pub display_url: String,
    pub qr_code_url: String,
    pub video_url: String,
    pub download_url: String,
    pub log_url: String,
}

impl From<ConversionOutput> for ConvertResponse {
    fn from(output: ConversionOutput) -> Self {
        let prepared = output.prepared;
        let names = prepared.names;
        Self {
            job_id: names.job_id,
            title: prepared.manifest.title,
            brand: prepared.brand.to_string(),
            media_file_url: prepared.manifest.media_file_url,
            raw_clickthrough_url: prepared.destination.raw,
            resolved_url: prepared.destination.resolved,
            display_url: prepared.display_url,
            qr_code_url: artifact_url(&names.qr_code),
            download_url: format!("{}?download=true", artifact_url(&names.video)),
            video_url: artifact_url(&names.video),
            log_url: artifact_url(&names.log),
        }
    }
}

fn artifact_url(name: &str) -> String {
    format!("/generated/{name}")
}

/// Convert a VAST document into a CTV promo video.
///
/// Accepts `multipart/form-data` with an optional `vast_file` upload and an
/// optional `vast_input` text field holding pasted XML or a URL.
pub async fn convert(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ConvertResponse>> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut input: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid form data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            FILE_FIELD => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;
                upload = Some((filename, bytes.to_vec()));
            }
            INPUT_FIELD => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read input: {e}")))?;
                input = Some(text);
            }
            _ => {}
        }
    }

    let source = VastSource::from_form(upload, input.as_deref()).map_err(PipelineError::from)?;
    info!(source = source.kind(), "Conversion requested");

    let output = state.pipeline.convert(source).await?;
    Ok(Json(ConvertResponse::from(output)))
}
