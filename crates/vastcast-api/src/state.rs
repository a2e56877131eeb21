//! Application state.

use std::sync::Arc;

use crate::config::ApiConfig;
use crate::error::PipelineResult;
use crate::services::ConversionPipeline;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<ConversionPipeline>,
}

impl AppState {
    /// Create application state. Locates the encoder once for the process.
    pub fn new(config: ApiConfig) -> PipelineResult<Self> {
        let pipeline = ConversionPipeline::from_config(config.conversion.clone())?;
        Ok(Self::with_pipeline(config, pipeline))
    }

    /// Create state around an already built pipeline.
    pub fn with_pipeline(config: ApiConfig, pipeline: ConversionPipeline) -> Self {
        Self {
            config,
            pipeline: Arc::new(pipeline),
        }
    }
}
