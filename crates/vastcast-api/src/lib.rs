//! Axum HTTP API server for VAST to CTV video conversion.
//!
//! This crate provides:
//! - The conversion endpoint and the sequential conversion pipeline
//! - Delivery of generated QR codes, videos and encoder logs
//! - Rate limiting and security headers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;

pub use config::{ApiConfig, ConversionConfig};
pub use error::{ApiError, ApiResult, PipelineError, PipelineResult};
pub use routes::create_router;
pub use services::ConversionPipeline;
pub use state::AppState;
