#![deny(unreachable_patterns)]
//! Composition planning and FFmpeg rendering.
//!
//! This crate provides:
//! - The filter graph that lays out background, ad video, QR code and captions
//! - Drawtext escaping and on-screen URL formatting
//! - QR code bitmap generation
//! - One-time FFmpeg discovery ([`EngineLocation`])
//! - A render executor with a hard timeout, process-group termination and
//!   full diagnostics capture

pub mod command;
pub mod composition;
pub mod engine;
pub mod error;
pub mod qr;
pub mod render;
pub mod text;

pub use command::FfmpegCommand;
pub use composition::{
    plan_composition, CompositionLayout, CompositionPlan, CompositionText, FilterOp, FontSpec,
    Placement, StreamRef, TextLayer, TextPlacement, DEFAULT_CTA_TEXT, DEFAULT_FONT_FAMILY,
    FINAL_OUTPUT_LABEL,
};
pub use engine::{DiscoveryContext, EngineLocation, EngineSource};
pub use error::{MediaError, MediaResult};
pub use qr::generate_qr_code;
pub use render::{
    Diagnostics, FailureReason, RenderExecutor, RenderInputs, RenderJob, RenderOutcome,
    RenderState, DEFAULT_RENDER_TIMEOUT, MAX_DIAGNOSTICS_CHARS,
};
pub use text::{
    display_url, escape_drawtext, escape_filter_args, escape_option_value, MAX_DISPLAY_URL_CHARS,
};
