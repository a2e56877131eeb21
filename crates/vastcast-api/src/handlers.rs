//! HTTP request handlers.

pub mod artifacts;
pub mod convert;
pub mod health;

pub use artifacts::serve_artifact;
pub use convert::convert;
pub use health::{health, ready};
