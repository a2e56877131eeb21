//! Clickthrough URL resolution.
//!
//! Ad clickthroughs are usually tracker URLs that carry the real destination
//! in a query parameter, and the destination itself may redirect further.
//! This crate provides:
//! - Ordered extraction of an embedded destination from tracker parameters
//! - Redirect following behind the [`RedirectFollower`] trait
//! - [`ClickthroughResolver`], which combines both and never fails

pub mod params;
pub mod redirect;
pub mod resolver;

pub use params::{extract_embedded_destination, DESTINATION_PARAMS};
pub use redirect::{
    HttpRedirectFollower, RedirectFollower, Resolution, UnresolvedReason, DEFAULT_MAX_REDIRECTS,
    DEFAULT_RESOLVE_TIMEOUT,
};
pub use resolver::ClickthroughResolver;
