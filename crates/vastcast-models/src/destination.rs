//! Clickthrough destination after resolution.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Clickthrough destination.
///
/// `raw` is kept verbatim because tracking pixels only fire on the original
/// tracker URL; it is what the QR code encodes. `resolved` is the best-effort
/// landing page used for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResolvedDestination {
    /// Clickthrough as found in the VAST document
    pub raw: String,
    /// Landing URL after unwrapping and redirect following
    pub resolved: String,
    /// Destination embedded in a tracker query parameter, if one was found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedded: Option<String>,
}

impl ResolvedDestination {
    /// A destination that could not be resolved past the raw URL.
    pub fn unresolved(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            resolved: raw.clone(),
            raw,
            embedded: None,
        }
    }

    /// URL to show on screen: the resolved one, or the raw one when empty.
    pub fn display_source(&self) -> &str {
        if self.resolved.is_empty() {
            &self.raw
        } else {
            &self.resolved
        }
    }

    /// Whether resolution moved past the raw clickthrough.
    pub fn is_resolved(&self) -> bool {
        !self.resolved.is_empty() && self.resolved != self.raw
    }
}
