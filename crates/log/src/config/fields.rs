//! Global fields configuration

use serde::{Deserialize, Serialize};

/// Fields recorded on the root span of every event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fields {
    /// Service name
    pub service: Option<String>,
    /// Environment (dev/staging/prod)
    pub env: Option<String>,
    /// Version
    pub version: Option<String>,
}

impl Fields {
    /// Create fields from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            service: std::env::var("STRUCTR_SERVICE").ok(),
            env: std::env::var("STRUCTR_ENV").ok(),
            version: std::env::var("STRUCTR_VERSION")
                .ok()
                .or_else(|| option_env!("CARGO_PKG_VERSION").map(String::from)),
        }
    }

    /// Check if fields are empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.service.is_none() && self.env.is_none() && self.version.is_none()
    }
}
