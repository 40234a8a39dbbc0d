//! Engine configuration

use serde::{Deserialize, Serialize};

/// Default maximum evaluation depth
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Default upper bound for files returned by `read()`
pub const DEFAULT_READ_LIMIT: u64 = 10_000_000;

/// Tunables of an [`ExpressionEngine`](crate::ExpressionEngine)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Raise a 400 error when an arithmetic argument does not parse as a
    /// number, instead of returning the parser message as the result
    pub strict_arithmetic: bool,
    /// Maximum node nesting evaluated before giving up
    pub max_depth: usize,
    /// Files at or above this size are not returned by `read()`
    pub read_limit: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict_arithmetic: false,
            max_depth: DEFAULT_MAX_DEPTH,
            read_limit: DEFAULT_READ_LIMIT,
        }
    }
}

impl EngineConfig {
    /// Configuration with strict arithmetic enabled
    #[must_use]
    pub fn strict() -> Self {
        Self {
            strict_arithmetic: true,
            ..Self::default()
        }
    }

    /// Build configuration from `STRUCTR_EXPR_STRICT` and `STRUCTR_EXPR_MAX_DEPTH`
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(strict) = std::env::var("STRUCTR_EXPR_STRICT") {
            config.strict_arithmetic = strict == "1" || strict.eq_ignore_ascii_case("true");
        }

        if let Some(depth) = std::env::var("STRUCTR_EXPR_MAX_DEPTH")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.max_depth = depth;
        }

        config
    }

    /// Override the maximum evaluation depth
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Override the `read()` size limit
    #[must_use]
    pub fn with_read_limit(mut self, read_limit: u64) -> Self {
        self.read_limit = read_limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(!config.strict_arithmetic);
        assert_eq!(config.max_depth, 256);
        assert_eq!(config.read_limit, 10_000_000);
    }

    #[test]
    fn test_partial_deserialize() {
        let config: EngineConfig = serde_json::from_str(r#"{"strict_arithmetic":true}"#).unwrap();
        assert_eq!(config, EngineConfig::strict());
    }
}
