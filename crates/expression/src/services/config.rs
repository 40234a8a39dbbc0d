//! Flat key/value configuration in the `structr.conf` format

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use structr_log::warn;

use crate::error::ExpressionResult;

pub const BASE_PATH: &str = "base.path";
pub const DATA_EXCHANGE_PATH: &str = "data.exchange.path";

/// Read access to configuration values
pub trait ConfigProvider: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Value for `key`, or `default` when it is missing
    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Directory `read`, `write` and `append` operate in
    ///
    /// Defaults to `{base.path}/exchange`. `None` when `base.path` is unset.
    fn exchange_dir(&self) -> Option<PathBuf> {
        let base = self.get(BASE_PATH).filter(|base| !base.is_empty());
        let Some(base) = base else {
            warn!("Unable to determine base.path from structr.conf, no data input/output possible.");
            return None;
        };
        let default = Path::new(&base).join("exchange");
        Some(
            self.get(DATA_EXCHANGE_PATH)
                .filter(|path| !path.is_empty())
                .map_or(default, PathBuf::from),
        )
    }
}

/// Configuration held in an ordered map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticConfig {
    values: IndexMap<String, String>,
}

impl StaticConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `structr.conf` text: `key = value` lines, `#` comments
    pub fn parse(text: &str) -> Self {
        let values = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .collect();
        Self { values }
    }

    pub fn load(path: impl AsRef<Path>) -> ExpressionResult<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ConfigProvider for StaticConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse() {
        let config = StaticConfig::parse(
            "# comment\n\nbase.path = /opt/structr\nmy.script=ls -la\nbroken line\n",
        );
        assert_eq!(config.len(), 2);
        assert_eq!(config.get(BASE_PATH).as_deref(), Some("/opt/structr"));
        assert_eq!(config.get("my.script").as_deref(), Some("ls -la"));
        assert_eq!(config.get_or("missing", "x"), "x");
    }

    #[test]
    fn test_exchange_dir() {
        assert_eq!(StaticConfig::new().exchange_dir(), None);

        let config = StaticConfig::new().with(BASE_PATH, "/opt/structr");
        assert_eq!(
            config.exchange_dir(),
            Some(PathBuf::from("/opt/structr/exchange"))
        );

        let config = config.with(DATA_EXCHANGE_PATH, "/data/in");
        assert_eq!(config.exchange_dir(), Some(PathBuf::from("/data/in")));
    }
}
