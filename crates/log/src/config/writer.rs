//! Writer and display configuration

use serde::{Deserialize, Serialize};

/// Writer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
#[non_exhaustive]
pub enum WriterConfig {
    /// Write to stderr
    #[default]
    Stderr,
    /// Write to stdout
    Stdout,
}

/// Display configuration
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Show timestamps
    pub time: bool,
    /// Show source location (`file:line`)
    pub source: bool,
    /// Show target module
    pub target: bool,
    /// Show thread IDs
    pub thread_ids: bool,
    /// Show thread names
    pub thread_names: bool,
    /// Use ANSI colors
    pub colors: bool,
    /// Show span list in JSON
    pub span_list: bool,
    /// Flatten JSON events
    pub flatten: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time: true,
            source: cfg!(debug_assertions),
            target: true,
            thread_ids: false,
            thread_names: false,
            colors: cfg!(feature = "ansi") && std::io::IsTerminal::is_terminal(&std::io::stderr()),
            span_list: true,
            flatten: true,
        }
    }
}

impl DisplayConfig {
    /// Apply `STRUCTR_LOG_TIME`, `STRUCTR_LOG_SOURCE` and `STRUCTR_LOG_COLORS`
    pub(super) fn parse_env(&mut self) {
        if let Ok(v) = std::env::var("STRUCTR_LOG_TIME") {
            self.time = flag(&v);
        }
        if let Ok(v) = std::env::var("STRUCTR_LOG_SOURCE") {
            self.source = flag(&v);
        }
        if let Ok(v) = std::env::var("STRUCTR_LOG_COLORS") {
            self.colors = flag(&v);
        }
    }
}

fn flag(value: &str) -> bool {
    value != "0" && !value.eq_ignore_ascii_case("false")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_values() {
        assert!(flag("1"));
        assert!(flag("yes"));
        assert!(!flag("0"));
        assert!(!flag("FALSE"));
    }

    #[test]
    fn test_writer_config_tagged() {
        let writer: WriterConfig = serde_json::from_str(r#"{"type":"stdout"}"#).unwrap();
        assert!(matches!(writer, WriterConfig::Stdout));
    }
}
