//! Logger builder implementation
//!
//! - `reload`: runtime filter reload logic

mod reload;

pub use reload::ReloadHandle;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::{Layer, Layered};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, DisplayConfig, Format};
use crate::error::{LogError, LogResult};
use crate::writer;

type FilterLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;
type FmtLayer = Box<dyn Layer<Layered<FilterLayer, Registry>> + Send + Sync + 'static>;

/// Logger builder
pub struct LoggerBuilder {
    config: Config,
}

/// Guard that keeps the logger alive
///
/// Holds the reload handle and the root span carrying the global fields.
pub struct LoggerGuard {
    inner: Option<Box<Inner>>,
}

struct Inner {
    reload_handle: Option<ReloadHandle>,
    _root_span_guard: Option<tracing::span::EnteredSpan>,
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Build and install the global subscriber
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Filter string cannot be parsed
    /// - A global subscriber was already installed
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = EnvFilter::try_new(&self.config.level)
            .map_err(|e| LogError::filter(&self.config.level, e.to_string()))?;

        let writer = writer::make_writer(&self.config.writer);

        let (filter_layer, reload_handle) =
            reload::create_filter_layer(filter, &self.config.level, self.config.reloadable);

        let fmt_layer = fmt_layer(self.config.format, &self.config.display, writer);

        Registry::default()
            .with(filter_layer)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| LogError::config(format!("Failed to install subscriber: {e}")))?;

        let mut inner = Inner {
            reload_handle,
            _root_span_guard: None,
        };

        // Root span with global fields
        let fields = &self.config.fields;
        if !fields.is_empty() {
            let root = tracing::info_span!(
                "structr",
                service = fields.service.as_deref().unwrap_or(""),
                env = fields.env.as_deref().unwrap_or(""),
                version = fields.version.as_deref().unwrap_or("")
            );
            inner._root_span_guard = Some(root.entered());
        }

        Ok(LoggerGuard {
            inner: Some(Box::new(inner)),
        })
    }
}

fn fmt_layer(format: Format, display: &DisplayConfig, writer: BoxMakeWriter) -> FmtLayer {
    let base = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(display.colors)
        .with_target(display.target)
        .with_file(display.source)
        .with_line_number(display.source)
        .with_thread_ids(display.thread_ids)
        .with_thread_names(display.thread_names);

    match (format, display.time) {
        (Format::Pretty, true) => Box::new(base.pretty()),
        (Format::Pretty, false) => Box::new(base.pretty().without_time()),
        (Format::Compact, true) => Box::new(base.compact()),
        (Format::Compact, false) => Box::new(base.compact().without_time()),
        (Format::Json, time) => {
            let json = base
                .json()
                .with_current_span(true)
                .with_span_list(display.span_list)
                .flatten_event(display.flatten);
            if time {
                Box::new(json)
            } else {
                Box::new(json.without_time())
            }
        }
    }
}

impl LoggerGuard {
    /// Handle for changing the filter at runtime, present when the
    /// configuration was marked `reloadable`
    pub fn reload_handle(&self) -> Option<&ReloadHandle> {
        self.inner.as_ref().and_then(|inner| inner.reload_handle.as_ref())
    }

    #[cfg(test)]
    pub(crate) fn noop() -> Self {
        Self { inner: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = Config::test().with_level("structr=notalevel");
        let result = LoggerBuilder::from_config(config).build();
        assert!(matches!(result, Err(LogError::Filter { .. })));
    }

    #[test]
    fn test_noop_guard_has_no_reload_handle() {
        assert!(LoggerGuard::noop().reload_handle().is_none());
    }
}
