//! Reload logic for runtime filter changes

use parking_lot::Mutex;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, Registry, layer::Layer};

use crate::error::{LogError, LogResult};

/// Handle for runtime configuration changes
#[derive(Clone)]
pub struct ReloadHandle {
    filter: tracing_subscriber::reload::Handle<EnvFilter, Registry>,
    current_filter: Arc<Mutex<String>>,
}

impl ReloadHandle {
    /// Reload the log filter at runtime
    ///
    /// # Errors
    /// Returns error if filter parsing fails or reload fails
    pub fn reload(&self, filter: &str) -> LogResult<()> {
        let new_filter =
            EnvFilter::try_new(filter).map_err(|e| LogError::filter(filter, e.to_string()))?;
        self.filter
            .reload(new_filter)
            .map_err(|e| LogError::config(format!("Failed to reload filter: {e}")))?;
        *self.current_filter.lock() = filter.to_string();
        Ok(())
    }

    /// Get the current filter string
    pub fn current_filter(&self) -> String {
        self.current_filter.lock().clone()
    }
}

/// Create a filter layer, optionally wrapping it in a reloadable layer
pub(super) fn create_filter_layer(
    filter: EnvFilter,
    level_str: &str,
    reloadable: bool,
) -> (
    Box<dyn Layer<Registry> + Send + Sync + 'static>,
    Option<ReloadHandle>,
) {
    if reloadable {
        let (layer, handle) = tracing_subscriber::reload::Layer::new(filter);
        let reload_handle = ReloadHandle {
            filter: handle,
            current_filter: Arc::new(Mutex::new(level_str.to_string())),
        };
        (Box::new(layer), Some(reload_handle))
    } else {
        (Box::new(filter), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_tracks_current_filter() {
        let filter = EnvFilter::try_new("info").unwrap();
        let (_layer, handle) = create_filter_layer(filter, "info", true);
        let handle = handle.unwrap();
        assert_eq!(handle.current_filter(), "info");
        assert!(handle.reload("structr=bogus").is_err());
        assert_eq!(handle.current_filter(), "info");
    }

    #[test]
    fn test_static_filter_has_no_handle() {
        let filter = EnvFilter::try_new("warn").unwrap();
        let (_layer, handle) = create_filter_layer(filter, "warn", false);
        assert!(handle.is_none());
    }
}
