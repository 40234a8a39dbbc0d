//! Integration tests for structr-log
//!
//! A process can install one global subscriber, so everything that touches it
//! runs inside a single test.

use pretty_assertions::assert_eq;
use structr_log::{Config, Format, LogError, LoggerBuilder, WriterConfig, info, warn};

#[test]
fn test_global_subscriber_lifecycle() {
    let config = Config::test().with_level("info").with_format(Format::Json);
    let config = Config {
        reloadable: true,
        writer: WriterConfig::Stdout,
        ..config
    };

    let guard = LoggerBuilder::from_config(config).build().unwrap();
    info!(template = "index.html", "Rendering template");

    let handle = guard.reload_handle().expect("reloadable config");
    assert_eq!(handle.current_filter(), "info");

    handle.reload("structr=debug,warn").unwrap();
    assert_eq!(handle.current_filter(), "structr=debug,warn");
    warn!(target: "structr::script", "after reload");

    let err = handle.reload("structr=loud").unwrap_err();
    assert!(matches!(err, LogError::Filter { .. }));
    assert_eq!(handle.current_filter(), "structr=debug,warn");

    let second = structr_log::init();
    assert!(matches!(second, Err(LogError::Config(_))));
}

#[test]
fn test_config_from_json_document() {
    let config: Config = serde_json::from_str(
        r#"{
            "level": "structr=trace",
            "format": "pretty",
            "writer": { "type": "stdout" },
            "display": { "time": false },
            "fields": { "service": "renderer" }
        }"#,
    )
    .unwrap();

    assert_eq!(config.level, "structr=trace");
    assert_eq!(config.format, Format::Pretty);
    assert!(matches!(config.writer, WriterConfig::Stdout));
    assert!(!config.display.time);
    assert!(config.display.target);
    assert_eq!(config.fields.service.as_deref(), Some("renderer"));
    assert!(!config.fields.is_empty());
}
