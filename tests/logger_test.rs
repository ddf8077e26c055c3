use level_up::config::{LogFormat, LoggingConfig};
use level_up::utils::logger;
use level_up::LevelUpError;

// Own test binary: nothing else in this process installs a global subscriber.
#[test]
fn test_logger_can_be_installed_once() {
    let config = LoggingConfig {
        filter: Some("level_up=debug".to_string()),
        format: LogFormat::Json,
    };

    let first = logger::init_logger(&config);
    assert!(first.is_ok(), "first install failed: {:?}", first);

    let second = logger::init_logger(&LoggingConfig::default());
    assert!(matches!(second, Err(LevelUpError::ConfigError { .. })));
}
