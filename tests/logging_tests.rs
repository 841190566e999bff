use powershop_nz::config::LoggingConfig;
use powershop_nz::logging::{
    LogContext, get_logger, get_logger_with_context, init_logging, min_level, parse_log_level,
};
use tracing::Level;

#[test]
fn parse_levels_accepts_python_style_names() {
    assert_eq!(parse_log_level("warning").unwrap(), Level::WARN);
    assert_eq!(parse_log_level("CRITICAL").unwrap(), Level::ERROR);
    assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
    assert!(parse_log_level("loud").is_err());
}

#[test]
fn min_level_picks_more_verbose() {
    assert_eq!(min_level(Level::INFO, Level::DEBUG), Level::DEBUG);
    assert_eq!(min_level(Level::ERROR, Level::WARN), Level::WARN);
}

#[test]
fn property_logger_carries_consumer_id() {
    let logger = get_logger("reconcile").for_property("42");
    assert_eq!(logger.context().component, "reconcile");
    assert_eq!(logger.context().consumer_id.as_deref(), Some("42"));
    logger.info("property logger works without a subscriber");

    let ctx = LogContext::new("api").with_field("endpoint", "accounts".to_string());
    let logger = get_logger_with_context(ctx);
    assert_eq!(
        logger.context().extra_fields.get("endpoint").map(String::as_str),
        Some("accounts")
    );
}

#[test]
fn init_logging_writes_to_temp_dir_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = LoggingConfig {
        level: "DEBUG".into(),
        file: dir.path().join("powershop.log").to_string_lossy().to_string(),
        console_output: false,
        ..LoggingConfig::default()
    };
    init_logging(&config).unwrap();
    init_logging(&config).unwrap();
    get_logger("test").info("logging initialised");
}
