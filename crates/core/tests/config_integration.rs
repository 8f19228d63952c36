//! logsift.toml 통합 설정 테스트
//!
//! - logsift.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use logsift_core::config::LogsiftConfig;
use logsift_core::error::{ConfigError, LogsiftError};

// =============================================================================
// logsift.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../logsift.toml.example");
    let config = LogsiftConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert!(config.pipeline.pattern_file.is_empty());
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../logsift.toml.example");
    let config = LogsiftConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let content = include_str!("../../../logsift.toml.example");
    let from_file = LogsiftConfig::parse(content).expect("should parse");
    let from_code = LogsiftConfig::default();

    assert_eq!(from_file.general.log_level, from_code.general.log_level);
    assert_eq!(from_file.general.log_format, from_code.general.log_format);

    assert_eq!(
        from_file.pipeline.queue_capacity,
        from_code.pipeline.queue_capacity
    );
    assert_eq!(from_file.pipeline.batch_size, from_code.pipeline.batch_size);
    assert_eq!(from_file.pipeline.chunk_size, from_code.pipeline.chunk_size);
    assert_eq!(
        from_file.pipeline.poll_interval_ms,
        from_code.pipeline.poll_interval_ms
    );
    assert_eq!(
        from_file.pipeline.rate_interval_secs,
        from_code.pipeline.rate_interval_secs
    );
    assert_eq!(
        from_file.pipeline.max_line_length,
        from_code.pipeline.max_line_length
    );
    assert_eq!(
        from_file.pipeline.alerts_enabled,
        from_code.pipeline.alerts_enabled
    );

    assert_eq!(
        from_file.store.per_key_capacity,
        from_code.store.per_key_capacity
    );
    assert_eq!(
        from_file.store.global_multiplier,
        from_code.store.global_multiplier
    );
}

// =============================================================================
// 부분 설정 로딩 테스트
// =============================================================================

#[test]
fn partial_config_general_only() {
    let toml = r#"
[general]
log_level = "debug"
log_format = "pretty"
"#;
    let config = LogsiftConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.general.log_format, "pretty");
    // 나머지 섹션은 기본값
    assert_eq!(config.pipeline.queue_capacity, 1000);
    assert_eq!(config.store.per_key_capacity, 10_000);
}

#[test]
fn partial_config_store_only() {
    let toml = r#"
[store]
per_key_capacity = 3
"#;
    let config = LogsiftConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.store.per_key_capacity, 3);
    assert_eq!(config.store.global_multiplier, 10);
    assert_eq!(config.store.global_capacity(), 30);
}

#[test]
fn partial_config_pipeline_only() {
    let toml = r#"
[pipeline]
pattern_file = "patterns.yaml"
poll_interval_ms = 50
"#;
    let config = LogsiftConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.pipeline.pattern_file, "patterns.yaml");
    assert_eq!(config.pipeline.poll_interval_ms, 50);
    assert_eq!(config.pipeline.batch_size, 100);
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[general]
log_level = "debug"
"#;
    let original = std::env::var("LOGSIFT_GENERAL_LOG_LEVEL").ok();
    // SAFETY: serial 테스트로 환경변수 조작을 직렬화합니다.
    unsafe {
        std::env::set_var("LOGSIFT_GENERAL_LOG_LEVEL", "error");
    }

    let mut config = LogsiftConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    assert_eq!(config.general.log_level, "error");

    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGSIFT_GENERAL_LOG_LEVEL", val),
            None => std::env::remove_var("LOGSIFT_GENERAL_LOG_LEVEL"),
        }
    }
}

#[test]
#[serial_test::serial]
fn env_override_numeric_field() {
    let original = std::env::var("LOGSIFT_PIPELINE_BATCH_SIZE").ok();
    // SAFETY: serial 테스트로 환경변수 조작을 직렬화합니다.
    unsafe {
        std::env::set_var("LOGSIFT_PIPELINE_BATCH_SIZE", "999");
    }

    let mut config = LogsiftConfig::default();
    config.apply_env_overrides();
    assert_eq!(config.pipeline.batch_size, 999);

    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGSIFT_PIPELINE_BATCH_SIZE", val),
            None => std::env::remove_var("LOGSIFT_PIPELINE_BATCH_SIZE"),
        }
    }
}

#[test]
#[serial_test::serial]
fn env_override_bool_field() {
    let original = std::env::var("LOGSIFT_PIPELINE_ALERTS_ENABLED").ok();
    // SAFETY: serial 테스트로 환경변수 조작을 직렬화합니다.
    unsafe {
        std::env::set_var("LOGSIFT_PIPELINE_ALERTS_ENABLED", "false");
    }

    let mut config = LogsiftConfig::default();
    config.apply_env_overrides();
    assert!(!config.pipeline.alerts_enabled);

    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGSIFT_PIPELINE_ALERTS_ENABLED", val),
            None => std::env::remove_var("LOGSIFT_PIPELINE_ALERTS_ENABLED"),
        }
    }
}

#[test]
#[serial_test::serial]
fn env_override_invalid_value_fails_validation() {
    let original = std::env::var("LOGSIFT_STORE_PER_KEY_CAPACITY").ok();
    // SAFETY: serial 테스트로 환경변수 조작을 직렬화합니다.
    unsafe {
        std::env::set_var("LOGSIFT_STORE_PER_KEY_CAPACITY", "0");
    }

    let mut config = LogsiftConfig::default();
    config.apply_env_overrides();
    let err = config.validate().expect_err("zero capacity must be rejected");
    assert!(matches!(
        err,
        LogsiftError::Config(ConfigError::InvalidValue { .. })
    ));

    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGSIFT_STORE_PER_KEY_CAPACITY", val),
            None => std::env::remove_var("LOGSIFT_STORE_PER_KEY_CAPACITY"),
        }
    }
}

// =============================================================================
// 에러 케이스
// =============================================================================

#[test]
fn empty_string_parses_with_defaults() {
    let config = LogsiftConfig::parse("").expect("empty should parse");
    config.validate().expect("defaults should validate");
}

#[test]
fn comments_only_parses_with_defaults() {
    let toml = r#"
# just a comment
# [general]
"#;
    let config = LogsiftConfig::parse(toml).expect("should parse");
    assert_eq!(config.general.log_level, "info");
}

#[test]
fn malformed_toml_returns_parse_error() {
    let err = LogsiftConfig::parse("[general\nlog_level = ").unwrap_err();
    assert!(matches!(
        err,
        LogsiftError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn wrong_type_for_numeric_field() {
    let toml = r#"
[pipeline]
queue_capacity = "lots"
"#;
    let err = LogsiftConfig::parse(toml).unwrap_err();
    assert!(matches!(
        err,
        LogsiftError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn unknown_section_is_ignored() {
    let toml = r#"
[general]
log_level = "warn"

[future_section]
enabled = true
"#;
    let config = LogsiftConfig::parse(toml).expect("unknown sections should be ignored");
    assert_eq!(config.general.log_level, "warn");
}

// =============================================================================
// 파일 로딩
// =============================================================================

#[tokio::test]
async fn from_file_nonexistent_returns_file_not_found() {
    let err = LogsiftConfig::from_file("/nonexistent/logsift.toml")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LogsiftError::Config(ConfigError::FileNotFound { .. })
    ));
}

#[tokio::test]
async fn from_file_reads_temp_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("logsift.toml");
    tokio::fs::write(&path, "[store]\nper_key_capacity = 42\n")
        .await
        .expect("write config");

    let config = LogsiftConfig::from_file(&path).await.expect("should load");
    assert_eq!(config.store.per_key_capacity, 42);
}

#[tokio::test]
async fn from_file_rejects_invalid_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("logsift.toml");
    tokio::fs::write(&path, "[pipeline]\nchunk_size = 0\n")
        .await
        .expect("write config");

    let err = LogsiftConfig::from_file(&path).await.unwrap_err();
    assert!(err.to_string().contains("pipeline.chunk_size"));
}

#[test]
fn serialize_and_reparse_roundtrip() {
    let mut original = LogsiftConfig::default();
    original.pipeline.pattern_file = "/etc/logsift/patterns.yaml".to_owned();
    original.store.per_key_capacity = 77;

    let toml_str = toml::to_string_pretty(&original).expect("should serialize");
    let reparsed = LogsiftConfig::parse(&toml_str).expect("should reparse");
    assert_eq!(reparsed.pipeline.pattern_file, original.pipeline.pattern_file);
    assert_eq!(reparsed.store.per_key_capacity, 77);
}
