//! 설정 관리: logsift.toml 파싱 및 런타임 설정
//!
//! [`LogsiftConfig`]는 데몬과 파이프라인 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGSIFT_PIPELINE_QUEUE_CAPACITY=500` 형식)
//! 3. 설정 파일 (`logsift.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logsift_core::error::LogsiftError> {
//! use logsift_core::config::LogsiftConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogsiftConfig::load("logsift.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogsiftConfig::parse("[store]\nper_key_capacity = 500")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogsiftError};

/// logsift 통합 설정
///
/// `logsift.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogsiftConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 수집 파이프라인 설정
    #[serde(default)]
    pub pipeline: PipelineSection,
    /// 로그 저장소 설정
    #[serde(default)]
    pub store: StoreSection,
}

impl LogsiftConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogsiftError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogsiftError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogsiftError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogsiftError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogsiftError> {
        toml::from_str(toml_str).map_err(|e| {
            LogsiftError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGSIFT_{SECTION}_{FIELD}`
    /// 예: `LOGSIFT_STORE_PER_KEY_CAPACITY=500`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGSIFT_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGSIFT_GENERAL_LOG_FORMAT");

        // Pipeline
        override_string(
            &mut self.pipeline.pattern_file,
            "LOGSIFT_PIPELINE_PATTERN_FILE",
        );
        override_usize(
            &mut self.pipeline.queue_capacity,
            "LOGSIFT_PIPELINE_QUEUE_CAPACITY",
        );
        override_usize(&mut self.pipeline.batch_size, "LOGSIFT_PIPELINE_BATCH_SIZE");
        override_usize(&mut self.pipeline.chunk_size, "LOGSIFT_PIPELINE_CHUNK_SIZE");
        override_u64(
            &mut self.pipeline.poll_interval_ms,
            "LOGSIFT_PIPELINE_POLL_INTERVAL_MS",
        );
        override_u64(
            &mut self.pipeline.rate_interval_secs,
            "LOGSIFT_PIPELINE_RATE_INTERVAL_SECS",
        );
        override_usize(
            &mut self.pipeline.max_line_length,
            "LOGSIFT_PIPELINE_MAX_LINE_LENGTH",
        );
        override_bool(
            &mut self.pipeline.alerts_enabled,
            "LOGSIFT_PIPELINE_ALERTS_ENABLED",
        );

        // Store
        override_usize(
            &mut self.store.per_key_capacity,
            "LOGSIFT_STORE_PER_KEY_CAPACITY",
        );
        override_usize(
            &mut self.store.global_multiplier,
            "LOGSIFT_STORE_GLOBAL_MULTIPLIER",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogsiftError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        let positive = [
            ("pipeline.queue_capacity", self.pipeline.queue_capacity as u64),
            ("pipeline.batch_size", self.pipeline.batch_size as u64),
            ("pipeline.chunk_size", self.pipeline.chunk_size as u64),
            ("pipeline.poll_interval_ms", self.pipeline.poll_interval_ms),
            ("pipeline.rate_interval_secs", self.pipeline.rate_interval_secs),
            ("pipeline.max_line_length", self.pipeline.max_line_length as u64),
            ("store.per_key_capacity", self.store.per_key_capacity as u64),
            ("store.global_multiplier", self.store.global_multiplier as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(invalid(field, "must be greater than 0".to_owned()));
            }
        }

        if self
            .store
            .per_key_capacity
            .checked_mul(self.store.global_multiplier)
            .is_none()
        {
            return Err(invalid(
                "store.global_multiplier",
                "per_key_capacity * global_multiplier overflows".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> LogsiftError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 수집 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// 패턴 YAML 파일 경로 (빈 문자열이면 내장 기본 패턴 사용)
    pub pattern_file: String,
    /// 백그라운드 큐 용량
    pub queue_capacity: usize,
    /// 배치 버퍼 자동 플러시 크기
    pub batch_size: usize,
    /// 병렬 배치 처리 청크 크기
    pub chunk_size: usize,
    /// 백그라운드 워커 폴링 타임아웃 (밀리초)
    pub poll_interval_ms: u64,
    /// 처리율 재계산 간격 (초)
    pub rate_interval_secs: u64,
    /// 한 라인의 최대 길이 (바이트)
    pub max_line_length: usize,
    /// error/critical 알림 활성화
    pub alerts_enabled: bool,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            pattern_file: String::new(),
            queue_capacity: 1000,
            batch_size: 100,
            chunk_size: 100,
            poll_interval_ms: 1000,
            rate_interval_secs: 10,
            max_line_length: 64 * 1024, // 64KB
            alerts_enabled: true,
        }
    }
}

/// 로그 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// 프로세스 키별 버퍼 용량
    pub per_key_capacity: usize,
    /// 전역 버퍼 용량 배수 (전역 용량 = per_key_capacity * global_multiplier)
    pub global_multiplier: usize,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            per_key_capacity: 10_000,
            global_multiplier: 10,
        }
    }
}

impl StoreSection {
    /// 전역 버퍼 용량을 계산합니다.
    pub fn global_capacity(&self) -> usize {
        self.per_key_capacity.saturating_mul(self.global_multiplier)
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = LogsiftConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert!(config.pipeline.pattern_file.is_empty());
        assert_eq!(config.pipeline.queue_capacity, 1000);
        assert_eq!(config.pipeline.batch_size, 100);
        assert_eq!(config.pipeline.poll_interval_ms, 1000);
        assert_eq!(config.pipeline.rate_interval_secs, 10);
        assert_eq!(config.store.per_key_capacity, 10_000);
        assert_eq!(config.store.global_capacity(), 100_000);
    }

    #[test]
    fn default_config_passes_validation() {
        LogsiftConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = LogsiftConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.store.global_multiplier, 10);
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[general]
log_level = "debug"

[store]
per_key_capacity = 50
"#;
        let config = LogsiftConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.store.per_key_capacity, 50);
        assert_eq!(config.store.global_capacity(), 500);
        assert_eq!(config.pipeline.queue_capacity, 1000);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[general]
log_level = "warn"
log_format = "pretty"

[pipeline]
pattern_file = "/etc/logsift/patterns.yaml"
queue_capacity = 64
batch_size = 20
chunk_size = 8
poll_interval_ms = 250
rate_interval_secs = 5
max_line_length = 4096
alerts_enabled = false

[store]
per_key_capacity = 200
global_multiplier = 4
"#;
        let config = LogsiftConfig::parse(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.pipeline.pattern_file, "/etc/logsift/patterns.yaml");
        assert_eq!(config.pipeline.queue_capacity, 64);
        assert_eq!(config.pipeline.poll_interval_ms, 250);
        assert!(!config.pipeline.alerts_enabled);
        assert_eq!(config.store.global_capacity(), 800);
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = LogsiftConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            LogsiftError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = LogsiftConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = LogsiftConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let mut config = LogsiftConfig::default();
        config.store.per_key_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("store.per_key_capacity"));
    }

    #[test]
    fn validate_rejects_zero_queue_capacity() {
        let mut config = LogsiftConfig::default();
        config.pipeline.queue_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pipeline.queue_capacity"));
    }

    #[test]
    fn validate_rejects_global_capacity_overflow() {
        let mut config = LogsiftConfig::default();
        config.store.per_key_capacity = usize::MAX;
        config.store.global_multiplier = 2;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("global_multiplier"));
    }

    #[test]
    #[serial]
    fn env_overrides_apply_to_sections() {
        // SAFETY: serial 테스트로 환경변수 조작을 직렬화합니다.
        unsafe {
            std::env::set_var("LOGSIFT_PIPELINE_QUEUE_CAPACITY", "32");
            std::env::set_var("LOGSIFT_STORE_PER_KEY_CAPACITY", "7");
            std::env::set_var("LOGSIFT_GENERAL_LOG_FORMAT", "pretty");
        }
        let mut config = LogsiftConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.pipeline.queue_capacity, 32);
        assert_eq!(config.store.per_key_capacity, 7);
        assert_eq!(config.general.log_format, "pretty");
        unsafe {
            std::env::remove_var("LOGSIFT_PIPELINE_QUEUE_CAPACITY");
            std::env::remove_var("LOGSIFT_STORE_PER_KEY_CAPACITY");
            std::env::remove_var("LOGSIFT_GENERAL_LOG_FORMAT");
        }
    }

    #[test]
    #[serial]
    fn env_override_bool_invalid_keeps_original() {
        let mut val = true;
        // SAFETY: serial 테스트로 환경변수 조작을 직렬화합니다.
        unsafe { std::env::set_var("TEST_LOGSIFT_BOOL_BAD", "not-a-bool") };
        override_bool(&mut val, "TEST_LOGSIFT_BOOL_BAD");
        assert!(val);
        unsafe { std::env::remove_var("TEST_LOGSIFT_BOOL_BAD") };
    }

    #[test]
    #[serial]
    fn env_override_usize_invalid_keeps_original() {
        let mut val = 10usize;
        // SAFETY: serial 테스트로 환경변수 조작을 직렬화합니다.
        unsafe { std::env::set_var("TEST_LOGSIFT_USIZE_BAD", "-3") };
        override_usize(&mut val, "TEST_LOGSIFT_USIZE_BAD");
        assert_eq!(val, 10);
        unsafe { std::env::remove_var("TEST_LOGSIFT_USIZE_BAD") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_LOGSIFT_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = LogsiftConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = LogsiftConfig::parse(&toml_str).unwrap();
        assert_eq!(config.general.log_level, parsed.general.log_level);
        assert_eq!(config.store.per_key_capacity, parsed.store.per_key_capacity);
        assert_eq!(config.pipeline.max_line_length, parsed.pipeline.max_line_length);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = LogsiftConfig::from_file("/nonexistent/path/logsift.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LogsiftError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
