//! 에러 타입: 도메인별 에러 정의

/// logsift 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogsiftError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 패턴 등록/로드 에러
    #[error("pattern error: {0}")]
    Pattern(#[from] PatternError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 분류 실패
    #[error("classification failed: {0}")]
    Classification(String),

    /// 옵저버 알림 실패
    #[error("observer failed: {0}")]
    Observer(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}

/// 패턴 에러
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    /// 정규식 컴파일 실패 또는 잘못된 패턴 항목
    #[error("invalid pattern '{regex}' for level '{level}': {reason}")]
    Invalid {
        level: String,
        regex: String,
        reason: String,
    },

    /// 패턴 소스 로드 실패
    #[error("failed to load patterns from {source_name}: {reason}")]
    LoadFailed { source_name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_into_top_level() {
        let err: LogsiftError = ConfigError::InvalidValue {
            field: "store.per_key_capacity".to_owned(),
            reason: "must be greater than 0".to_owned(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.starts_with("config error"));
        assert!(msg.contains("store.per_key_capacity"));
    }

    #[test]
    fn pattern_error_display() {
        let err = PatternError::Invalid {
            level: "error".to_owned(),
            regex: "[".to_owned(),
            reason: "unclosed character class".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "invalid pattern '[' for level 'error': unclosed character class"
        );
    }
}
