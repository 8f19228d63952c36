//! 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 패턴 등록, 분류, 저장, 수집 과정에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for LogsiftError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use logsift_core::error::{ConfigError, LogsiftError, PatternError, PipelineError};

/// 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 잘못된 패턴 (정규식 컴파일 실패, 알 수 없는 레벨, 빈 정규식 등)
    #[error("pattern error: level '{level}', regex '{regex}': {reason}")]
    Pattern {
        /// 대상 레벨
        level: String,
        /// 문제가 된 정규식
        regex: String,
        /// 실패 사유
        reason: String,
    },

    /// 패턴 소스 로드 실패 (strict 로드 전용)
    #[error("pattern load error: {source_name}: {reason}")]
    PatternLoad {
        /// 소스 이름 (파일 경로, "inline", "defaults")
        source_name: String,
        /// 실패 사유
        reason: String,
    },

    /// 분류 불가 (라인 길이 초과)
    #[error("classification error: line too large: {size} bytes (max: {max})")]
    LineTooLarge {
        /// 입력 라인 길이 (바이트)
        size: usize,
        /// 허용 최대 길이
        max: usize,
    },

    /// 잘못된 배치 입력 항목
    #[error("classification error: invalid batch item: {0}")]
    InvalidItem(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 옵저버 알림 실패
    #[error("observer error: {name}: {reason}")]
    Observer {
        /// 옵저버 이름
        name: String,
        /// 실패 사유
        reason: String,
    },

    /// 알림 싱크 전달 실패
    #[error("alert sink error: {0}")]
    AlertSink(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LogPipelineError {
    /// 분류 단계에서 발생한 에러인지 확인합니다.
    pub fn is_classification(&self) -> bool {
        matches!(self, Self::LineTooLarge { .. } | Self::InvalidItem(_))
    }
}

impl From<LogPipelineError> for LogsiftError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Pattern {
                level,
                regex,
                reason,
            } => LogsiftError::Pattern(PatternError::Invalid {
                level,
                regex,
                reason,
            }),
            LogPipelineError::PatternLoad {
                source_name,
                reason,
            } => LogsiftError::Pattern(PatternError::LoadFailed {
                source_name,
                reason,
            }),
            LogPipelineError::Config { field, reason } => {
                LogsiftError::Config(ConfigError::InvalidValue { field, reason })
            }
            LogPipelineError::Io(e) => LogsiftError::Io(e),
            LogPipelineError::Observer { .. } => {
                LogsiftError::Pipeline(PipelineError::Observer(err.to_string()))
            }
            other => LogsiftError::Pipeline(PipelineError::Classification(other.to_string())),
        }
    }
}
