//! logsift 공통 크레이트
//!
//! 도메인 타입, 에러 계층, `logsift.toml` 설정, 메트릭 이름을 제공합니다.
//! `logsift-pipeline`과 `logsift-daemon`이 이 크레이트에 의존합니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, LogsiftError, PatternError, PipelineError};

// 설정
pub use config::LogsiftConfig;

// 파이프라인 공통 타입
pub use pipeline::BoxFuture;

// 도메인 타입
pub use types::{LogEntry, LogLevel, RawLine, SourceChannel};
