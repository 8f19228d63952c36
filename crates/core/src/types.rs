//! 도메인 타입: 시스템 전역에서 사용되는 공통 타입
//!
//! 모니터링 대상 프로세스의 출력 라인과, 분류가 끝난 로그 엔트리를 정의합니다.
//! 파이프라인과 데몬은 이 타입들을 사용하여 데이터를 교환합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 로그 심각도 레벨
///
/// `Ord` 구현으로 심각도 비교가 가능합니다
/// (`Debug < Info < Warning < Error < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// 디버그 출력
    Debug,
    /// 일반 정보 (매칭되는 패턴이 없을 때의 기본값)
    #[default]
    Info,
    /// 경고
    Warning,
    /// 에러
    Error,
    /// 치명적: 즉시 대응 필요
    Critical,
}

impl LogLevel {
    /// 모든 레벨 (심각도 오름차순)
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    /// 소문자 레벨 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// 문자열에서 레벨을 파싱합니다.
    ///
    /// 대소문자를 구분하지 않으며 흔한 축약형(`warn`, `err`, `crit`, `fatal`)도 허용합니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "debug" | "dbg" | "trace" => Some(Self::Debug),
            "info" | "information" | "informational" => Some(Self::Info),
            "warning" | "warn" => Some(Self::Warning),
            "error" | "err" => Some(Self::Error),
            "critical" | "crit" | "fatal" => Some(Self::Critical),
            _ => None,
        }
    }

    /// 알림 대상 레벨인지 확인합니다 (error, critical).
    pub fn is_alertable(&self) -> bool {
        matches!(self, Self::Error | Self::Critical)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_loose(s).ok_or_else(|| format!("unknown log level '{s}'"))
    }
}

/// 출력 채널
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceChannel {
    /// 표준 출력
    #[default]
    Stdout,
    /// 표준 에러
    Stderr,
}

impl fmt::Display for SourceChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// 분류 전 원시 라인
///
/// 입력 수집기가 생성하고, 파이프라인이 소비하는 중간 데이터 형식입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLine {
    /// 원시 텍스트 (trim 전)
    pub line: String,
    /// 프로세스 키 (출력을 생성한 프로세스/서비스 식별자)
    pub key: String,
    /// 수집 시각. None이면 수집 시점의 현재 시각이 사용됩니다.
    pub timestamp: Option<DateTime<Utc>>,
    /// 출력 채널
    pub channel: SourceChannel,
}

impl RawLine {
    /// 새 RawLine을 생성합니다 (stdout 채널).
    pub fn new(line: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            key: key.into(),
            timestamp: None,
            channel: SourceChannel::Stdout,
        }
    }

    /// 타임스탬프를 지정합니다.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// 출력 채널을 지정합니다.
    pub fn with_channel(mut self, channel: SourceChannel) -> Self {
        self.channel = channel;
        self
    }
}

/// 분류된 로그 엔트리
///
/// 생성 후에는 변경되지 않습니다. 파이프라인 내부에서는
/// `Arc<LogEntry>`로 공유되어 버퍼와 옵저버가 같은 인스턴스를 참조합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// 타임스탬프 (UTC)
    pub timestamp: DateTime<Utc>,
    /// 분류된 레벨
    pub level: LogLevel,
    /// trim된 메시지
    pub message: String,
    /// 프로세스 키
    pub key: String,
    /// 출력 채널
    pub channel: SourceChannel,
    /// 매칭된 패턴 식별자 목록 (평가 순서)
    pub matched_patterns: Vec<String>,
    /// 추가 메타데이터
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}/{}: {}",
            self.timestamp.to_rfc3339(),
            self.level,
            self.key,
            self.channel,
            self.message,
        )
    }
}
