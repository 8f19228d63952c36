//! 분류기 -- 패턴 레지스트리를 이용해 한 줄의 레벨을 결정합니다.
//!
//! 모든 레벨의 패턴을 전역 평가 순서(priority, 레벨 등록 순서, 패턴 등록 순서)로 검사하고,
//! 가장 먼저 매칭된 패턴의 레벨을 채택합니다. 아무 패턴도 매칭되지 않으면 `info`입니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use logsift_core::types::{LogEntry, LogLevel, RawLine, SourceChannel};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::error::LogPipelineError;
use crate::pattern::PatternRegistry;

/// 기본 최대 라인 길이 (64KB)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// 배치 입력 항목의 키가 없을 때 사용하는 프로세스 키
const UNKNOWN_KEY: &str = "unknown";

/// 분류 실패 placeholder 엔트리의 프로세스 키
const PLACEHOLDER_KEY: &str = "classifier";

/// 단일 라인 분류 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// 결정된 레벨
    pub level: LogLevel,
    /// 매칭된 패턴 식별자 (평가 순서)
    pub matched_patterns: Vec<String>,
    /// 검사한 패턴 수
    pub patterns_checked: usize,
}

/// 분류 누적 통계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationStats {
    /// 분류된 전체 라인 수
    pub total_classified: u64,
    /// 레벨별 분류 수
    pub by_level: BTreeMap<LogLevel, u64>,
}

/// 샘플 분류 리포트의 라인별 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleResult {
    /// 입력 라인
    pub input: String,
    /// 분류된 레벨 (실패 시 None)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<LogLevel>,
    /// 매칭된 패턴 식별자
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matched_patterns: Vec<String>,
    /// 실패 사유
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 샘플 분류 리포트 (누적 통계에 반영되지 않음)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SampleReport {
    /// 검사한 라인 수
    pub total_tested: usize,
    /// 레벨별 분류 수
    pub classifications: BTreeMap<LogLevel, usize>,
    /// 라인별 상세
    pub details: Vec<SampleResult>,
}

/// 로그 분류기
pub struct Classifier {
    registry: Arc<PatternRegistry>,
    max_line_length: usize,
    stats: Mutex<ClassificationStats>,
}

impl Classifier {
    /// 주어진 레지스트리로 분류기를 생성합니다.
    pub fn new(registry: Arc<PatternRegistry>) -> Self {
        Self {
            registry,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            stats: Mutex::new(ClassificationStats::default()),
        }
    }

    /// 최대 라인 길이(바이트)를 설정합니다.
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    /// 패턴 레지스트리
    pub fn registry(&self) -> &Arc<PatternRegistry> {
        &self.registry
    }

    /// 최대 라인 길이
    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// 라인의 레벨만 결정합니다. 통계에 반영되지 않습니다.
    pub fn classify(&self, line: &str) -> LogLevel {
        self.detect(line).level
    }

    /// 라인을 현재 패턴 집합으로 평가합니다. 통계에 반영되지 않습니다.
    pub fn detect(&self, line: &str) -> Classification {
        let set = self.registry.snapshot();
        let matched: Vec<_> = set.ordered().iter().filter(|p| p.is_match(line)).collect();

        Classification {
            level: matched.first().map_or(LogLevel::Info, |p| p.level),
            matched_patterns: matched.iter().map(|p| p.id.clone()).collect(),
            patterns_checked: set.len(),
        }
    }

    /// 라인을 분류하여 불변 엔트리를 만듭니다.
    ///
    /// 메시지는 앞뒤 공백이 제거된 상태로 저장됩니다.
    /// 타임스탬프가 없으면 현재 시각이 사용됩니다.
    ///
    /// # Errors
    /// 라인이 최대 길이를 넘으면 [`LogPipelineError::LineTooLarge`]를 반환합니다.
    pub fn classify_entry(
        &self,
        line: &str,
        key: &str,
        timestamp: Option<DateTime<Utc>>,
        channel: SourceChannel,
    ) -> Result<LogEntry, LogPipelineError> {
        self.check_length(line)?;

        let message = line.trim();
        let classification = self.detect(message);
        self.record(classification.level);

        let mut metadata = BTreeMap::new();
        metadata.insert(
            "classification_method".to_owned(),
            Value::from("pattern_matching"),
        );
        metadata.insert(
            "patterns_checked".to_owned(),
            Value::from(classification.patterns_checked),
        );

        Ok(LogEntry {
            timestamp: timestamp.unwrap_or_else(Utc::now),
            level: classification.level,
            message: message.to_owned(),
            key: key.to_owned(),
            channel,
            matched_patterns: classification.matched_patterns,
            metadata,
        })
    }

    /// [`RawLine`]을 분류합니다.
    pub fn classify_raw(&self, raw: &RawLine) -> Result<LogEntry, LogPipelineError> {
        self.classify_entry(&raw.line, &raw.key, raw.timestamp, raw.channel)
    }

    /// JSON 항목 배치를 분류합니다. 실패하지 않습니다.
    ///
    /// 항목 형식: `{"text": ..., "process_name"|"key": ..., "timestamp"?: ..., "channel"?: ...}`.
    /// 해석할 수 없는 항목은 `error` 레벨의 placeholder 엔트리로 대체됩니다.
    pub fn classify_batch(&self, items: &[Value]) -> Vec<LogEntry> {
        items
            .iter()
            .map(|item| {
                self.classify_item(item).unwrap_or_else(|e| {
                    tracing::error!(error = %e, "error classifying batch item");
                    placeholder(item, &e)
                })
            })
            .collect()
    }

    fn classify_item(&self, item: &Value) -> Result<LogEntry, LogPipelineError> {
        let object = item
            .as_object()
            .ok_or_else(|| LogPipelineError::InvalidItem("item is not an object".to_owned()))?;

        let text = match object.get("text") {
            Some(Value::String(text)) => text,
            Some(_) => {
                return Err(LogPipelineError::InvalidItem(
                    "'text' must be a string".to_owned(),
                ));
            }
            None => return Err(LogPipelineError::InvalidItem("missing 'text'".to_owned())),
        };

        let key = object
            .get("process_name")
            .or_else(|| object.get("key"))
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_KEY);

        let timestamp = match object.get("timestamp") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(parse_timestamp(s)?),
            Some(other) => {
                return Err(LogPipelineError::InvalidItem(format!(
                    "unsupported timestamp value: {other}"
                )));
            }
        };

        let channel = match object.get("channel").and_then(Value::as_str) {
            Some("stderr") => SourceChannel::Stderr,
            _ => SourceChannel::Stdout,
        };

        self.classify_entry(text, key, timestamp, channel)
    }

    /// 샘플 라인을 시험 분류합니다. 누적 통계는 변경되지 않습니다.
    pub fn classify_samples<S: AsRef<str>>(&self, lines: &[S]) -> SampleReport {
        let mut report = SampleReport {
            total_tested: lines.len(),
            ..SampleReport::default()
        };

        for line in lines {
            let input = line.as_ref();
            let result = match self.check_length(input) {
                Ok(()) => {
                    let classification = self.detect(input.trim());
                    *report
                        .classifications
                        .entry(classification.level)
                        .or_insert(0) += 1;
                    SampleResult {
                        input: input.to_owned(),
                        level: Some(classification.level),
                        matched_patterns: classification.matched_patterns,
                        error: None,
                    }
                }
                Err(e) => SampleResult {
                    input: input.to_owned(),
                    level: None,
                    matched_patterns: Vec::new(),
                    error: Some(e.to_string()),
                },
            };
            report.details.push(result);
        }

        report
    }

    /// 누적 통계 스냅샷
    pub fn stats(&self) -> ClassificationStats {
        self.stats.lock().clone()
    }

    /// 누적 통계를 초기화합니다.
    pub fn reset_stats(&self) {
        *self.stats.lock() = ClassificationStats::default();
        tracing::debug!("classification statistics reset");
    }

    fn check_length(&self, line: &str) -> Result<(), LogPipelineError> {
        if line.len() > self.max_line_length {
            return Err(LogPipelineError::LineTooLarge {
                size: line.len(),
                max: self.max_line_length,
            });
        }
        Ok(())
    }

    fn record(&self, level: LogLevel) {
        let mut stats = self.stats.lock();
        stats.total_classified += 1;
        *stats.by_level.entry(level).or_insert(0) += 1;
    }
}

/// RFC 3339 또는 시간대 없는 ISO 8601 (UTC로 간주) 타임스탬프를 해석합니다.
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, LogPipelineError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| LogPipelineError::InvalidItem(format!("invalid timestamp '{s}': {e}")))
}

fn placeholder(item: &Value, error: &LogPipelineError) -> LogEntry {
    let mut metadata = BTreeMap::new();
    metadata.insert("classification_method".to_owned(), Value::from("placeholder"));
    metadata.insert("error".to_owned(), Value::from(error.to_string()));
    metadata.insert("original_entry".to_owned(), item.clone());

    LogEntry {
        timestamp: Utc::now(),
        level: LogLevel::Error,
        message: format!("Classification error: {error}"),
        key: PLACEHOLDER_KEY.to_owned(),
        channel: SourceChannel::Stderr,
        matched_patterns: Vec::new(),
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternFlags;
    use serde_json::json;

    fn classifier() -> Classifier {
        Classifier::new(Arc::new(PatternRegistry::with_defaults()))
    }

    #[test]
    fn default_patterns_classify_common_lines() {
        let c = classifier();
        assert_eq!(c.classify("ERROR: disk full"), LogLevel::Error);
        assert_eq!(c.classify("WARNING: low memory"), LogLevel::Warning);
        assert_eq!(c.classify("plain status line"), LogLevel::Info);
        assert_eq!(c.classify("[DEBUG] cache miss"), LogLevel::Debug);
    }

    #[test]
    fn no_match_defaults_to_info() {
        let c = classifier();
        let result = c.detect("nothing to see");
        assert_eq!(result.level, LogLevel::Info);
        assert!(result.matched_patterns.is_empty());
        assert_eq!(result.patterns_checked, 8);
    }

    #[test]
    fn lower_priority_number_wins_regardless_of_registration_order() {
        let c = classifier();
        // "Starting" (info, 3) 와 "warn" (warning, 2) 이 모두 매칭
        assert_eq!(c.classify("Starting with warn flag"), LogLevel::Warning);
        // "Server" (info, 3) 와 "Exception" (error, 1)
        assert_eq!(c.classify("Server raised Exception"), LogLevel::Error);
    }

    #[test]
    fn custom_priority_zero_overrides_fatal() {
        let c = classifier();
        c.registry()
            .add_custom(LogLevel::Critical, "OOM-KILLED", 0, PatternFlags::default())
            .unwrap();
        assert_eq!(
            c.classify("Fatal: Process OOM-KILLED by kernel"),
            LogLevel::Critical
        );
    }

    #[test]
    fn classify_entry_builds_metadata_and_trims() {
        let c = classifier();
        let entry = c
            .classify_entry("  ERROR: boom  ", "svc", None, SourceChannel::Stderr)
            .unwrap();
        assert_eq!(entry.message, "ERROR: boom");
        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.key, "svc");
        assert_eq!(entry.channel, SourceChannel::Stderr);
        assert_eq!(
            entry.metadata["classification_method"],
            json!("pattern_matching")
        );
        assert_eq!(entry.metadata["patterns_checked"], json!(8));
        assert!(entry.matched_patterns.iter().any(|id| id.starts_with("error:")));
    }

    #[test]
    fn classify_entry_rejects_oversize_line() {
        let c = classifier().with_max_line_length(8);
        let err = c
            .classify_entry("0123456789", "svc", None, SourceChannel::Stdout)
            .unwrap_err();
        assert!(matches!(err, LogPipelineError::LineTooLarge { size: 10, max: 8 }));
        assert_eq!(c.stats().total_classified, 0);
    }

    #[test]
    fn stats_track_levels_and_reset() {
        let c = classifier();
        for line in ["ERROR a", "ERROR b", "hello"] {
            c.classify_entry(line, "svc", None, SourceChannel::Stdout)
                .unwrap();
        }
        let stats = c.stats();
        assert_eq!(stats.total_classified, 3);
        assert_eq!(stats.by_level[&LogLevel::Error], 2);
        assert_eq!(stats.by_level[&LogLevel::Info], 1);

        c.reset_stats();
        assert_eq!(c.stats(), ClassificationStats::default());
    }

    #[test]
    fn classify_batch_replaces_bad_items_with_placeholders() {
        let c = classifier();
        let items = vec![
            json!({"text": "WARN disk", "process_name": "db", "timestamp": "2024-05-01T10:00:00Z"}),
            json!("not an object"),
            json!({"text": 42}),
            json!({"text": "ok", "timestamp": "yesterday"}),
            json!({"text": "ok", "key": "api", "timestamp": "2024-05-01T10:00:00"}),
        ];
        let entries = c.classify_batch(&items);
        assert_eq!(entries.len(), 5);

        assert_eq!(entries[0].level, LogLevel::Warning);
        assert_eq!(entries[0].key, "db");
        assert_eq!(entries[0].timestamp.to_rfc3339(), "2024-05-01T10:00:00+00:00");

        for placeholder in &entries[1..4] {
            assert_eq!(placeholder.level, LogLevel::Error);
            assert_eq!(placeholder.key, "classifier");
            assert_eq!(
                placeholder.metadata["classification_method"],
                json!("placeholder")
            );
            assert!(placeholder.metadata.contains_key("original_entry"));
        }

        assert_eq!(entries[4].key, "api");
        assert_eq!(entries[4].level, LogLevel::Info);
    }

    #[test]
    fn classify_batch_missing_key_uses_unknown() {
        let c = classifier();
        let entries = c.classify_batch(&[json!({"text": "hello"})]);
        assert_eq!(entries[0].key, "unknown");
    }

    #[test]
    fn classify_samples_does_not_touch_stats() {
        let c = classifier().with_max_line_length(32);
        let long = "x".repeat(64);
        let report = c.classify_samples(&["ERROR one", "WARN two", "three", long.as_str()]);
        assert_eq!(report.total_tested, 4);
        assert_eq!(report.classifications[&LogLevel::Error], 1);
        assert_eq!(report.classifications[&LogLevel::Warning], 1);
        assert_eq!(report.classifications[&LogLevel::Info], 1);
        assert!(report.details[3].error.is_some());
        assert_eq!(c.stats().total_classified, 0);
    }
}
