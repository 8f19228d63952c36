//! 처리 통계
//!
//! [`ProcessingStats`]는 파이프라인이 처리한 라인 수, 에러 수, 레벨/프로세스/패턴별 분포,
//! 큐 거부 수, 주기적으로 재계산되는 처리율(라인/초)을 보관합니다.
//! 카운터는 [`reset`](ProcessingStats::reset) 외에는 줄어들지 않습니다.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use logsift_core::types::{LogEntry, LogLevel};
use serde::Serialize;

/// 기본 처리율 재계산 주기
pub const DEFAULT_RATE_INTERVAL: Duration = Duration::from_secs(10);

/// 처리 통계
#[derive(Debug, Clone)]
pub struct ProcessingStats {
    total_processed: u64,
    processing_errors: u64,
    queue_rejected: u64,
    level_counts: BTreeMap<LogLevel, u64>,
    process_counts: BTreeMap<String, u64>,
    pattern_matches: BTreeMap<String, u64>,
    processing_rate: f64,
    rate_interval: Duration,
    started_at: DateTime<Utc>,
    last_rate_update: Instant,
    processed_at_last_update: u64,
}

/// 직렬화 가능한 통계 스냅샷
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingStatsSnapshot {
    /// 처리된 라인 수
    pub total_processed: u64,
    /// 처리 에러 수
    pub processing_errors: u64,
    /// 큐 가득 참으로 거부된 라인 수
    pub queue_rejected: u64,
    /// 레벨별 처리 수
    pub level_counts: BTreeMap<LogLevel, u64>,
    /// 프로세스 키별 처리 수
    pub process_counts: BTreeMap<String, u64>,
    /// 패턴별 매칭 수
    pub pattern_matches: BTreeMap<String, u64>,
    /// 마지막으로 계산된 처리율 (라인/초)
    pub processing_rate: f64,
    /// 통계 시작 시각
    pub start_time: DateTime<Utc>,
}

impl ProcessingStats {
    /// 지정한 처리율 재계산 주기로 생성합니다.
    pub fn new(rate_interval: Duration) -> Self {
        Self {
            total_processed: 0,
            processing_errors: 0,
            queue_rejected: 0,
            level_counts: BTreeMap::new(),
            process_counts: BTreeMap::new(),
            pattern_matches: BTreeMap::new(),
            processing_rate: 0.0,
            rate_interval,
            started_at: Utc::now(),
            last_rate_update: Instant::now(),
            processed_at_last_update: 0,
        }
    }

    /// 처리된 엔트리를 기록하고, 주기가 지났으면 처리율을 재계산합니다.
    pub fn record_entry(&mut self, entry: &LogEntry) {
        self.total_processed += 1;
        *self.level_counts.entry(entry.level).or_insert(0) += 1;
        *self.process_counts.entry(entry.key.clone()).or_insert(0) += 1;
        for id in &entry.matched_patterns {
            *self.pattern_matches.entry(id.clone()).or_insert(0) += 1;
        }
        self.refresh_rate(Instant::now());
    }

    /// 처리 에러를 기록합니다.
    pub fn record_error(&mut self) {
        self.processing_errors += 1;
    }

    /// 큐 거부를 기록합니다.
    pub fn record_rejected(&mut self) {
        self.queue_rejected += 1;
    }

    fn refresh_rate(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_rate_update);
        if elapsed < self.rate_interval {
            return;
        }
        let processed = self.total_processed - self.processed_at_last_update;
        self.processing_rate = processed as f64 / elapsed.as_secs_f64();
        self.processed_at_last_update = self.total_processed;
        self.last_rate_update = now;
    }

    /// 모든 카운터를 0으로 되돌리고 시작 시각을 갱신합니다.
    pub fn reset(&mut self) {
        *self = Self::new(self.rate_interval);
    }

    /// 처리된 라인 수
    pub fn total_processed(&self) -> u64 {
        self.total_processed
    }

    /// 처리 에러 수
    pub fn processing_errors(&self) -> u64 {
        self.processing_errors
    }

    /// 큐 거부 수
    pub fn queue_rejected(&self) -> u64 {
        self.queue_rejected
    }

    /// 통계 시작 시각
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// 직렬화 가능한 스냅샷
    pub fn snapshot(&self) -> ProcessingStatsSnapshot {
        ProcessingStatsSnapshot {
            total_processed: self.total_processed,
            processing_errors: self.processing_errors,
            queue_rejected: self.queue_rejected,
            level_counts: self.level_counts.clone(),
            process_counts: self.process_counts.clone(),
            pattern_matches: self.pattern_matches.clone(),
            processing_rate: self.processing_rate,
            start_time: self.started_at,
        }
    }
}

impl Default for ProcessingStats {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_INTERVAL)
    }
}
