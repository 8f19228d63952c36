//! 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`LogsiftConfig`](logsift_core::config::LogsiftConfig)의
//! `[pipeline]`/`[store]` 섹션을 합쳐 파이프라인이 사용하는 형태로 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use logsift_core::config::LogsiftConfig;
//! use logsift_pipeline::config::PipelineConfig;
//!
//! let core_config = LogsiftConfig::default();
//! let config = PipelineConfig::from_core(&core_config);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use logsift_core::config::LogsiftConfig;
use serde::{Deserialize, Serialize};

use crate::error::LogPipelineError;

/// 파이프라인 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 프로세스 키별 버퍼 용량
    pub per_key_capacity: usize,
    /// 전역 버퍼 용량 배수
    pub global_multiplier: usize,
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
    /// 패턴 파일 경로 (None이면 내장 기본 패턴)
    pub pattern_file: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            per_key_capacity: 10_000,
            global_multiplier: 10,
            queue_capacity: 1000,
            batch_size: 100,
            chunk_size: 100,
            poll_interval_ms: 1000,
            rate_interval_secs: 10,
            max_line_length: 64 * 1024,
            alerts_enabled: true,
            pattern_file: None,
        }
    }
}

impl PipelineConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &LogsiftConfig) -> Self {
        let pipeline = &core.pipeline;
        Self {
            per_key_capacity: core.store.per_key_capacity,
            global_multiplier: core.store.global_multiplier,
            queue_capacity: pipeline.queue_capacity,
            batch_size: pipeline.batch_size,
            chunk_size: pipeline.chunk_size,
            poll_interval_ms: pipeline.poll_interval_ms,
            rate_interval_secs: pipeline.rate_interval_secs,
            max_line_length: pipeline.max_line_length,
            alerts_enabled: pipeline.alerts_enabled,
            pattern_file: (!pipeline.pattern_file.is_empty())
                .then(|| PathBuf::from(&pipeline.pattern_file)),
        }
    }

    /// 전역 버퍼 용량
    pub fn global_capacity(&self) -> usize {
        self.per_key_capacity.saturating_mul(self.global_multiplier)
    }

    /// 워커 폴링 타임아웃
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 처리율 재계산 간격
    pub fn rate_interval(&self) -> Duration {
        Duration::from_secs(self.rate_interval_secs)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        const MAX_QUEUE_CAPACITY: usize = 10_000_000;
        const MAX_POLL_INTERVAL_MS: u64 = 60_000;

        let positive = [
            ("per_key_capacity", self.per_key_capacity),
            ("global_multiplier", self.global_multiplier),
            ("batch_size", self.batch_size),
            ("chunk_size", self.chunk_size),
            ("max_line_length", self.max_line_length),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(invalid(field, "must be greater than 0"));
            }
        }

        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(invalid(
                "queue_capacity",
                &format!("must be 1-{MAX_QUEUE_CAPACITY}"),
            ));
        }

        if self.poll_interval_ms == 0 || self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(invalid(
                "poll_interval_ms",
                &format!("must be 1-{MAX_POLL_INTERVAL_MS}"),
            ));
        }

        if self.rate_interval_secs == 0 {
            return Err(invalid("rate_interval_secs", "must be greater than 0"));
        }

        if self
            .per_key_capacity
            .checked_mul(self.global_multiplier)
            .is_none()
        {
            return Err(invalid(
                "global_multiplier",
                "per_key_capacity * global_multiplier overflows",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> LogPipelineError {
    LogPipelineError::Config {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 프로세스 키별 버퍼 용량을 설정합니다.
    pub fn per_key_capacity(mut self, capacity: usize) -> Self {
        self.config.per_key_capacity = capacity;
        self
    }

    /// 전역 버퍼 배수를 설정합니다.
    pub fn global_multiplier(mut self, multiplier: usize) -> Self {
        self.config.global_multiplier = multiplier;
        self
    }

    /// 백그라운드 큐 용량을 설정합니다.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// 배치 버퍼 크기를 설정합니다.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// 병렬 처리 청크 크기를 설정합니다.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// 워커 폴링 타임아웃(밀리초)을 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 처리율 재계산 간격(초)을 설정합니다.
    pub fn rate_interval_secs(mut self, secs: u64) -> Self {
        self.config.rate_interval_secs = secs;
        self
    }

    /// 최대 라인 길이를 설정합니다.
    pub fn max_line_length(mut self, length: usize) -> Self {
        self.config.max_line_length = length;
        self
    }

    /// 알림 활성화 여부를 설정합니다.
    pub fn alerts_enabled(mut self, enabled: bool) -> Self {
        self.config.alerts_enabled = enabled;
        self
    }

    /// 패턴 파일 경로를 설정합니다.
    pub fn pattern_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pattern_file = Some(path.into());
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
