//! 패턴 레지스트리 -- 레벨별 분류 패턴의 소유와 원자적 교체
//!
//! [`PatternRegistry`]는 현재 [`PatternSet`]을 `RwLock<Arc<PatternSet>>`로 보관합니다.
//! 읽기 측은 [`snapshot`](PatternRegistry::snapshot)으로 `Arc`를 복제해 잠금 없이 사용하고,
//! 쓰기 측(사용자 패턴 추가/삭제, 재로드)은 새 집합을 만든 뒤 포인터만 교체합니다.
//! 따라서 어떤 읽기도 절반만 갱신된 상태를 보지 않습니다.
//!
//! # 패턴 문서 형식
//! ```yaml
//! patterns:
//!   error:
//!     - regex: "ERROR|Exception|Traceback|Fatal|Critical"
//!       priority: 1
//!       flags: [IGNORECASE]
//!   warning:
//!     - "\\[WARN\\]"
//! custom_patterns:
//!   critical:
//!     - regex: "OOM-KILLED"
//!       priority: 0
//! ```
//!
//! # 구성
//! - [`loader`]: 파일/인라인/기본값 소스 로딩
//! - [`set`]: 불변 패턴 집합과 평가 순서
//! - [`types`]: 패턴과 문서 항목 타입

pub mod loader;
pub mod set;
pub mod types;

pub use loader::{PatternLoader, PatternSource};
pub use set::{LevelPatternStats, PatternSet, PatternStats};
pub use types::{Pattern, PatternFlags, PatternOrigin};

use std::collections::BTreeMap;
use std::sync::Arc;

use logsift_core::types::LogLevel;
use parking_lot::RwLock;

use crate::error::LogPipelineError;

/// 분류 패턴 레지스트리
pub struct PatternRegistry {
    source: PatternSource,
    current: RwLock<Arc<PatternSet>>,
}

impl PatternRegistry {
    /// 내장 기본 패턴으로 레지스트리를 생성합니다.
    pub fn with_defaults() -> Self {
        Self::from_set(PatternSource::Defaults, PatternLoader::defaults())
    }

    /// 이미 만들어진 집합으로 레지스트리를 생성합니다.
    pub fn from_set(source: PatternSource, set: PatternSet) -> Self {
        metrics::gauge!(logsift_core::metrics::PATTERNS_LOADED).set(set.len() as f64);
        Self {
            source,
            current: RwLock::new(Arc::new(set)),
        }
    }

    /// 소스에서 패턴을 로드합니다. 항상 사용 가능한 레지스트리를 반환합니다.
    pub async fn load(source: PatternSource) -> Self {
        let set = PatternLoader::load(&source).await;
        Self::from_set(source, set)
    }

    /// 소스에서 패턴을 엄격하게 로드합니다.
    ///
    /// # Errors
    /// 소스를 읽을 수 없거나, 문서가 손상되었거나, 잘못된 항목이 있으면 에러를 반환합니다.
    pub async fn try_load(source: PatternSource) -> Result<Self, LogPipelineError> {
        let set = PatternLoader::try_load(&source).await?;
        Ok(Self::from_set(source, set))
    }

    /// 패턴 소스
    pub fn source(&self) -> &PatternSource {
        &self.source
    }

    /// 현재 패턴 집합의 스냅샷
    pub fn snapshot(&self) -> Arc<PatternSet> {
        Arc::clone(&self.current.read())
    }

    /// 레벨의 패턴 목록 (표준 + 사용자 정의, 우선순위 순)
    pub fn get(&self, level: LogLevel) -> Vec<Arc<Pattern>> {
        self.snapshot().get(level)
    }

    /// 패턴이 있는 모든 레벨의 패턴 목록
    pub fn get_all(&self) -> BTreeMap<LogLevel, Vec<Arc<Pattern>>> {
        self.snapshot().get_all()
    }

    /// 사용자 정의 패턴을 추가합니다.
    ///
    /// # Errors
    /// 정규식을 컴파일할 수 없으면 [`LogPipelineError::Pattern`]을 반환하며,
    /// 이때 레지스트리는 변경되지 않습니다.
    pub fn add_custom(
        &self,
        level: LogLevel,
        regex: &str,
        priority: i32,
        flags: PatternFlags,
    ) -> Result<Arc<Pattern>, LogPipelineError> {
        let mut current = self.current.write();
        let (next, pattern) = current.with_custom(level, regex, priority, flags)?;
        metrics::gauge!(logsift_core::metrics::PATTERNS_LOADED).set(next.len() as f64);
        *current = Arc::new(next);
        drop(current);

        tracing::info!(level = %level, regex, priority, "added custom pattern");
        Ok(pattern)
    }

    /// 정규식이 일치하는 첫 번째 사용자 정의 패턴을 제거합니다.
    ///
    /// 제거했으면 `true`, 해당 패턴이 없으면 `false`를 반환합니다.
    pub fn remove_custom(&self, level: LogLevel, regex: &str) -> bool {
        let mut current = self.current.write();
        let Some(next) = current.without_custom(level, regex) else {
            return false;
        };
        metrics::gauge!(logsift_core::metrics::PATTERNS_LOADED).set(next.len() as f64);
        *current = Arc::new(next);
        drop(current);

        tracing::info!(level = %level, regex, "removed custom pattern");
        true
    }

    /// 패턴 집합을 검증하고 문제 목록을 반환합니다. 실패하지 않습니다.
    ///
    /// 로드 진단과 저장된 모든 패턴의 재컴파일 결과를 포함합니다.
    pub fn validate(&self) -> Vec<String> {
        let set = self.snapshot();
        let mut errors: Vec<String> = set.diagnostics().to_vec();
        for pattern in set.ordered() {
            if let Err(e) = pattern.recompile() {
                errors.push(format!(
                    "invalid pattern in level {}: {} - {e}",
                    pattern.level, pattern.regex
                ));
            }
        }
        errors
    }

    /// 소스를 다시 읽어 전체 패턴 집합을 원자적으로 교체합니다.
    ///
    /// 런타임에 추가된 사용자 정의 패턴 중 소스에 없는 것은 사라집니다.
    /// 새 집합의 패턴 수를 반환합니다.
    pub async fn reload(&self) -> usize {
        let next = PatternLoader::load(&self.source).await;
        let count = next.len();
        *self.current.write() = Arc::new(next);

        metrics::gauge!(logsift_core::metrics::PATTERNS_LOADED).set(count as f64);
        metrics::counter!(logsift_core::metrics::PATTERNS_RELOADS_TOTAL).increment(1);
        tracing::info!(source = %self.source, patterns = count, "reloaded log patterns");
        count
    }

    /// 패턴 통계
    pub fn stats(&self) -> PatternStats {
        self.snapshot().stats()
    }
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
