//! 불변 패턴 집합
//!
//! [`PatternSet`]은 한 번 만들어지면 변경되지 않습니다.
//! 추가/삭제는 새 집합을 만들어 레지스트리에서 통째로 교체하는 방식으로 이루어집니다.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use logsift_core::types::LogLevel;
use serde::Serialize;

use super::types::{Pattern, PatternFlags, PatternOrigin};
use crate::error::LogPipelineError;

/// 레벨별 패턴 수
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LevelPatternStats {
    /// 전체 패턴 수
    pub total_patterns: usize,
    /// 표준 패턴 수
    pub standard_patterns: usize,
    /// 사용자 정의 패턴 수
    pub custom_patterns: usize,
}

/// 패턴 집합 통계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatternStats {
    /// 패턴이 하나 이상 있는 레벨 수
    pub total_levels: usize,
    /// 전체 패턴 수
    pub total_patterns: usize,
    /// 레벨별 상세
    pub levels: BTreeMap<LogLevel, LevelPatternStats>,
}

/// 레벨별 패턴 목록과 전역 평가 순서를 담는 불변 집합
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    /// 레벨이 처음 패턴을 받은 순서 (동일 우선순위 tie-break 기준)
    level_order: Vec<LogLevel>,
    standard: HashMap<LogLevel, Vec<Arc<Pattern>>>,
    custom: HashMap<LogLevel, Vec<Arc<Pattern>>>,
    /// (priority, level rank, seq) 오름차순으로 정렬된 전체 패턴
    ordered: Vec<Arc<Pattern>>,
    /// 로드 중 건너뛴 항목에 대한 진단 메시지
    diagnostics: Vec<String>,
    next_seq: u64,
}

impl PatternSet {
    /// 빈 집합을 생성합니다.
    pub fn empty() -> Self {
        Self::default()
    }

    /// 패턴을 컴파일하여 추가합니다. 평가 순서는 [`finish`](Self::finish)에서 갱신됩니다.
    pub(crate) fn insert(
        &mut self,
        level: LogLevel,
        regex: &str,
        priority: i32,
        flags: PatternFlags,
        origin: PatternOrigin,
    ) -> Result<Arc<Pattern>, LogPipelineError> {
        let pattern = Arc::new(Pattern::compile(
            level,
            regex,
            priority,
            flags,
            origin,
            self.next_seq,
        )?);
        self.next_seq += 1;

        if !self.level_order.contains(&level) {
            self.level_order.push(level);
        }

        let bucket = match origin {
            PatternOrigin::Standard => &mut self.standard,
            PatternOrigin::Custom => &mut self.custom,
        };
        bucket.entry(level).or_default().push(Arc::clone(&pattern));
        Ok(pattern)
    }

    /// 레벨 순서만 미리 등록합니다 (문서에 레벨은 있으나 유효한 항목이 없을 때).
    pub(crate) fn note_level(&mut self, level: LogLevel) {
        if !self.level_order.contains(&level) {
            self.level_order.push(level);
        }
    }

    /// 진단 메시지를 기록합니다.
    pub(crate) fn push_diagnostic(&mut self, message: String) {
        self.diagnostics.push(message);
    }

    /// 전역 평가 순서를 다시 계산하고 집합을 확정합니다.
    pub(crate) fn finish(mut self) -> Self {
        let mut ordered: Vec<Arc<Pattern>> = self
            .standard
            .values()
            .chain(self.custom.values())
            .flatten()
            .cloned()
            .collect();
        ordered.sort_by_key(|p| (p.priority, self.level_rank(p.level), p.seq));
        self.ordered = ordered;
        self
    }

    /// 사용자 정의 패턴을 추가한 새 집합을 만듭니다. 실패하면 원본은 그대로입니다.
    pub(crate) fn with_custom(
        &self,
        level: LogLevel,
        regex: &str,
        priority: i32,
        flags: PatternFlags,
    ) -> Result<(Self, Arc<Pattern>), LogPipelineError> {
        let mut next = self.clone();
        let pattern = next.insert(level, regex, priority, flags, PatternOrigin::Custom)?;
        Ok((next.finish(), pattern))
    }

    /// 정규식 문자열이 일치하는 첫 번째 사용자 정의 패턴을 제거한 새 집합을 만듭니다.
    pub(crate) fn without_custom(&self, level: LogLevel, regex: &str) -> Option<Self> {
        let position = self
            .custom
            .get(&level)?
            .iter()
            .position(|p| p.regex == regex)?;

        let mut next = self.clone();
        if let Some(bucket) = next.custom.get_mut(&level) {
            bucket.remove(position);
            if bucket.is_empty() {
                next.custom.remove(&level);
            }
        }
        Some(next.finish())
    }

    fn level_rank(&self, level: LogLevel) -> usize {
        self.level_order
            .iter()
            .position(|l| *l == level)
            .unwrap_or(self.level_order.len())
    }

    /// 레벨의 표준 + 사용자 정의 패턴을 우선순위 순으로 반환합니다.
    pub fn get(&self, level: LogLevel) -> Vec<Arc<Pattern>> {
        let mut merged: Vec<Arc<Pattern>> = self
            .standard
            .get(&level)
            .into_iter()
            .chain(self.custom.get(&level))
            .flatten()
            .cloned()
            .collect();
        merged.sort_by_key(|p| (p.priority, p.seq));
        merged
    }

    /// 패턴이 하나 이상 있는 모든 레벨의 목록을 반환합니다.
    pub fn get_all(&self) -> BTreeMap<LogLevel, Vec<Arc<Pattern>>> {
        self.levels().map(|level| (level, self.get(level))).collect()
    }

    /// 패턴이 하나 이상 있는 레벨 (등록 순서)
    pub fn levels(&self) -> impl Iterator<Item = LogLevel> + '_ {
        self.level_order
            .iter()
            .copied()
            .filter(|level| self.count(*level) > 0)
    }

    fn count(&self, level: LogLevel) -> usize {
        self.standard.get(&level).map_or(0, Vec::len) + self.custom.get(&level).map_or(0, Vec::len)
    }

    /// 전역 평가 순서로 정렬된 전체 패턴
    pub fn ordered(&self) -> &[Arc<Pattern>] {
        &self.ordered
    }

    /// 전체 패턴 수
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// 패턴이 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// 로드 진단 메시지
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// 통계를 계산합니다.
    pub fn stats(&self) -> PatternStats {
        let levels: BTreeMap<LogLevel, LevelPatternStats> = self
            .levels()
            .map(|level| {
                let standard_patterns = self.standard.get(&level).map_or(0, Vec::len);
                let custom_patterns = self.custom.get(&level).map_or(0, Vec::len);
                (
                    level,
                    LevelPatternStats {
                        total_patterns: standard_patterns + custom_patterns,
                        standard_patterns,
                        custom_patterns,
                    },
                )
            })
            .collect();

        PatternStats {
            total_levels: levels.len(),
            total_patterns: self.len(),
            levels,
        }
    }
}
