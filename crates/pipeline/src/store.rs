//! 로그 저장소 -- 프로세스 키별/전역 링 버퍼
//!
//! [`LogStore`]는 분류된 엔트리를 두 종류의 고정 용량 FIFO 버퍼에 보관합니다.
//! - 프로세스 키별 버퍼 (기본 10,000개)
//! - 전체 키를 아우르는 전역 버퍼 (기본 키별 용량의 10배)
//!
//! 버퍼가 가득 차면 가장 오래된 엔트리가 조용히 밀려납니다.
//! 추가는 하나의 동기 잠금 안에서 끝나며, await 지점을 포함하지 않습니다.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use logsift_core::types::{LogEntry, LogLevel};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::LogPipelineError;

/// 기본 키별 버퍼 용량
pub const DEFAULT_PER_KEY_CAPACITY: usize = 10_000;

/// 기본 전역 버퍼 배수
pub const DEFAULT_GLOBAL_MULTIPLIER: usize = 10;

/// 기본 조회 개수 제한
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// 조회 조건
///
/// 지정된 모든 조건은 AND로 결합됩니다. 시간 범위는 양 끝을 포함합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogQuery {
    /// 프로세스 키 (지정 시 키별 버퍼, 없으면 전역 버퍼에서 조회)
    #[serde(default)]
    pub key: Option<String>,
    /// 레벨
    #[serde(default)]
    pub level: Option<LogLevel>,
    /// 시작 시각 (포함)
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// 종료 시각 (포함)
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// 최대 반환 개수
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_QUERY_LIMIT
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            key: None,
            level: None,
            start_time: None,
            end_time: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl LogQuery {
    /// 조건 없는 조회를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 프로세스 키 조건
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// 레벨 조건
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// 시작 시각 조건 (포함)
    pub fn since(mut self, start: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self
    }

    /// 종료 시각 조건 (포함)
    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end_time = Some(end);
        self
    }

    /// 최대 반환 개수
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn matches(&self, entry: &LogEntry) -> bool {
        self.level.is_none_or(|level| entry.level == level)
            && self.start_time.is_none_or(|start| entry.timestamp >= start)
            && self.end_time.is_none_or(|end| entry.timestamp <= end)
    }
}

/// 시간 범위
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    /// 가장 이른 타임스탬프
    pub earliest: DateTime<Utc>,
    /// 가장 늦은 타임스탬프
    pub latest: DateTime<Utc>,
}

/// 버퍼 요약 통계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    /// 엔트리 수
    pub total_entries: usize,
    /// 레벨별 분포
    pub level_distribution: BTreeMap<LogLevel, usize>,
    /// 프로세스 키별 분포
    pub process_distribution: BTreeMap<String, usize>,
    /// 시간 범위 (엔트리가 없으면 None)
    pub time_range: Option<TimeRange>,
}

/// 저장소 점유 현황
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreOccupancy {
    /// 알려진 프로세스 키 수
    pub keys: usize,
    /// 전역 버퍼 엔트리 수
    pub global_entries: usize,
    /// 전역 버퍼 용량
    pub global_capacity: usize,
    /// 키별 버퍼 용량
    pub per_key_capacity: usize,
    /// 지금까지 밀려난 엔트리 수 (키별 + 전역)
    pub evicted: u64,
}

/// 고정 용량 FIFO 링 버퍼
#[derive(Debug)]
struct RingBuffer {
    entries: VecDeque<Arc<LogEntry>>,
    capacity: usize,
}

impl RingBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// 추가하고, 가장 오래된 엔트리가 밀려났으면 `true`를 반환합니다.
    fn push(&mut self, entry: Arc<LogEntry>) -> bool {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front();
            true
        } else {
            false
        };
        self.entries.push_back(entry);
        evicted
    }
}

#[derive(Debug)]
struct StoreInner {
    per_key: HashMap<String, RingBuffer>,
    global: RingBuffer,
    evicted: u64,
}

/// 분류된 로그 엔트리 저장소
#[derive(Debug)]
pub struct LogStore {
    per_key_capacity: usize,
    global_capacity: usize,
    inner: Mutex<StoreInner>,
}

impl LogStore {
    /// 지정한 용량으로 저장소를 생성합니다.
    ///
    /// # Errors
    /// 용량이 0이면 [`LogPipelineError::Config`]를 반환합니다.
    pub fn new(per_key_capacity: usize, global_capacity: usize) -> Result<Self, LogPipelineError> {
        if per_key_capacity == 0 {
            return Err(LogPipelineError::Config {
                field: "per_key_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if global_capacity == 0 {
            return Err(LogPipelineError::Config {
                field: "global_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(Self {
            per_key_capacity,
            global_capacity,
            inner: Mutex::new(StoreInner {
                per_key: HashMap::new(),
                global: RingBuffer::new(global_capacity),
                evicted: 0,
            }),
        })
    }

    /// 키별 용량만 지정하고 전역 용량은 기본 배수로 계산합니다.
    pub fn with_per_key_capacity(per_key_capacity: usize) -> Result<Self, LogPipelineError> {
        Self::new(
            per_key_capacity,
            per_key_capacity.saturating_mul(DEFAULT_GLOBAL_MULTIPLIER),
        )
    }

    /// 엔트리를 키별 버퍼와 전역 버퍼에 추가합니다.
    pub fn append(&self, entry: Arc<LogEntry>) {
        let mut inner = self.inner.lock();
        let per_key_capacity = self.per_key_capacity;

        let mut evicted = 0u64;
        if inner
            .per_key
            .entry(entry.key.clone())
            .or_insert_with(|| RingBuffer::new(per_key_capacity))
            .push(Arc::clone(&entry))
        {
            evicted += 1;
        }
        if inner.global.push(entry) {
            evicted += 1;
        }
        inner.evicted += evicted;
        let global_len = inner.global.entries.len();
        drop(inner);

        if evicted > 0 {
            metrics::counter!(logsift_core::metrics::STORE_EVICTIONS_TOTAL).increment(evicted);
        }
        metrics::gauge!(logsift_core::metrics::STORE_GLOBAL_ENTRIES).set(global_len as f64);
    }

    /// 조건에 맞는 엔트리를 최신순으로 반환합니다.
    ///
    /// 타임스탬프가 같으면 나중에 추가된 엔트리가 먼저 옵니다.
    pub fn query(&self, query: &LogQuery) -> Vec<Arc<LogEntry>> {
        if query.limit == 0 {
            return Vec::new();
        }

        let mut matched: Vec<Arc<LogEntry>> = {
            let inner = self.inner.lock();
            let buffer = match query.key.as_deref() {
                Some(key) => match inner.per_key.get(key) {
                    Some(buffer) => buffer,
                    None => return Vec::new(),
                },
                None => &inner.global,
            };
            buffer
                .entries
                .iter()
                .rev()
                .filter(|entry| query.matches(entry))
                .cloned()
                .collect()
        };

        // 안정 정렬: 동일 타임스탬프는 역순 추가 순서 유지
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matched.truncate(query.limit);
        matched
    }

    /// 키별 버퍼(키 지정 시) 또는 전역 버퍼의 요약 통계를 계산합니다.
    pub fn summary(&self, key: Option<&str>) -> StoreSummary {
        let inner = self.inner.lock();
        let buffer = match key {
            Some(key) => match inner.per_key.get(key) {
                Some(buffer) => buffer,
                None => return StoreSummary::default(),
            },
            None => &inner.global,
        };

        let mut summary = StoreSummary {
            total_entries: buffer.entries.len(),
            ..StoreSummary::default()
        };
        for entry in &buffer.entries {
            *summary.level_distribution.entry(entry.level).or_insert(0) += 1;
            *summary
                .process_distribution
                .entry(entry.key.clone())
                .or_insert(0) += 1;

            summary.time_range = Some(match summary.time_range {
                None => TimeRange {
                    earliest: entry.timestamp,
                    latest: entry.timestamp,
                },
                Some(range) => TimeRange {
                    earliest: range.earliest.min(entry.timestamp),
                    latest: range.latest.max(entry.timestamp),
                },
            });
        }
        summary
    }

    /// 알려진 프로세스 키 목록 (정렬됨)
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.lock().per_key.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// 키별 버퍼의 엔트리 수
    pub fn len_for(&self, key: &str) -> usize {
        self.inner
            .lock()
            .per_key
            .get(key)
            .map_or(0, |buffer| buffer.entries.len())
    }

    /// 전역 버퍼의 엔트리 수
    pub fn len(&self) -> usize {
        self.inner.lock().global.entries.len()
    }

    /// 전역 버퍼가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().global.entries.is_empty()
    }

    /// 점유 현황
    pub fn occupancy(&self) -> StoreOccupancy {
        let inner = self.inner.lock();
        StoreOccupancy {
            keys: inner.per_key.len(),
            global_entries: inner.global.entries.len(),
            global_capacity: self.global_capacity,
            per_key_capacity: self.per_key_capacity,
            evicted: inner.evicted,
        }
    }
}

impl Default for LogStore {
    fn default() -> Self {
        Self {
            per_key_capacity: DEFAULT_PER_KEY_CAPACITY,
            global_capacity: DEFAULT_PER_KEY_CAPACITY * DEFAULT_GLOBAL_MULTIPLIER,
            inner: Mutex::new(StoreInner {
                per_key: HashMap::new(),
                global: RingBuffer::new(DEFAULT_PER_KEY_CAPACITY * DEFAULT_GLOBAL_MULTIPLIER),
                evicted: 0,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use logsift_core::types::SourceChannel;

    fn entry(key: &str, level: LogLevel, message: &str, secs: i64) -> Arc<LogEntry> {
        Arc::new(LogEntry {
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            level,
            message: message.to_owned(),
            key: key.to_owned(),
            channel: SourceChannel::Stdout,
            matched_patterns: Vec::new(),
            metadata: BTreeMap::new(),
        })
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(LogStore::new(0, 10).is_err());
        assert!(LogStore::new(10, 0).is_err());
    }

    #[test]
    fn default_global_capacity_is_ten_times_per_key() {
        let store = LogStore::default();
        let occupancy = store.occupancy();
        assert_eq!(occupancy.per_key_capacity, 10_000);
        assert_eq!(occupancy.global_capacity, 100_000);
    }

    #[test]
    fn per_key_buffer_keeps_last_c_in_order() {
        let store = LogStore::new(3, 100).unwrap();
        for i in 0..5 {
            store.append(entry("svc", LogLevel::Info, &format!("m{i}"), i));
        }
        assert_eq!(store.len_for("svc"), 3);
        let newest_first: Vec<_> = store
            .query(&LogQuery::new().key("svc"))
            .iter()
            .map(|e| e.message.clone())
            .collect();
        assert_eq!(newest_first, vec!["m4", "m3", "m2"]);
        assert_eq!(store.occupancy().evicted, 2);
    }

    #[test]
    fn global_buffer_evicts_independently() {
        let store = LogStore::new(10, 2).unwrap();
        store.append(entry("a", LogLevel::Info, "a1", 0));
        store.append(entry("b", LogLevel::Info, "b1", 1));
        store.append(entry("a", LogLevel::Info, "a2", 2));
        assert_eq!(store.len(), 2);
        assert_eq!(store.len_for("a"), 2);
        assert_eq!(store.len_for("b"), 1);
    }

    #[test]
    fn query_composes_filters() {
        let store = LogStore::default();
        store.append(entry("svc", LogLevel::Error, "e1", 10));
        store.append(entry("svc", LogLevel::Info, "i1", 20));
        store.append(entry("svc", LogLevel::Error, "e2", 30));
        store.append(entry("other", LogLevel::Error, "e3", 40));

        let result = store.query(&LogQuery::new().key("svc").level(LogLevel::Error));
        let messages: Vec<_> = result.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["e2", "e1"]);

        let start = Utc.timestamp_opt(1_700_000_020, 0).unwrap();
        let end = Utc.timestamp_opt(1_700_000_040, 0).unwrap();
        let ranged = store.query(&LogQuery::new().since(start).until(end));
        let messages: Vec<_> = ranged.iter().map(|e| e.message.as_str()).collect();
        // 양 끝 포함
        assert_eq!(messages, vec!["e3", "e2", "i1"]);

        let limited = store.query(&LogQuery::new().limit(1));
        assert_eq!(limited[0].message, "e3");
    }

    #[test]
    fn query_unknown_key_is_empty() {
        let store = LogStore::default();
        store.append(entry("svc", LogLevel::Info, "x", 0));
        assert!(store.query(&LogQuery::new().key("nope")).is_empty());
        assert!(store.query(&LogQuery::new().limit(0)).is_empty());
    }

    #[test]
    fn query_sorts_by_timestamp_then_recency() {
        let store = LogStore::default();
        store.append(entry("svc", LogLevel::Info, "late", 50));
        store.append(entry("svc", LogLevel::Info, "early", 10));
        store.append(entry("svc", LogLevel::Info, "tie-a", 30));
        store.append(entry("svc", LogLevel::Info, "tie-b", 30));
        let messages: Vec<_> = store
            .query(&LogQuery::new())
            .iter()
            .map(|e| e.message.clone())
            .collect();
        assert_eq!(messages, vec!["late", "tie-b", "tie-a", "early"]);
    }

    #[test]
    fn summary_covers_full_buffer() {
        let store = LogStore::default();
        store.append(entry("a", LogLevel::Error, "1", 5));
        store.append(entry("b", LogLevel::Info, "2", 1));
        store.append(entry("a", LogLevel::Info, "3", 9));

        let all = store.summary(None);
        assert_eq!(all.total_entries, 3);
        assert_eq!(all.level_distribution[&LogLevel::Info], 2);
        assert_eq!(all.process_distribution["a"], 2);
        let range = all.time_range.unwrap();
        assert_eq!(range.earliest, Utc.timestamp_opt(1_700_000_001, 0).unwrap());
        assert_eq!(range.latest, Utc.timestamp_opt(1_700_000_009, 0).unwrap());

        let only_b = store.summary(Some("b"));
        assert_eq!(only_b.total_entries, 1);
        assert_eq!(store.summary(Some("missing")), StoreSummary::default());
    }

    #[test]
    fn keys_are_sorted() {
        let store = LogStore::default();
        store.append(entry("web", LogLevel::Info, "x", 0));
        store.append(entry("api", LogLevel::Info, "x", 0));
        assert_eq!(store.keys(), vec!["api", "web"]);
    }

    #[test]
    fn query_deserializes_with_default_limit() {
        let query: LogQuery = serde_json::from_str(r#"{"key":"svc","level":"error"}"#).unwrap();
        assert_eq!(query.limit, DEFAULT_QUERY_LIMIT);
        assert_eq!(query.level, Some(LogLevel::Error));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn buffers_never_exceed_capacity(
                capacity in 1usize..20,
                global in 1usize..40,
                keys in prop::collection::vec(0u8..4, 0..200),
            ) {
                let store = LogStore::new(capacity, global).unwrap();
                for (i, k) in keys.iter().enumerate() {
                    store.append(entry(&format!("k{k}"), LogLevel::Info, &i.to_string(), i as i64));
                }
                prop_assert!(store.len() <= global);
                for key in store.keys() {
                    prop_assert!(store.len_for(&key) <= capacity);
                }
            }
        }
    }
}
