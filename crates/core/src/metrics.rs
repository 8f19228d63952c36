//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 파이프라인은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않으면 모든 호출은 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logsift_`
//! - 모듈명: `pipeline_`, `store_`, `patterns_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(logsift_core::metrics::PIPELINE_LINES_PROCESSED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 레벨 레이블 키 (debug, info, warning, error, critical)
pub const LABEL_LEVEL: &str = "level";

/// 프로세스 키 레이블
pub const LABEL_PROCESS: &str = "process";

// ─── Pipeline 메트릭 ───────────────────────────────────────────────

/// Pipeline: 처리된 라인 수 (counter, label: level)
pub const PIPELINE_LINES_PROCESSED_TOTAL: &str = "logsift_pipeline_lines_processed_total";

/// Pipeline: 처리 에러 수 (counter)
pub const PIPELINE_PROCESSING_ERRORS_TOTAL: &str = "logsift_pipeline_processing_errors_total";

/// Pipeline: 큐가 가득 차서 거부된 라인 수 (counter)
pub const PIPELINE_QUEUE_REJECTED_TOTAL: &str = "logsift_pipeline_queue_rejected_total";

/// Pipeline: 발송된 알림 수 (counter, label: level)
pub const PIPELINE_ALERTS_TOTAL: &str = "logsift_pipeline_alerts_total";

/// Pipeline: 옵저버 실패 수 (counter)
pub const PIPELINE_OBSERVER_FAILURES_TOTAL: &str = "logsift_pipeline_observer_failures_total";

/// Pipeline: 백그라운드 큐 대기 라인 수 (gauge)
pub const PIPELINE_QUEUE_DEPTH: &str = "logsift_pipeline_queue_depth";

// ─── Store 메트릭 ──────────────────────────────────────────────────

/// Store: 링 버퍼에서 밀려난 엔트리 수 (counter)
pub const STORE_EVICTIONS_TOTAL: &str = "logsift_store_evictions_total";

/// Store: 전역 버퍼 내 엔트리 수 (gauge)
pub const STORE_GLOBAL_ENTRIES: &str = "logsift_store_global_entries";

// ─── Pattern 메트릭 ────────────────────────────────────────────────

/// Patterns: 등록된 패턴 수 (gauge)
pub const PATTERNS_LOADED: &str = "logsift_patterns_loaded";

/// Patterns: 재로드 횟수 (counter)
pub const PATTERNS_RELOADS_TOTAL: &str = "logsift_patterns_reloads_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// `logsift-daemon`이 시작 시점에 한 번 호출합니다.
/// 레코더가 설치되어 있지 않으면 아무 효과가 없습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        PIPELINE_LINES_PROCESSED_TOTAL,
        "Total number of lines classified and stored"
    );
    describe_counter!(
        PIPELINE_PROCESSING_ERRORS_TOTAL,
        "Total number of lines that failed classification"
    );
    describe_counter!(
        PIPELINE_QUEUE_REJECTED_TOTAL,
        "Total number of lines rejected because the background queue was full"
    );
    describe_counter!(
        PIPELINE_ALERTS_TOTAL,
        "Total number of error/critical entries handed to the alert sink"
    );
    describe_counter!(
        PIPELINE_OBSERVER_FAILURES_TOTAL,
        "Total number of observer notifications that failed or panicked"
    );
    describe_gauge!(
        PIPELINE_QUEUE_DEPTH,
        "Current number of lines waiting in the background queue"
    );

    describe_counter!(
        STORE_EVICTIONS_TOTAL,
        "Total number of entries evicted from ring buffers"
    );
    describe_gauge!(
        STORE_GLOBAL_ENTRIES,
        "Current number of entries in the global buffer"
    );

    describe_gauge!(PATTERNS_LOADED, "Number of patterns currently registered");
    describe_counter!(
        PATTERNS_RELOADS_TOTAL,
        "Total number of pattern set reloads"
    );
}
