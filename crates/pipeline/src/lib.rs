//! logsift 로그 분류/수집 파이프라인
//!
//! 프로세스가 출력한 원시 라인을 우선순위 기반 패턴 매칭으로 레벨별로 분류하고,
//! 제한된 인메모리 링 버퍼에 보관하며, 필터 조회와 집계 통계를 제공합니다.
//!
//! # 모듈 구성
//!
//! - [`pattern`]: 레벨별 패턴 레지스트리 (YAML 로드, 사용자 패턴, 원자적 재로드)
//! - [`classifier`]: 라인 하나의 레벨 결정과 엔트리 생성
//! - [`store`]: 프로세스 키별/전역 링 버퍼와 조회
//! - [`stats`]: 처리 통계와 처리율
//! - [`observer`]: 엔트리 옵저버 trait과 클로저 어댑터
//! - [`alert`]: error/critical 알림 싱크
//! - [`pipeline`]: 수집 경로 오케스트레이션 (단건, 배치, 스트림, 백그라운드 큐)
//! - [`config`]: 파이프라인 설정 (core 설정에서 파생)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! (line, key, ts?) -> IngestionPipeline -> Classifier -> LogStore -> observers -> AlertSink
//!                           |                  |
//!                     bounded queue      PatternRegistry (Arc<PatternSet> swap)
//! ```

pub mod alert;
pub mod classifier;
pub mod config;
pub mod error;
pub mod observer;
pub mod pattern;
pub mod pipeline;
pub mod stats;
pub mod store;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{IngestionPipeline, IngestionPipelineBuilder, PipelineStats};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 패턴
pub use pattern::{Pattern, PatternFlags, PatternRegistry, PatternSource};

// 분류기
pub use classifier::{Classification, Classifier};

// 저장소
pub use store::{LogQuery, LogStore, StoreSummary};

// 옵저버 / 알림
pub use alert::{AlertSink, ChannelAlertSink, LogAlertSink};
pub use observer::{FnObserver, LogObserver};
