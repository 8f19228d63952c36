//! 수집 파이프라인 오케스트레이션 -- 분류/저장/통계/알림의 전체 흐름을 관리합니다.
//!
//! [`IngestionPipeline`]은 라인 하나, 배치, 청크 단위 동시 배치, 스트림,
//! 백그라운드 큐 워커의 다섯 가지 수집 경로를 제공합니다.
//! 모든 경로는 같은 단계를 거칩니다.
//!
//! # 처리 흐름
//! ```text
//! RawLine -> Classifier -> LogStore.append -> ProcessingStats -> observers -> AlertSink
//!                                                                              (error/critical)
//! ```
//!
//! # 백그라운드 처리
//! ```text
//! enqueue_for_background --try_send--> [bounded queue] --recv/timeout--> worker --> ingest_raw
//! ```
//! 큐가 가득 차면 새 라인을 거부합니다 (drop-newest).
//! 워커는 종료할 때 큐 수신측을 돌려주므로 재시작 시 같은 큐를 다시 사용합니다.
//!
//! `IngestionPipeline`은 `Clone`이며 내부 상태를 `Arc`로 공유합니다.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::join_all;
use logsift_core::types::{LogEntry, LogLevel, RawLine};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::alert::{AlertSink, LogAlertSink, deliver_isolated};
use crate::classifier::{ClassificationStats, Classifier, SampleReport};
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::observer::{LogObserver, notify_isolated};
use crate::pattern::{Pattern, PatternFlags, PatternRegistry, PatternSource, PatternStats};
use crate::stats::{ProcessingStats, ProcessingStatsSnapshot};
use crate::store::{LogQuery, LogStore, StoreOccupancy, StoreSummary};

/// 파이프라인 통계 (직렬화 가능)
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    /// 처리 통계
    pub processing: ProcessingStatsSnapshot,
    /// 분류기 통계
    pub classification: ClassificationStats,
    /// 패턴 통계
    pub patterns: PatternStats,
    /// 저장소 점유 현황
    pub store: StoreOccupancy,
    /// 등록된 옵저버 수
    pub observers: usize,
    /// 백그라운드 큐 대기 라인 수
    pub queue_depth: usize,
    /// 백그라운드 큐 용량
    pub queue_capacity: usize,
    /// 백그라운드 워커 실행 여부
    pub background_running: bool,
    /// 파이프라인 생성 후 경과 시간 (초)
    pub uptime_secs: f64,
}

/// 백그라운드 워커 상태
enum WorkerState {
    /// 대기 중. 큐 수신측을 보관합니다.
    Idle(Option<mpsc::Receiver<RawLine>>),
    /// 실행 중
    Running {
        cancel: CancellationToken,
        handle: JoinHandle<mpsc::Receiver<RawLine>>,
    },
}

struct Inner {
    config: PipelineConfig,
    classifier: Classifier,
    store: LogStore,
    stats: Mutex<ProcessingStats>,
    observers: RwLock<Vec<Arc<dyn LogObserver>>>,
    alert_sink: Arc<dyn AlertSink>,
    queue_tx: mpsc::Sender<RawLine>,
    worker: tokio::sync::Mutex<WorkerState>,
    background_running: AtomicBool,
    batch_buffer: Mutex<Vec<RawLine>>,
    created_at: Instant,
}

/// 로그 수집 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use logsift_pipeline::{IngestionPipeline, PipelineConfig};
///
/// let pipeline = IngestionPipeline::from_config(PipelineConfig::default()).await?;
/// pipeline.ingest_line("ERROR: disk full", "svc1", None).await?;
/// pipeline.start_background_processing().await;
/// ```
#[derive(Clone)]
pub struct IngestionPipeline {
    inner: Arc<Inner>,
}

impl IngestionPipeline {
    /// 빌더를 생성합니다.
    pub fn builder() -> IngestionPipelineBuilder {
        IngestionPipelineBuilder::new()
    }

    /// 설정의 패턴 파일(없으면 내장 기본값)로 레지스트리를 로드하고 파이프라인을 만듭니다.
    ///
    /// 패턴 파일이 없거나 손상되어도 실패하지 않습니다.
    pub async fn from_config(config: PipelineConfig) -> Result<Self, LogPipelineError> {
        let source = match &config.pattern_file {
            Some(path) => PatternSource::file(path),
            None => PatternSource::Defaults,
        };
        let registry = PatternRegistry::load(source).await;
        IngestionPipelineBuilder::new()
            .config(config)
            .registry(Arc::new(registry))
            .build()
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// 패턴 레지스트리
    pub fn registry(&self) -> &Arc<PatternRegistry> {
        self.inner.classifier.registry()
    }

    /// 분류기
    pub fn classifier(&self) -> &Classifier {
        &self.inner.classifier
    }

    /// 로그 저장소
    pub fn store(&self) -> &LogStore {
        &self.inner.store
    }

    // --- 수집 경로 ---

    /// 라인 하나를 수집합니다.
    ///
    /// 빈 라인이나 공백만 있는 라인은 엔트리를 만들지 않으며 통계도 변경하지 않습니다.
    ///
    /// # Errors
    /// 분류에 실패하면 (라인 길이 초과) 에러를 반환하고 `processing_errors`를 증가시킵니다.
    pub async fn ingest_line(
        &self,
        line: &str,
        key: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Option<Arc<LogEntry>>, LogPipelineError> {
        let mut raw = RawLine::new(line, key);
        raw.timestamp = timestamp;
        self.ingest_raw(raw).await
    }

    /// 채널 정보가 포함된 [`RawLine`]을 수집합니다.
    pub async fn ingest_raw(&self, raw: RawLine) -> Result<Option<Arc<LogEntry>>, LogPipelineError> {
        if raw.line.trim().is_empty() {
            return Ok(None);
        }

        let entry = match self.inner.classifier.classify_raw(&raw) {
            Ok(entry) => Arc::new(entry),
            Err(e) => {
                self.inner.stats.lock().record_error();
                metrics::counter!(logsift_core::metrics::PIPELINE_PROCESSING_ERRORS_TOTAL)
                    .increment(1);
                tracing::warn!(key = %raw.key, error = %e, "failed to classify log line");
                return Err(e);
            }
        };

        self.inner.store.append(Arc::clone(&entry));
        self.inner.stats.lock().record_entry(&entry);
        metrics::counter!(
            logsift_core::metrics::PIPELINE_LINES_PROCESSED_TOTAL,
            logsift_core::metrics::LABEL_LEVEL => entry.level.as_str()
        )
        .increment(1);

        self.notify_observers(&entry).await;

        if entry.level.is_alertable() && self.inner.config.alerts_enabled {
            self.send_alert(&entry).await;
        }

        Ok(Some(entry))
    }

    /// 라인 배치를 순차적으로 수집합니다. 실패한 라인은 로그를 남기고 건너뜁니다.
    pub async fn ingest_batch<S: AsRef<str>>(&self, lines: &[S], key: &str) -> Vec<Arc<LogEntry>> {
        let mut entries = Vec::with_capacity(lines.len());
        for line in lines {
            match self.ingest_line(line.as_ref(), key, None).await {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => tracing::debug!(key, error = %e, "skipping batch line"),
            }
        }
        entries
    }

    /// 라인 배치를 청크 단위로 동시에 수집합니다.
    ///
    /// 청크 안의 라인들은 호출 태스크에서 `join_all`로 동시에 진행됩니다 (멀티코어 병렬 아님).
    /// `chunk_size`가 0이면 설정값을 사용합니다. 성공한 엔트리만 입력 순서대로 반환합니다.
    pub async fn ingest_batch_parallel<S: AsRef<str>>(
        &self,
        lines: &[S],
        key: &str,
        chunk_size: usize,
    ) -> Vec<Arc<LogEntry>> {
        let chunk_size = if chunk_size == 0 {
            self.inner.config.chunk_size
        } else {
            chunk_size
        };

        let mut entries = Vec::with_capacity(lines.len());
        for chunk in lines.chunks(chunk_size.max(1)) {
            let results = join_all(
                chunk
                    .iter()
                    .map(|line| self.ingest_line(line.as_ref(), key, None)),
            )
            .await;

            for result in results {
                match result {
                    Ok(Some(entry)) => entries.push(entry),
                    Ok(None) => {}
                    Err(e) => tracing::debug!(key, error = %e, "skipping parallel batch line"),
                }
            }
        }
        entries
    }

    /// 비동기 리더에서 EOF까지 라인을 읽어 수집합니다.
    ///
    /// 잘못된 UTF-8은 대체 문자로 바뀝니다. 생성된 엔트리 수를 반환합니다.
    ///
    /// # Errors
    /// 리더에서 I/O 에러가 발생하면 그때까지의 진행을 멈추고 에러를 반환합니다.
    pub async fn ingest_stream<R>(&self, mut reader: R, key: &str) -> Result<usize, LogPipelineError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf = Vec::new();
        let mut produced = 0usize;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            match self.ingest_line(&line, key, None).await {
                Ok(Some(_)) => produced += 1,
                Ok(None) => {}
                Err(e) => tracing::debug!(key, error = %e, "skipping stream line"),
            }
        }

        tracing::debug!(key, produced, "log stream reached EOF");
        Ok(produced)
    }

    // --- 백그라운드 큐 ---

    /// 라인을 백그라운드 큐에 넣습니다. 블로킹하지 않습니다.
    ///
    /// 큐가 가득 차면 `false`를 반환하고 `queue_rejected`를 증가시킵니다.
    pub fn enqueue_for_background(
        &self,
        line: &str,
        key: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> bool {
        let mut raw = RawLine::new(line, key);
        raw.timestamp = timestamp;
        self.enqueue_raw(raw)
    }

    /// [`RawLine`]을 백그라운드 큐에 넣습니다.
    pub fn enqueue_raw(&self, raw: RawLine) -> bool {
        match self.inner.queue_tx.try_send(raw) {
            Ok(()) => {
                metrics::gauge!(logsift_core::metrics::PIPELINE_QUEUE_DEPTH)
                    .set(self.queue_depth() as f64);
                true
            }
            Err(mpsc::error::TrySendError::Full(raw)) => {
                self.inner.stats.lock().record_rejected();
                metrics::counter!(logsift_core::metrics::PIPELINE_QUEUE_REJECTED_TOTAL)
                    .increment(1);
                tracing::warn!(key = %raw.key, "background queue full, dropping log line");
                false
            }
            Err(mpsc::error::TrySendError::Closed(raw)) => {
                tracing::error!(key = %raw.key, "background queue closed");
                false
            }
        }
    }

    /// 백그라운드 큐 대기 라인 수
    pub fn queue_depth(&self) -> usize {
        self.inner.queue_tx.max_capacity() - self.inner.queue_tx.capacity()
    }

    /// 백그라운드 워커 실행 여부
    pub fn is_background_running(&self) -> bool {
        self.inner.background_running.load(Ordering::SeqCst)
    }

    /// 백그라운드 워커를 시작합니다. 이미 실행 중이면 경고만 남깁니다.
    pub async fn start_background_processing(&self) {
        let mut state = self.inner.worker.lock().await;
        let rx = match &mut *state {
            WorkerState::Running { .. } => {
                tracing::warn!("background processing already running");
                return;
            }
            WorkerState::Idle(rx) => match rx.take() {
                Some(rx) => rx,
                None => {
                    tracing::error!("background queue receiver lost, cannot start worker");
                    return;
                }
            },
        };

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_worker(
            self.clone(),
            rx,
            cancel.clone(),
            self.inner.config.poll_interval(),
        ));
        *state = WorkerState::Running { cancel, handle };
        self.inner.background_running.store(true, Ordering::SeqCst);
        tracing::info!("background processing started");
    }

    /// 백그라운드 워커를 멈추고 종료될 때까지 기다립니다.
    ///
    /// 처리 중인 라인은 끝까지 처리되며, 큐에 남아 있던 라인은 버려집니다.
    /// 실행 중이 아니면 아무것도 하지 않습니다.
    pub async fn stop_background_processing(&self) {
        let mut state = self.inner.worker.lock().await;
        let (cancel, handle) = match std::mem::replace(&mut *state, WorkerState::Idle(None)) {
            WorkerState::Running { cancel, handle } => (cancel, handle),
            idle @ WorkerState::Idle(_) => {
                *state = idle;
                return;
            }
        };

        cancel.cancel();
        let rx = match handle.await {
            Ok(mut rx) => {
                let mut discarded = 0usize;
                while rx.try_recv().is_ok() {
                    discarded += 1;
                }
                if discarded > 0 {
                    tracing::info!(discarded, "discarded queued log lines on stop");
                }
                Some(rx)
            }
            Err(e) => {
                tracing::error!(error = %e, "background worker terminated abnormally");
                None
            }
        };

        *state = WorkerState::Idle(rx);
        self.inner.background_running.store(false, Ordering::SeqCst);
        metrics::gauge!(logsift_core::metrics::PIPELINE_QUEUE_DEPTH).set(0.0);
        tracing::info!("background processing stopped");
    }

    // --- 배치 버퍼 ---

    /// 클라이언트 측 배치 버퍼에 라인을 추가합니다.
    ///
    /// 버퍼가 설정된 배치 크기에 도달하면 버퍼를 비우고 비동기 플러시를 띄웁니다
    /// (fire-and-forget). 플러시를 띄웠으면 `true`를 반환합니다.
    ///
    /// Tokio 런타임 밖에서 호출되면 플러시를 띄우지 않고 라인을 버퍼에 남겨 둡니다.
    /// 이 경우 [`flush_batch_buffer`](Self::flush_batch_buffer)로 처리해야 합니다.
    pub fn add_to_batch_buffer(&self, line: &str, key: &str) -> bool {
        let (batch, runtime) = {
            let mut buffer = self.inner.batch_buffer.lock();
            buffer.push(RawLine::new(line, key));
            if buffer.len() < self.inner.config.batch_size {
                return false;
            }
            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                tracing::warn!(
                    buffered = buffer.len(),
                    "no tokio runtime, batch buffer kept until explicit flush"
                );
                return false;
            };
            (std::mem::take(&mut *buffer), runtime)
        };

        let pipeline = self.clone();
        runtime.spawn(async move {
            let produced = pipeline.process_buffered(batch).await;
            tracing::debug!(produced, "batch buffer flushed");
        });
        true
    }

    /// 배치 버퍼에 남은 라인을 즉시 처리하고 생성된 엔트리 수를 반환합니다.
    pub async fn flush_batch_buffer(&self) -> usize {
        let batch = std::mem::take(&mut *self.inner.batch_buffer.lock());
        if batch.is_empty() {
            return 0;
        }
        self.process_buffered(batch).await
    }

    /// 배치 버퍼에 쌓인 라인 수
    pub fn batch_buffer_len(&self) -> usize {
        self.inner.batch_buffer.lock().len()
    }

    /// 키별로 묶어 (키의 첫 등장 순서, 키 안에서는 입력 순서) 청크 동시 처리합니다.
    async fn process_buffered(&self, batch: Vec<RawLine>) -> usize {
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        for raw in batch {
            match groups.iter_mut().find(|(key, _)| *key == raw.key) {
                Some((_, lines)) => lines.push(raw.line),
                None => groups.push((raw.key, vec![raw.line])),
            }
        }

        let mut produced = 0;
        for (key, lines) in groups {
            produced += self.ingest_batch_parallel(&lines, &key, 0).await.len();
        }
        produced
    }

    // --- 옵저버 / 알림 ---

    /// 옵저버를 등록합니다. 같은 인스턴스(`Arc` 포인터 기준)가 이미 있으면 `false`.
    pub fn add_observer(&self, observer: Arc<dyn LogObserver>) -> bool {
        let mut observers = self.inner.observers.write();
        if observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            return false;
        }
        tracing::debug!(observer = observer.name(), "log observer added");
        observers.push(observer);
        true
    }

    /// 옵저버를 제거합니다. 등록되어 있지 않았으면 `false`.
    pub fn remove_observer(&self, observer: &Arc<dyn LogObserver>) -> bool {
        let mut observers = self.inner.observers.write();
        let before = observers.len();
        observers.retain(|o| !Arc::ptr_eq(o, observer));
        before != observers.len()
    }

    /// 등록된 옵저버 수
    pub fn observer_count(&self) -> usize {
        self.inner.observers.read().len()
    }

    async fn notify_observers(&self, entry: &LogEntry) {
        let observers: Vec<Arc<dyn LogObserver>> = self.inner.observers.read().clone();
        for observer in &observers {
            notify_isolated(observer, entry).await;
        }
    }

    async fn send_alert(&self, entry: &LogEntry) {
        metrics::counter!(
            logsift_core::metrics::PIPELINE_ALERTS_TOTAL,
            logsift_core::metrics::LABEL_LEVEL => entry.level.as_str()
        )
        .increment(1);
        deliver_isolated(&self.inner.alert_sink, entry).await;
    }

    // --- 조회 / 제어 ---

    /// 저장된 엔트리를 조회합니다.
    pub fn query(&self, query: &LogQuery) -> Vec<Arc<LogEntry>> {
        self.inner.store.query(query)
    }

    /// 저장소 요약 통계
    pub fn summary(&self, key: Option<&str>) -> StoreSummary {
        self.inner.store.summary(key)
    }

    /// 통합 통계
    pub fn get_stats(&self) -> PipelineStats {
        PipelineStats {
            processing: self.inner.stats.lock().snapshot(),
            classification: self.inner.classifier.stats(),
            patterns: self.registry().stats(),
            store: self.inner.store.occupancy(),
            observers: self.observer_count(),
            queue_depth: self.queue_depth(),
            queue_capacity: self.inner.queue_tx.max_capacity(),
            background_running: self.is_background_running(),
            uptime_secs: self.inner.created_at.elapsed().as_secs_f64(),
        }
    }

    /// 처리 통계와 분류기 통계를 함께 초기화합니다. 옵저버는 유지됩니다.
    pub fn reset_stats(&self) {
        let mut stats = self.inner.stats.lock();
        stats.reset();
        self.inner.classifier.reset_stats();
        drop(stats);
        tracing::info!("pipeline statistics reset");
    }

    /// 패턴 설정을 검증하고 문제 목록을 반환합니다.
    pub fn validate_configuration(&self) -> Vec<String> {
        self.registry().validate()
    }

    /// 샘플 라인을 시험 분류합니다. 통계는 변경되지 않습니다.
    pub fn test_classification<S: AsRef<str>>(&self, lines: &[S]) -> SampleReport {
        self.inner.classifier.classify_samples(lines)
    }

    /// 패턴 소스를 다시 로드하고 새 패턴 수를 반환합니다.
    pub async fn reload_patterns(&self) -> usize {
        self.registry().reload().await
    }

    /// 사용자 정의 패턴을 추가합니다.
    pub fn add_custom_pattern(
        &self,
        level: LogLevel,
        regex: &str,
        priority: i32,
        flags: PatternFlags,
    ) -> Result<Arc<Pattern>, LogPipelineError> {
        self.registry().add_custom(level, regex, priority, flags)
    }

    /// 사용자 정의 패턴을 제거합니다.
    pub fn remove_custom_pattern(&self, level: LogLevel, regex: &str) -> bool {
        self.registry().remove_custom(level, regex)
    }
}

async fn run_worker(
    pipeline: IngestionPipeline,
    mut rx: mpsc::Receiver<RawLine>,
    cancel: CancellationToken,
    poll_interval: std::time::Duration,
) -> mpsc::Receiver<RawLine> {
    tracing::debug!("background worker started");

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = tokio::time::timeout(poll_interval, rx.recv()) => next,
        };

        match next {
            // 항목 하나의 패닉이 워커를 끝내면 큐 수신측을 잃습니다.
            Ok(Some(raw)) => {
                let result = AssertUnwindSafe(pipeline.ingest_raw(raw))
                    .catch_unwind()
                    .await;
                match result {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::debug!(error = %e, "skipping queued line"),
                    Err(_) => tracing::error!("panic while processing queued line, skipping"),
                }
            }
            Ok(None) => {
                tracing::warn!("background queue closed, worker exiting");
                break;
            }
            // 타임아웃: 취소 여부를 다시 확인
            Err(_) => {}
        }
    }

    tracing::debug!("background worker exited");
    rx
}

/// 파이프라인 빌더
pub struct IngestionPipelineBuilder {
    config: PipelineConfig,
    registry: Option<Arc<PatternRegistry>>,
    alert_sink: Option<Arc<dyn AlertSink>>,
}

impl IngestionPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            registry: None,
            alert_sink: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 패턴 레지스트리를 지정합니다. 지정하지 않으면 내장 기본 패턴을 사용합니다.
    pub fn registry(mut self, registry: Arc<PatternRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// 알림 싱크를 지정합니다. 지정하지 않으면 [`LogAlertSink`]를 사용합니다.
    pub fn alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.alert_sink = Some(sink);
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Errors
    /// 설정이 유효하지 않으면 [`LogPipelineError::Config`]를 반환합니다.
    pub fn build(self) -> Result<IngestionPipeline, LogPipelineError> {
        self.config.validate()?;

        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(PatternRegistry::with_defaults()));
        let classifier =
            Classifier::new(registry).with_max_line_length(self.config.max_line_length);
        let store = LogStore::new(self.config.per_key_capacity, self.config.global_capacity())?;
        let (queue_tx, queue_rx) = mpsc::channel(self.config.queue_capacity);

        let inner = Inner {
            stats: Mutex::new(ProcessingStats::new(self.config.rate_interval())),
            classifier,
            store,
            observers: RwLock::new(Vec::new()),
            alert_sink: self
                .alert_sink
                .unwrap_or_else(|| Arc::new(LogAlertSink)),
            queue_tx,
            worker: tokio::sync::Mutex::new(WorkerState::Idle(Some(queue_rx))),
            background_running: AtomicBool::new(false),
            batch_buffer: Mutex::new(Vec::new()),
            created_at: Instant::now(),
            config: self.config,
        };

        tracing::debug!(
            queue_capacity = inner.config.queue_capacity,
            per_key_capacity = inner.config.per_key_capacity,
            "ingestion pipeline built"
        );
        Ok(IngestionPipeline {
            inner: Arc::new(inner),
        })
    }
}

impl Default for IngestionPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
