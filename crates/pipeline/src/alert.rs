//! 알림 싱크 -- error/critical 엔트리를 외부로 전달합니다.
//!
//! [`AlertSink`]는 단일 메서드 capability입니다. 전달은 최선 노력(best-effort)이며
//! 재시도나 전달 보장은 없습니다.
//!
//! - [`LogAlertSink`]: `tracing::warn!`으로 알림을 남깁니다 (기본값).
//! - [`ChannelAlertSink`]: 제한된 mpsc 채널로 엔트리를 보냅니다. 가득 차면 버립니다.
//!
//! 싱크의 에러와 패닉은 [`deliver_isolated`]에서 잡히므로 수집 경로로 전파되지 않습니다.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use logsift_core::pipeline::BoxFuture;
use logsift_core::types::LogEntry;
use tokio::sync::mpsc;

use crate::error::LogPipelineError;

/// 알림 전달 capability
pub trait AlertSink: Send + Sync {
    /// error/critical 엔트리 하나를 전달합니다.
    fn alert<'a>(&'a self, entry: &'a LogEntry) -> BoxFuture<'a, Result<(), LogPipelineError>>;
}

/// 로그로 알림을 남기는 기본 싱크
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn alert<'a>(&'a self, entry: &'a LogEntry) -> BoxFuture<'a, Result<(), LogPipelineError>> {
        Box::pin(async move {
            tracing::warn!(
                level = %entry.level,
                process = %entry.key,
                "ALERT: {} in {}: {}",
                entry.level.as_str().to_uppercase(),
                entry.key,
                entry.message
            );
            Ok(())
        })
    }
}

/// 제한된 채널로 엔트리를 보내는 싱크 (at-most-once)
#[derive(Debug, Clone)]
pub struct ChannelAlertSink {
    tx: mpsc::Sender<Arc<LogEntry>>,
}

impl ChannelAlertSink {
    /// 지정한 용량의 채널을 만들고 싱크와 수신측을 반환합니다.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Arc<LogEntry>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// 기존 송신측으로 싱크를 만듭니다.
    pub fn new(tx: mpsc::Sender<Arc<LogEntry>>) -> Self {
        Self { tx }
    }
}

impl AlertSink for ChannelAlertSink {
    fn alert<'a>(&'a self, entry: &'a LogEntry) -> BoxFuture<'a, Result<(), LogPipelineError>> {
        let result = self
            .tx
            .try_send(Arc::new(entry.clone()))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    LogPipelineError::AlertSink("alert channel full, alert dropped".to_owned())
                }
                mpsc::error::TrySendError::Closed(_) => {
                    LogPipelineError::AlertSink("alert channel closed".to_owned())
                }
            });
        Box::pin(async move { result })
    }
}

/// 싱크에 알림을 전달하고, 에러와 패닉을 격리합니다.
///
/// 전달에 성공하면 `true`를 반환합니다.
pub(crate) async fn deliver_isolated(sink: &Arc<dyn AlertSink>, entry: &LogEntry) -> bool {
    let future = match std::panic::catch_unwind(AssertUnwindSafe(|| sink.alert(entry))) {
        Ok(future) => future,
        Err(_) => {
            tracing::error!(key = %entry.key, "alert sink panicked");
            return false;
        }
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(key = %entry.key, error = %e, "alert delivery failed");
            false
        }
        Err(_) => {
            tracing::error!(key = %entry.key, "alert sink panicked");
            false
        }
    }
}
