//! 로그 옵저버
//!
//! 분류된 엔트리는 저장 직후 등록된 모든 [`LogObserver`]에게 전달됩니다.
//! 한 옵저버의 에러나 패닉은 잡아서 로그로 남기고, 나머지 옵저버와 호출자에게는 영향이 없습니다.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use logsift_core::pipeline::BoxFuture;
use logsift_core::types::LogEntry;

use crate::error::LogPipelineError;

/// 엔트리 알림을 받는 옵저버
///
/// `async fn`은 dyn-compatible하지 않으므로 `BoxFuture`를 반환합니다.
pub trait LogObserver: Send + Sync {
    /// 로그에 표시할 옵저버 이름
    fn name(&self) -> &str;

    /// 새 엔트리를 전달받습니다.
    fn notify<'a>(&'a self, entry: &'a LogEntry) -> BoxFuture<'a, Result<(), LogPipelineError>>;
}

/// 동기 클로저를 [`LogObserver`]로 감싸는 어댑터
pub struct FnObserver<F> {
    name: String,
    f: F,
}

impl<F> FnObserver<F>
where
    F: Fn(&LogEntry) -> Result<(), LogPipelineError> + Send + Sync,
{
    /// 이름과 클로저로 옵저버를 생성합니다.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> LogObserver for FnObserver<F>
where
    F: Fn(&LogEntry) -> Result<(), LogPipelineError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn notify<'a>(&'a self, entry: &'a LogEntry) -> BoxFuture<'a, Result<(), LogPipelineError>> {
        let result = (self.f)(entry);
        Box::pin(async move { result })
    }
}

/// 옵저버 하나에 알리고, 에러와 패닉을 격리합니다.
///
/// 성공하면 `true`를 반환합니다.
pub(crate) async fn notify_isolated(observer: &Arc<dyn LogObserver>, entry: &LogEntry) -> bool {
    // 동기 클로저는 notify() 호출 시점에 실행되므로 호출 자체도 감쌉니다.
    let future = match std::panic::catch_unwind(AssertUnwindSafe(|| observer.notify(entry))) {
        Ok(future) => future,
        Err(_) => {
            observer_failed(observer.name(), "observer panicked");
            return false;
        }
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            observer_failed(observer.name(), &e.to_string());
            false
        }
        Err(_) => {
            observer_failed(observer.name(), "observer panicked");
            false
        }
    }
}

fn observer_failed(name: &str, reason: &str) {
    metrics::counter!(logsift_core::metrics::PIPELINE_OBSERVER_FAILURES_TOTAL).increment(1);
    tracing::error!(observer = name, reason, "log observer failed");
}
