//! 파이프라인 확장 포인트 공통 타입

use std::future::Future;
use std::pin::Pin;

/// dyn 호환 비동기 trait 메서드가 반환하는 boxed future
///
/// `Vec<Arc<dyn Trait>>` 형태로 보관되는 옵저버/알림 싱크가
/// 비동기 메서드를 가질 수 있도록 사용합니다.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
