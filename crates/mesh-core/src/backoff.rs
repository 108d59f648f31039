//! 指数退避重试策略
//!
//! 只用于启动期建立 NATS 连接；运行期的订阅、轮询、导出失败一律记录后跳过，不做同步重试。

use backoff::{Error as BackoffError, ExponentialBackoff, future::retry};
use std::time::Duration;

/// 初次连接 NATS 的重试策略：窗口耗尽即视为启动失败
pub fn nats_connect_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(200),
        max_interval: Duration::from_millis(5000),
        multiplier: 2.0,
        max_elapsed_time: Some(Duration::from_secs(60)),
        randomization_factor: 0.2,
        ..Default::default()
    }
}

/// 便捷方法：执行重试操作
pub async fn execute_with_backoff<F, Fut, T, E>(
    operation: F,
    backoff: ExponentialBackoff,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display + Send + 'static,
{
    let mut op = operation;
    let wrapped_operation = move || {
        let fut = op();
        async move { fut.await.map_err(BackoffError::transient) }
    };

    retry(backoff, wrapped_operation).await
}
