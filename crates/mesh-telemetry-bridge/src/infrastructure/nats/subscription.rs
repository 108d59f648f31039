use crate::application::services::InboundTelemetry;
use async_nats::Client;
use futures::StreamExt;
use futures::stream::BoxStream;
use mesh_core::error::{CoreError, Result};
use tracing::info;

/// 订阅实时遥测主题，转换为摄入器使用的消息流
///
/// 客户端断线期间流保持挂起，由 async-nats 自动重连后继续投递。
pub async fn subscribe_telemetry(
    client: &Client,
    subject: &str,
) -> Result<BoxStream<'static, InboundTelemetry>> {
    let subscriber = client
        .subscribe(subject.to_string())
        .await
        .map_err(|e| CoreError::nats(format!("Failed to subscribe to {}: {}", subject, e)))?;
    info!(subject = %subject, "Subscribed to realtime telemetry");

    Ok(subscriber
        .map(|message| InboundTelemetry {
            subject: message.subject.to_string(),
            payload: message.payload,
        })
        .boxed())
}
