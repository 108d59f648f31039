//! NATS 连接：NKey 认证、连接事件日志、初次连接带退避重试。

use crate::backoff::{execute_with_backoff, nats_connect_backoff};
use crate::config::NatsConfig;
use crate::error::{CoreError, Result};
use async_nats::{Client, ConnectOptions, jetstream};
use std::time::Duration;
use tracing::{error, info, warn};

/// NATS 客户端工厂
pub struct NatsClientFactory;

impl NatsClientFactory {
    /// 连接一次，不重试
    pub async fn connect_once(nats_config: &NatsConfig) -> Result<Client> {
        let seed = nats_config.seed.trim();
        if seed.is_empty() {
            return Err(CoreError::config_error("NATS seed required"));
        }

        let options = ConnectOptions::with_nkey(seed.to_string())
            .name(&nats_config.name)
            .ping_interval(Duration::from_secs(20))
            .connection_timeout(Duration::from_secs(nats_config.connect_timeout_sec))
            .event_callback(|event| async move {
                match event {
                    async_nats::Event::Connected => {
                        info!("NATS connected");
                    }
                    async_nats::Event::Disconnected => {
                        warn!("NATS disconnected");
                    }
                    other => {
                        warn!(event = %other, "NATS connection event");
                    }
                }
            });

        options.connect(nats_config.url.as_str()).await.map_err(|e| {
            error!(url = %nats_config.url, error = %e, "Failed to connect to NATS");
            CoreError::nats(format!("Failed to connect to NATS at {}: {}", nats_config.url, e))
        })
    }

    /// 建立连接并创建 JetStream 上下文；退避窗口耗尽即返回致命错误
    pub async fn create_nats_client_with_jetstream(
        nats_config: &NatsConfig,
    ) -> Result<NatsClientWithJetStream> {
        // 缺少凭据不属于瞬态错误，不进入重试
        if nats_config.seed.trim().is_empty() {
            return Err(CoreError::config_error("NATS seed required"));
        }
        info!(url = %nats_config.url, "Connecting to NATS");

        let client = execute_with_backoff(
            || Self::connect_once(nats_config),
            nats_connect_backoff(),
        )
        .await
        .map_err(|e| CoreError::nats(format!("Failed to connect to NATS with retry: {}", e)))?;

        let jetstream = jetstream::new(client.clone());
        info!(url = %nats_config.url, "NATS client and JetStream context ready");

        Ok(NatsClientWithJetStream { client, jetstream })
    }
}

/// NATS 客户端和 JetStream 上下文的组合
#[derive(Clone)]
pub struct NatsClientWithJetStream {
    pub client: Client,
    pub jetstream: jetstream::Context,
}
