use anyhow::{Context, Result};
use async_nats::Client;
use mesh_core::config::BridgeConfig;
use mesh_core::nats::NatsClientFactory;
use mesh_core::shutdown::GracefulShutdown;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::application::services::{MetricsExporter, PushIngestor, SnapshotPoller, StateReconciler};
use crate::domain::AgentStateTable;
use crate::infrastructure::lifecycle::LifecycleManager;
use crate::infrastructure::metrics::VictoriaMetricsSink;
use crate::infrastructure::nats::{NatsKvSnapshotStore, subscribe_telemetry};

/// 桥接服务启动器：连接外部依赖并装配流水线
pub struct BridgeBootstrapper {
    config: BridgeConfig,
    shutdown: GracefulShutdown,
}

/// 运行中的桥接服务
pub struct RunningBridge {
    lifecycle: LifecycleManager,
    exporter: Arc<MetricsExporter>,
    reconciler: Arc<StateReconciler>,
    nats: Client,
    shutdown_timeout: Duration,
}

impl BridgeBootstrapper {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            shutdown: GracefulShutdown::new(),
        }
    }

    pub async fn start(self) -> Result<RunningBridge> {
        info!(
            nats_url = %self.config.nats.url,
            metrics_url = %self.config.metrics.url,
            subject = %self.config.telemetry.subject,
            bucket = %self.config.telemetry.bucket,
            poll_interval_ms = self.config.poller.interval_ms,
            "Mesh telemetry bridge starting"
        );

        let sink = VictoriaMetricsSink::new(&self.config.metrics)
            .context("Failed to build metrics sink")?;
        info!(endpoint = %sink.endpoint(), "Metrics sink ready");

        let nats = NatsClientFactory::create_nats_client_with_jetstream(&self.config.nats)
            .await
            .context("Failed to connect to NATS")?;

        let exporter = Arc::new(MetricsExporter::new(Arc::new(sink)));
        let reconciler = Arc::new(StateReconciler::new(
            AgentStateTable::new(),
            exporter.clone(),
        ));

        let mut lifecycle = LifecycleManager::new(self.shutdown.clone());
        lifecycle.start_signal_listener();

        // 实时订阅
        let feed = subscribe_telemetry(&nats.client, &self.config.telemetry.subject)
            .await
            .context("Failed to subscribe to telemetry subject")?;
        let ingestor = PushIngestor::new(reconciler.clone());
        let token = lifecycle.shutdown_token();
        let handle = tokio::spawn(async move {
            ingestor.run(feed, token).await;
        });
        lifecycle.register_service("push_ingestor", handle);

        // KV 轮询
        let store = Arc::new(NatsKvSnapshotStore::new(
            nats.jetstream.clone(),
            self.config.telemetry.bucket.clone(),
        ));
        let poller = SnapshotPoller::new(
            store,
            reconciler.clone(),
            self.config.poller.initial_delay(),
            self.config.poller.interval(),
        );
        let token = lifecycle.shutdown_token();
        let handle = tokio::spawn(async move {
            poller.run(token).await;
        });
        lifecycle.register_service("snapshot_poller", handle);

        info!(
            "Mesh telemetry bridge started with {} services",
            lifecycle.service_count()
        );

        Ok(RunningBridge {
            lifecycle,
            exporter,
            reconciler,
            nats: nats.client,
            shutdown_timeout: self.config.shutdown_timeout(),
        })
    }
}

impl RunningBridge {
    /// 阻塞到停机信号，然后依次：停止任务 → 等待导出 → 排空 NATS 连接
    pub async fn wait_for_shutdown(mut self) -> Result<()> {
        self.lifecycle.wait_for_shutdown_signal().await;
        self.lifecycle.graceful_shutdown().await;

        let drained = self.exporter.drain(self.shutdown_timeout).await;
        let stats = self.exporter.stats();
        info!(
            drained,
            agents = self.reconciler.tracked_agents(),
            exports_succeeded = stats.succeeded(),
            exports_failed = stats.failed(),
            "Metric exports settled"
        );

        if let Err(e) = self.nats.drain().await {
            warn!(error = %e, "Failed to drain NATS connection");
        }

        info!("Mesh telemetry bridge stopped");
        Ok(())
    }
}
