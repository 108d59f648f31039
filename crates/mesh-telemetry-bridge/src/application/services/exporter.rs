use super::encoder::encode_snapshot;
use crate::application::ports::{MetricsSinkPort, SnapshotExportPort};
use crate::domain::SnapshotSource;
use chrono::Utc;
use mesh_core::types::AgentTelemetrySnapshot;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// 导出计数
#[derive(Debug, Default)]
pub struct ExportStats {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl ExportStats {
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// 指标导出器
///
/// 每次导出在 `TaskTracker` 上独立执行写入：某个 Agent 的慢写或失败
/// 不会阻塞合并器，也不会拖延其他 Agent 的导出。失败只记录日志，不重试。
pub struct MetricsExporter {
    sink: Arc<dyn MetricsSinkPort>,
    tracker: TaskTracker,
    stats: Arc<ExportStats>,
}

impl MetricsExporter {
    pub fn new(sink: Arc<dyn MetricsSinkPort>) -> Self {
        Self {
            sink,
            tracker: TaskTracker::new(),
            stats: Arc::new(ExportStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<ExportStats> {
        self.stats.clone()
    }

    /// 进行中的写入数量
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// 等待进行中的写入完成，最多等待 `timeout`；全部完成返回 true
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!(pending, "Waiting for in-flight metric exports");
        }
        let drained = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        if !drained {
            warn!(
                pending = self.tracker.len(),
                "Timed out waiting for metric exports, abandoning"
            );
        }
        // 允许继续导出（测试中会重复 drain）
        self.tracker.reopen();
        drained
    }
}

impl SnapshotExportPort for MetricsExporter {
    fn export(&self, snapshot: Arc<AgentTelemetrySnapshot>, source: SnapshotSource) {
        let payload = encode_snapshot(&snapshot, Utc::now());
        let sink = self.sink.clone();
        let stats = self.stats.clone();

        self.tracker.spawn(async move {
            let agent_id = &snapshot.agent_id;
            match sink.write(payload).await {
                Ok(()) => {
                    stats.succeeded.fetch_add(1, Ordering::Relaxed);
                    debug!(agent_id = %agent_id, source = %source, "Pushed telemetry");
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    error!(agent_id = %agent_id, source = %source, error = %e, "Metrics push failed");
                }
            }
        });
    }
}
