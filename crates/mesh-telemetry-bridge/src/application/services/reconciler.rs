use crate::application::ports::SnapshotExportPort;
use crate::domain::{AgentStateTable, ReconcileDecision, SnapshotSource};
use mesh_core::types::{AgentId, AgentTelemetrySnapshot};
use std::sync::Arc;
use tracing::debug;

/// 状态合并器：实时与轮询两路快照的唯一汇合点
///
/// 独占 `AgentStateTable`。被接受的快照立即交给导出端口；过期的轮询
/// 快照静默丢弃（这是稳态行为，不是错误）。
pub struct StateReconciler {
    table: AgentStateTable,
    exporter: Arc<dyn SnapshotExportPort>,
}

impl StateReconciler {
    pub fn new(table: AgentStateTable, exporter: Arc<dyn SnapshotExportPort>) -> Self {
        Self { table, exporter }
    }

    pub fn submit(
        &self,
        snapshot: AgentTelemetrySnapshot,
        source: SnapshotSource,
    ) -> ReconcileDecision {
        let snapshot = Arc::new(snapshot);
        let decision = self.table.apply(snapshot.clone(), source);

        match decision {
            ReconcileDecision::Stale {
                current_ts,
                incoming_ts,
            } => {
                debug!(
                    agent_id = %snapshot.agent_id,
                    source = %source,
                    current_ts,
                    incoming_ts,
                    "Skipping stale snapshot"
                );
            }
            ReconcileDecision::Installed | ReconcileDecision::Replaced { .. } => {
                self.exporter.export(snapshot, source);
            }
        }

        decision
    }

    /// 当前已接受的快照
    pub fn current(&self, agent_id: &AgentId) -> Option<Arc<AgentTelemetrySnapshot>> {
        self.table.get(agent_id)
    }

    pub fn tracked_agents(&self) -> usize {
        self.table.len()
    }
}
