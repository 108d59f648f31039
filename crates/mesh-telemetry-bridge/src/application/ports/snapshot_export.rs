use crate::domain::SnapshotSource;
use mesh_core::types::AgentTelemetrySnapshot;
use std::sync::Arc;

/// 接收已被接受的快照并负责后续导出
///
/// 实现必须立即返回：导出在后台进行，失败不得回传到合并路径。
pub trait SnapshotExportPort: Send + Sync {
    fn export(&self, snapshot: Arc<AgentTelemetrySnapshot>, source: SnapshotSource);
}
