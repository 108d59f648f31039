//! Agent 状态表：agentId → 当前已接受的快照
//!
//! 运行在多线程 tokio 运行时上，接受/覆盖判定必须与写入原子完成。
//! `DashMap::entry` 在整个读-判-写期间持有该 key 所在分片的写锁，
//! 因此同一 Agent 的并发提交被串行化，不同 Agent 互不阻塞。

use super::source::SnapshotSource;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use mesh_core::types::{AgentId, AgentTelemetrySnapshot};
use std::sync::Arc;

/// 一次提交的合并结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileDecision {
    /// 该 Agent 的第一份快照
    Installed,
    /// 覆盖了已有快照
    Replaced { previous_ts: Option<i64> },
    /// 轮询快照比当前状态旧，丢弃
    Stale { current_ts: i64, incoming_ts: i64 },
}

impl ReconcileDecision {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, ReconcileDecision::Stale { .. })
    }
}

/// 判定来件是否过期：仅当来源为轮询，且双方时间戳都存在、来件严格更旧。
/// 实时来源总是胜出，即使其时间戳更早。
pub fn is_stale(
    current: &AgentTelemetrySnapshot,
    incoming: &AgentTelemetrySnapshot,
    source: SnapshotSource,
) -> Option<(i64, i64)> {
    match (source, current.event_timestamp, incoming.event_timestamp) {
        (SnapshotSource::Poll, Some(current_ts), Some(incoming_ts)) if incoming_ts < current_ts => {
            Some((current_ts, incoming_ts))
        }
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct AgentStateTable {
    entries: DashMap<AgentId, Arc<AgentTelemetrySnapshot>>,
}

impl AgentStateTable {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// 按“后写者胜、轮询降级”规则整体替换或丢弃
    pub fn apply(
        &self,
        snapshot: Arc<AgentTelemetrySnapshot>,
        source: SnapshotSource,
    ) -> ReconcileDecision {
        match self.entries.entry(snapshot.agent_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(snapshot);
                ReconcileDecision::Installed
            }
            Entry::Occupied(mut slot) => {
                if let Some((current_ts, incoming_ts)) = is_stale(slot.get(), &snapshot, source) {
                    return ReconcileDecision::Stale {
                        current_ts,
                        incoming_ts,
                    };
                }
                let previous = slot.insert(snapshot);
                ReconcileDecision::Replaced {
                    previous_ts: previous.event_timestamp,
                }
            }
        }
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<Arc<AgentTelemetrySnapshot>> {
        self.entries.get(agent_id).map(|v| v.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
