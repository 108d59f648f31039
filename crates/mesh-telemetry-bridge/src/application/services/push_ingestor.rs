use super::reconciler::StateReconciler;
use crate::domain::{ReconcileDecision, SnapshotSource};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use mesh_core::error::Result;
use mesh_core::trailing_segment;
use mesh_core::types::AgentTelemetrySnapshot;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 订阅收到的一条原始消息
#[derive(Debug, Clone)]
pub struct InboundTelemetry {
    pub subject: String,
    pub payload: Bytes,
}

impl InboundTelemetry {
    pub fn new(subject: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
        }
    }
}

/// 订阅循环的累计统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub received: u64,
    pub accepted: u64,
    pub dropped: u64,
}

/// 实时遥测摄入：解码 → 以 realtime 来源提交给合并器
pub struct PushIngestor {
    reconciler: Arc<StateReconciler>,
}

impl PushIngestor {
    pub fn new(reconciler: Arc<StateReconciler>) -> Self {
        Self { reconciler }
    }

    /// 处理单条消息；记录自身无 agent 字段时取 subject 最后一段
    pub fn handle(&self, message: &InboundTelemetry) -> Result<ReconcileDecision> {
        let fallback = trailing_segment(&message.subject);
        let snapshot = AgentTelemetrySnapshot::decode(&message.payload, fallback)?;
        let agent_id = snapshot.agent_id.clone();
        let decision = self.reconciler.submit(snapshot, SnapshotSource::Realtime);
        debug!(agent_id = %agent_id, subject = %message.subject, ?decision, "Realtime telemetry received");
        Ok(decision)
    }

    /// 持续消费订阅流；单条消息失败只记录并丢弃，循环继续
    pub async fn run<S>(&self, mut feed: S, shutdown: CancellationToken) -> IngestReport
    where
        S: Stream<Item = InboundTelemetry> + Unpin,
    {
        let mut report = IngestReport::default();
        info!("Realtime telemetry ingestor started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping realtime ingestor");
                    break;
                }
                next = feed.next() => {
                    let Some(message) = next else {
                        warn!("Telemetry subscription stream ended");
                        break;
                    };
                    report.received += 1;
                    match self.handle(&message) {
                        Ok(decision) if decision.is_accepted() => report.accepted += 1,
                        Ok(_) => {}
                        Err(e) => {
                            report.dropped += 1;
                            warn!(subject = %message.subject, error = %e, "Dropping malformed telemetry message");
                        }
                    }
                }
            }
        }

        info!(
            received = report.received,
            accepted = report.accepted,
            dropped = report.dropped,
            "Realtime telemetry ingestor stopped"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::SnapshotExportPort;
    use crate::domain::AgentStateTable;
    use mesh_core::types::AgentId;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingExport {
        agents: Mutex<Vec<String>>,
    }

    impl SnapshotExportPort for RecordingExport {
        fn export(&self, snapshot: Arc<AgentTelemetrySnapshot>, _source: SnapshotSource) {
            self.agents.lock().unwrap().push(snapshot.agent_id.to_string());
        }
    }

    fn ingestor() -> (PushIngestor, Arc<StateReconciler>, Arc<RecordingExport>) {
        let export = Arc::new(RecordingExport::default());
        let reconciler = Arc::new(StateReconciler::new(AgentStateTable::new(), export.clone()));
        (PushIngestor::new(reconciler.clone()), reconciler, export)
    }

    #[test]
    fn test_identity_from_record_field() {
        let (ingestor, reconciler, _) = ingestor();
        let msg = InboundTelemetry::new("mesh.telemetry.other", r#"{"agent":"a1","uptime":3}"#);
        assert!(ingestor.handle(&msg).unwrap().is_accepted());
        assert!(reconciler.current(&AgentId::new("a1")).is_some());
        assert!(reconciler.current(&AgentId::new("other")).is_none());
    }

    #[test]
    fn test_identity_from_subject_segment() {
        let (ingestor, reconciler, _) = ingestor();
        let msg = InboundTelemetry::new("mesh.telemetry.agent-7", r#"{"uptime":3}"#);
        ingestor.handle(&msg).unwrap();
        let current = reconciler.current(&AgentId::new("agent-7")).unwrap();
        assert_eq!(current.uptime, Some(3.0));
    }

    #[test]
    fn test_malformed_payload_is_error_not_panic() {
        let (ingestor, reconciler, export) = ingestor();
        let msg = InboundTelemetry::new("mesh.telemetry.a1", "{not json");
        assert!(ingestor.handle(&msg).is_err());
        assert_eq!(reconciler.tracked_agents(), 0);
        assert!(export.agents.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_loop_survives_bad_message() {
        let (ingestor, reconciler, export) = ingestor();
        let feed = futures::stream::iter(vec![
            InboundTelemetry::new("mesh.telemetry.a1", "garbage"),
            InboundTelemetry::new("mesh.telemetry.a1", "[]"),
            InboundTelemetry::new("mesh.telemetry.a2", r#"{"ts": 5, "uptime": 1}"#),
        ]);

        let report = ingestor.run(feed, CancellationToken::new()).await;

        assert_eq!(
            report,
            IngestReport {
                received: 3,
                accepted: 1,
                dropped: 2
            }
        );
        assert!(reconciler.current(&AgentId::new("a2")).is_some());
        assert_eq!(*export.agents.lock().unwrap(), vec!["a2".to_string()]);
    }

    #[tokio::test]
    async fn test_loop_stops_on_shutdown() {
        let (ingestor, _, _) = ingestor();
        let token = CancellationToken::new();
        token.cancel();
        let report = ingestor
            .run(futures::stream::pending::<InboundTelemetry>(), token)
            .await;
        assert_eq!(report, IngestReport::default());
    }
}
