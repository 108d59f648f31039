use super::reconciler::StateReconciler;
use crate::application::ports::SnapshotStorePort;
use crate::domain::SnapshotSource;
use mesh_core::error::Result;
use mesh_core::types::AgentTelemetrySnapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 单个轮询周期的结果
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    pub keys: usize,
    pub accepted: usize,
    pub stale: usize,
    pub skipped_empty: usize,
    pub failed: usize,
}

/// KV 快照轮询器
///
/// 首次在 `initial_delay` 后执行，之后按 `interval` 固定周期执行。
/// 单个 key 的读取或解码失败不影响同周期其余 key；枚举 key 失败只中止本周期。
pub struct SnapshotPoller {
    store: Arc<dyn SnapshotStorePort>,
    reconciler: Arc<StateReconciler>,
    initial_delay: Duration,
    interval: Duration,
}

impl SnapshotPoller {
    pub fn new(
        store: Arc<dyn SnapshotStorePort>,
        reconciler: Arc<StateReconciler>,
        initial_delay: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            reconciler,
            initial_delay,
            interval,
        }
    }

    /// 执行一个完整周期
    pub async fn poll_once(&self) -> Result<PollReport> {
        let keys = self.store.list_keys().await?;
        let mut report = PollReport {
            keys: keys.len(),
            ..Default::default()
        };

        for key in &keys {
            let value = match self.store.get(key).await {
                Ok(Some(value)) if !value.is_empty() => value,
                Ok(_) => {
                    report.skipped_empty += 1;
                    debug!(key = %key, "Snapshot entry has no value, skipping");
                    continue;
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(key = %key, error = %e, "Failed to fetch snapshot entry");
                    continue;
                }
            };

            let snapshot = match AgentTelemetrySnapshot::decode(&value, key) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    report.failed += 1;
                    warn!(key = %key, error = %e, "Failed to decode snapshot entry");
                    continue;
                }
            };

            if self
                .reconciler
                .submit(snapshot, SnapshotSource::Poll)
                .is_accepted()
            {
                report.accepted += 1;
            } else {
                report.stale += 1;
            }
        }

        Ok(report)
    }

    /// 按计划持续轮询，直到 token 被取消
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.initial_delay, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            initial_delay_ms = self.initial_delay.as_millis() as u64,
            interval_ms = self.interval.as_millis() as u64,
            "Snapshot poller started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping snapshot poller");
                    break;
                }
                _ = ticker.tick() => {
                    match self.poll_once().await {
                        Ok(report) => info!(
                            keys = report.keys,
                            accepted = report.accepted,
                            stale = report.stale,
                            skipped_empty = report.skipped_empty,
                            failed = report.failed,
                            "Snapshot poll cycle completed"
                        ),
                        Err(e) => warn!(error = %e, "Snapshot poll cycle aborted"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::SnapshotExportPort;
    use crate::domain::AgentStateTable;
    use async_trait::async_trait;
    use bytes::Bytes;
    use mesh_core::error::CoreError;
    use mesh_core::types::AgentId;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeStore {
        entries: Mutex<BTreeMap<String, Option<Bytes>>>,
        broken_keys: Vec<&'static str>,
        fail_listing: bool,
        list_calls: AtomicUsize,
    }

    impl FakeStore {
        fn put(&self, key: &str, value: &str) {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), Some(Bytes::from(value.to_string())));
        }
    }

    #[async_trait]
    impl SnapshotStorePort for FakeStore {
        async fn list_keys(&self) -> Result<Vec<String>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_listing {
                return Err(CoreError::store("bucket not found"));
            }
            Ok(self.entries.lock().unwrap().keys().cloned().collect())
        }

        async fn get(&self, key: &str) -> Result<Option<Bytes>> {
            if self.broken_keys.contains(&key) {
                return Err(CoreError::store("timed out"));
            }
            Ok(self.entries.lock().unwrap().get(key).cloned().flatten())
        }
    }

    #[derive(Default)]
    struct RecordingExport {
        exported: Mutex<Vec<(String, SnapshotSource)>>,
    }

    impl SnapshotExportPort for RecordingExport {
        fn export(&self, snapshot: Arc<AgentTelemetrySnapshot>, source: SnapshotSource) {
            self.exported
                .lock()
                .unwrap()
                .push((snapshot.agent_id.to_string(), source));
        }
    }

    fn poller(store: Arc<FakeStore>) -> (SnapshotPoller, Arc<StateReconciler>, Arc<RecordingExport>) {
        let export = Arc::new(RecordingExport::default());
        let reconciler = Arc::new(StateReconciler::new(AgentStateTable::new(), export.clone()));
        let poller = SnapshotPoller::new(
            store,
            reconciler.clone(),
            Duration::from_secs(5),
            Duration::from_secs(30),
        );
        (poller, reconciler, export)
    }

    #[tokio::test]
    async fn test_poll_forwards_each_entry_as_poll_sourced() {
        let store = Arc::new(FakeStore::default());
        store.put("a1", r#"{"ts": 10, "uptime": 1}"#);
        store.put("a2", r#"{"agent": "a2", "ts": 11}"#);
        let (poller, reconciler, export) = poller(store);

        let report = poller.poll_once().await.unwrap();

        assert_eq!(report.keys, 2);
        assert_eq!(report.accepted, 2);
        assert_eq!(reconciler.tracked_agents(), 2);
        let exported = export.exported.lock().unwrap();
        assert!(exported.iter().all(|(_, s)| *s == SnapshotSource::Poll));
    }

    #[tokio::test]
    async fn test_key_used_as_fallback_identity() {
        let store = Arc::new(FakeStore::default());
        store.put("agent-9", r#"{"uptime": 4}"#);
        let (poller, reconciler, _) = poller(store);

        poller.poll_once().await.unwrap();

        assert!(reconciler.current(&AgentId::new("agent-9")).is_some());
    }

    #[tokio::test]
    async fn test_bad_entries_do_not_abort_cycle() {
        let store = Arc::new(FakeStore {
            broken_keys: vec!["b"],
            ..Default::default()
        });
        store.put("a", "not json");
        store.put("b", r#"{"ts": 1}"#);
        store.entries.lock().unwrap().insert("c".into(), None);
        store.put("d", "");
        store.put("e", r#"{"ts": 2}"#);
        let (poller, reconciler, _) = poller(store);

        let report = poller.poll_once().await.unwrap();

        assert_eq!(
            report,
            PollReport {
                keys: 5,
                accepted: 1,
                stale: 0,
                skipped_empty: 2,
                failed: 2,
            }
        );
        assert!(reconciler.current(&AgentId::new("e")).is_some());
    }

    #[tokio::test]
    async fn test_older_poll_snapshot_counted_stale() {
        let store = Arc::new(FakeStore::default());
        store.put("a1", r#"{"ts": 50}"#);
        let (poller, reconciler, export) = poller(store);
        reconciler.submit(
            AgentTelemetrySnapshot::new("a1").with_timestamp(100),
            SnapshotSource::Realtime,
        );

        let report = poller.poll_once().await.unwrap();

        assert_eq!(report.stale, 1);
        assert_eq!(
            reconciler.current(&AgentId::new("a1")).unwrap().event_timestamp,
            Some(100)
        );
        assert_eq!(export.exported.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_cycle() {
        let store = Arc::new(FakeStore {
            fail_listing: true,
            ..Default::default()
        });
        let (poller, _, _) = poller(store);
        assert!(poller.poll_once().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_initial_delay_then_interval() {
        let store = Arc::new(FakeStore::default());
        let (poller, _, _) = poller(store.clone());
        let token = CancellationToken::new();
        let handle = tokio::spawn({
            let token = token.clone();
            async move { poller.run(token).await }
        });

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(store.list_calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.list_calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.list_calls.load(Ordering::SeqCst), 2);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_survives_failed_cycles() {
        let store = Arc::new(FakeStore {
            fail_listing: true,
            ..Default::default()
        });
        let (poller, _, _) = poller(store.clone());
        let token = CancellationToken::new();
        let handle = tokio::spawn({
            let token = token.clone();
            async move { poller.run(token).await }
        });

        tokio::time::sleep(Duration::from_millis(65_100)).await;
        assert_eq!(store.list_calls.load(Ordering::SeqCst), 3);

        token.cancel();
        handle.await.unwrap();
    }
}
