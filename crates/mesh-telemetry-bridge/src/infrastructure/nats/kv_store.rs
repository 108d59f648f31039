use crate::application::ports::SnapshotStorePort;
use async_nats::jetstream::{self, kv};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use mesh_core::error::{CoreError, Result};
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// 基于 JetStream KV 的快照存储
///
/// bucket 在首次访问时解析；解析失败不缓存，下一个轮询周期重新尝试。
pub struct NatsKvSnapshotStore {
    jetstream: jetstream::Context,
    bucket: String,
    store: OnceCell<kv::Store>,
}

impl NatsKvSnapshotStore {
    pub fn new(jetstream: jetstream::Context, bucket: impl Into<String>) -> Self {
        Self {
            jetstream,
            bucket: bucket.into(),
            store: OnceCell::new(),
        }
    }

    async fn store(&self) -> Result<&kv::Store> {
        self.store
            .get_or_try_init(|| async {
                let store = self.jetstream.get_key_value(&self.bucket).await.map_err(|e| {
                    warn!(bucket = %self.bucket, error = %e, "Snapshot KV bucket unavailable");
                    CoreError::store(format!("Failed to open KV bucket {}: {}", self.bucket, e))
                })?;
                info!(bucket = %self.bucket, "Snapshot KV bucket opened");
                Ok::<_, CoreError>(store)
            })
            .await
    }
}

#[async_trait]
impl SnapshotStorePort for NatsKvSnapshotStore {
    async fn list_keys(&self) -> Result<Vec<String>> {
        let store = self.store().await?;
        let mut keys = store.keys().await.map_err(|e| {
            CoreError::store(format!("Failed to list keys in {}: {}", self.bucket, e))
        })?;

        let mut collected = Vec::new();
        while let Some(key) = keys.next().await {
            match key {
                Ok(key) => collected.push(key),
                Err(e) => {
                    return Err(CoreError::store(format!(
                        "Key listing in {} interrupted: {}",
                        self.bucket, e
                    )));
                }
            }
        }
        Ok(collected)
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let store = self.store().await?;
        store
            .get(key)
            .await
            .map_err(|e| CoreError::store(format!("Failed to get {}/{}: {}", self.bucket, key, e)))
    }
}
