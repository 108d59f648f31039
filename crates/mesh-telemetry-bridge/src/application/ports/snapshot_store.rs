use async_trait::async_trait;
use bytes::Bytes;
use mesh_core::error::Result;

/// 持久化快照存储（KV）的只读访问接口
#[async_trait]
pub trait SnapshotStorePort: Send + Sync {
    /// 枚举全部 key
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// 按 key 读取；`Ok(None)` 表示该 key 无值（已删除或为空），与错误区分
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;
}
