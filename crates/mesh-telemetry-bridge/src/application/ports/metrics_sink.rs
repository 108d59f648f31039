use async_trait::async_trait;
use mesh_core::error::Result;

/// 指标后端写入接口
#[async_trait]
pub trait MetricsSinkPort: Send + Sync {
    /// 写入一段 Prometheus 文本格式载荷；非成功响应返回 `CoreError::Export`
    async fn write(&self, payload: String) -> Result<()>;
}
