use mesh_core::shutdown::{GracefulShutdown, wait_for_tasks_with_timeout};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 后台任务停止时的最长等待；任务只需响应取消，不做收尾工作
const TASK_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// 已注册的后台任务
#[derive(Debug)]
struct ServiceInfo {
    name: String,
    handle: JoinHandle<()>,
}

/// 生命周期管理器
///
/// 持有摄入与轮询任务句柄，监听停机信号；停机时取消任务并等待其退出。
/// 进行中的摄入直接放弃。
pub struct LifecycleManager {
    shutdown: GracefulShutdown,
    services: Vec<ServiceInfo>,
}

impl LifecycleManager {
    pub fn new(shutdown: GracefulShutdown) -> Self {
        Self {
            shutdown,
            services: Vec::new(),
        }
    }

    /// 获取关闭令牌（根令牌的子令牌）
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    pub fn register_service(&mut self, name: impl Into<String>, handle: JoinHandle<()>) {
        let name = name.into();
        info!(service = %name, "Registering service");
        self.services.push(ServiceInfo { name, handle });
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn list_service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }

    /// 启动信号监听（后台任务）
    pub fn start_signal_listener(&self) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            shutdown.wait_for_signal().await;
        });
    }

    /// 等待停机：信号到达，或任一服务提前退出
    pub async fn wait_for_shutdown_signal(&self) {
        info!("Waiting for shutdown signal...");
        let any_exited = async {
            if self.services.is_empty() {
                return std::future::pending::<String>().await;
            }
            loop {
                if let Some(s) = self.services.iter().find(|s| s.handle.is_finished()) {
                    return s.name.clone();
                }
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        };

        tokio::select! {
            _ = self.shutdown.cancelled() => {
                info!("Shutdown signal received");
            }
            name = any_exited => {
                warn!(service = %name, "Service exited unexpectedly, shutting down");
                self.shutdown.trigger();
            }
        }
    }

    /// 取消并等待全部已注册任务
    pub async fn graceful_shutdown(&mut self) {
        self.shutdown.trigger();
        info!(
            services = ?self.list_service_names(),
            "Stopping {} services",
            self.services.len()
        );
        let handles = self.services.drain(..).map(|s| s.handle).collect();
        wait_for_tasks_with_timeout(handles, TASK_STOP_TIMEOUT).await;
        info!("All services stopped");
    }
}
