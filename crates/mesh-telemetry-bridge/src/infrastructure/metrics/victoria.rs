use crate::application::ports::MetricsSinkPort;
use async_trait::async_trait;
use mesh_core::config::MetricsConfig;
use mesh_core::error::{CoreError, Result};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use url::Url;

/// VictoriaMetrics Prometheus 文本导入端点
pub struct VictoriaMetricsSink {
    client: Client,
    endpoint: Url,
}

impl VictoriaMetricsSink {
    pub fn new(config: &MetricsConfig) -> Result<Self> {
        let endpoint = config.import_endpoint()?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(map_reqwest_error)?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl MetricsSinkPort for VictoriaMetricsSink {
    async fn write(&self, payload: String) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "text/plain")
            .body(payload)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(CoreError::export(format!(
            "status {}: {}",
            status.as_u16(),
            body.trim()
        )))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> CoreError {
    if e.is_timeout() {
        CoreError::export(format!("request timed out: {}", e))
    } else if e.is_connect() {
        CoreError::export(format!("connection failed: {}", e))
    } else {
        CoreError::export(e.to_string())
    }
}
