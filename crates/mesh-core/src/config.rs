//! 桥接服务的统一配置
//!
//! 分层加载（后者覆盖前者）：内置默认值 → TOML 文件 → `MESH_BRIDGE__` 前缀环境变量
//! → 旧版扁平环境变量（`NATS_URL` / `NATS_SEED` / `VM_URL` / `POLL_INTERVAL_MS`）。

use crate::constants::{JS_KV_MESH_TELEMETRY, TELEMETRY_SUBJECT_WILDCARD, VM_IMPORT_PROMETHEUS_PATH};
use crate::error::{CoreError, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
    value::{Uncased, UncasedStr},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "mesh-bridge.toml";
pub const ENV_PREFIX: &str = "MESH_BRIDGE__";

/// 旧版桥接程序使用的环境变量及其对应的配置路径
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("NATS_URL", "nats.url"),
    ("NATS_SEED", "nats.seed"),
    ("VM_URL", "metrics.url"),
    ("POLL_INTERVAL_MS", "poller.interval_ms"),
];

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub telemetry: TelemetrySourceConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub log: LogSection,
    /// 停机时等待未完成导出的最长时间
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_sec: u64,
}

/// NATS 连接配置
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NatsConfig {
    #[serde(default = "default_nats_url")]
    pub url: String,
    /// NKey seed（必填）
    #[serde(default)]
    pub seed: String,
    #[serde(default = "default_client_name")]
    pub name: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_sec: u64,
}

// seed 不进日志
impl std::fmt::Debug for NatsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsConfig")
            .field("url", &self.url)
            .field("seed", &if self.seed.is_empty() { "<unset>" } else { "<redacted>" })
            .field("name", &self.name)
            .field("connect_timeout_sec", &self.connect_timeout_sec)
            .finish()
    }
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: default_nats_url(),
            seed: String::new(),
            name: default_client_name(),
            connect_timeout_sec: default_connect_timeout(),
        }
    }
}

/// 遥测来源：实时订阅主题与快照 KV bucket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySourceConfig {
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

impl Default for TelemetrySourceConfig {
    fn default() -> Self {
        Self {
            subject: default_subject(),
            bucket: default_bucket(),
        }
    }
}

/// KV 轮询调度
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PollerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_poll_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            initial_delay_ms: default_poll_initial_delay_ms(),
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

/// 指标后端（VictoriaMetrics）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default = "default_vm_url")]
    pub url: String,
    #[serde(default = "default_import_path")]
    pub import_path: String,
    #[serde(default = "default_metrics_timeout")]
    pub timeout_sec: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            url: default_vm_url(),
            import_path: default_import_path(),
            timeout_sec: default_metrics_timeout(),
        }
    }
}

impl MetricsConfig {
    /// 完整的写入端点 URL：导入路径追加在 `url` 已有路径之后，保留代理/vminsert 前缀
    pub fn import_endpoint(&self) -> Result<url::Url> {
        let mut endpoint = url::Url::parse(&self.url)
            .map_err(|e| CoreError::config_error(format!("Invalid metrics url '{}': {}", self.url, e)))?;
        endpoint
            .path_segments_mut()
            .map_err(|_| {
                CoreError::config_error(format!("Metrics url '{}' cannot carry a path", self.url))
            })?
            .pop_if_empty()
            .extend(self.import_path.split('/').filter(|s| !s.is_empty()));
        Ok(endpoint)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub no_ansi: bool,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            no_ansi: false,
        }
    }
}

impl From<&LogSection> for crate::telemetry::LogConfig {
    fn from(section: &LogSection) -> Self {
        crate::telemetry::LogConfig {
            level: section.level.clone(),
            format: section.format.clone(),
            no_ansi: section.no_ansi,
        }
    }
}

impl BridgeConfig {
    /// 从指定路径或当前目录下的 mesh-bridge.toml 加载，并叠加环境变量
    pub fn load_config(path: Option<&str>) -> Result<Self> {
        let figment = Self::base_figment(path.map(Path::new))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Env::raw().filter_map(legacy_env_key));
        Self::from_figment(figment)
    }

    /// 默认值 + 文件层
    pub fn base_figment(path: Option<&Path>) -> Figment {
        let figment = Figment::from(Serialized::defaults(BridgeConfig::default()));
        match path {
            Some(p) => figment.merge(Toml::file(p)),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    figment.merge(Toml::file(default_path))
                } else {
                    figment
                }
            }
        }
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: BridgeConfig = figment
            .extract()
            .map_err(|e| CoreError::config_error(format!("Failed to load config via Figment: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// 验证配置；失败属于启动期致命错误
    pub fn validate(&self) -> Result<()> {
        if self.nats.seed.trim().is_empty() {
            return Err(CoreError::config_error(
                "nats.seed is required (set NATS_SEED or MESH_BRIDGE__NATS__SEED)",
            ));
        }

        if let Err(e) = url::Url::parse(&self.nats.url) {
            return Err(CoreError::config_error(format!(
                "Invalid nats.url '{}': {}",
                self.nats.url, e
            )));
        }

        let endpoint = self.metrics.import_endpoint()?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(CoreError::config_error(format!(
                "metrics.url must be http(s), got '{}'",
                self.metrics.url
            )));
        }

        if self.poller.interval_ms == 0 {
            return Err(CoreError::config_error("poller.interval_ms must be greater than 0"));
        }

        if self.telemetry.subject.trim().is_empty() || self.telemetry.bucket.trim().is_empty() {
            return Err(CoreError::config_error(
                "telemetry.subject and telemetry.bucket cannot be empty",
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log.level.to_lowercase().as_str()) {
            return Err(CoreError::config_error(format!(
                "Invalid log level: {}",
                self.log.level
            )));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.log.format.to_lowercase().as_str()) {
            return Err(CoreError::config_error(format!(
                "Invalid log format: {}",
                self.log.format
            )));
        }

        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_sec)
    }
}

fn legacy_env_key(key: &UncasedStr) -> Option<Uncased<'_>> {
    LEGACY_ENV_KEYS
        .iter()
        .find(|(env, _)| key.as_str().eq_ignore_ascii_case(env))
        .map(|(_, path)| Uncased::from(*path))
}

// --- Default value functions ---

fn default_nats_url() -> String {
    "nats://nats:4222".to_string()
}

fn default_client_name() -> String {
    "mesh-telemetry-bridge".to_string()
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_subject() -> String {
    TELEMETRY_SUBJECT_WILDCARD.to_string()
}

fn default_bucket() -> String {
    JS_KV_MESH_TELEMETRY.to_string()
}

fn default_poll_interval_ms() -> u64 {
    30_000
}

fn default_poll_initial_delay_ms() -> u64 {
    5_000
}

fn default_vm_url() -> String {
    "http://victoriametrics:8428".to_string()
}

fn default_import_path() -> String {
    VM_IMPORT_PROMETHEUS_PATH.to_string()
}

fn default_metrics_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_shutdown_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn with_seed() -> BridgeConfig {
        BridgeConfig {
            nats: NatsConfig {
                seed: "SUAEXAMPLESEED".to_string(),
                ..NatsConfig::default()
            },
            ..BridgeConfig::default()
        }
    }

    #[test]
    fn test_defaults_match_legacy_bridge() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.nats.url, "nats://nats:4222");
        assert_eq!(cfg.telemetry.subject, "mesh.telemetry.*");
        assert_eq!(cfg.telemetry.bucket, "MESH-TELEMETRY");
        assert_eq!(cfg.poller.interval(), Duration::from_secs(30));
        assert_eq!(cfg.poller.initial_delay(), Duration::from_secs(5));
        assert_eq!(
            cfg.metrics.import_endpoint().unwrap().as_str(),
            "http://victoriametrics:8428/api/v1/import/prometheus"
        );
    }

    #[test]
    fn test_import_endpoint_keeps_base_path() {
        let endpoint = |url: &str| {
            MetricsConfig {
                url: url.to_string(),
                ..MetricsConfig::default()
            }
            .import_endpoint()
            .unwrap()
            .to_string()
        };
        assert_eq!(
            endpoint("http://vminsert:8480/insert/0/prometheus"),
            "http://vminsert:8480/insert/0/prometheus/api/v1/import/prometheus"
        );
        assert_eq!(
            endpoint("http://proxy/vm/"),
            "http://proxy/vm/api/v1/import/prometheus"
        );
        assert_eq!(
            endpoint("http://vm:8428/"),
            "http://vm:8428/api/v1/import/prometheus"
        );
    }

    #[test]
    fn test_missing_seed_is_rejected() {
        let err = BridgeConfig::default().validate().unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
        assert!(err.to_string().contains("nats.seed"));
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(with_seed().validate().is_ok());
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let mut cfg = with_seed();
        cfg.poller.interval_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_bad_metrics_url_is_rejected() {
        let mut cfg = with_seed();
        cfg.metrics.url = "not a url".to_string();
        assert!(cfg.validate().is_err());

        cfg.metrics.url = "ftp://vm:21".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_bad_log_format_is_rejected() {
        let mut cfg = with_seed();
        cfg.log.format = "xml".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_toml_layer_overrides_defaults() {
        let figment = BridgeConfig::base_figment(None).merge(Toml::string(
            r#"
            [nats]
            url = "nats://10.0.0.5:4222"
            seed = "SUAFILESEED"

            [poller]
            interval_ms = 1000
            "#,
        ));
        let cfg = BridgeConfig::from_figment(figment).unwrap();
        assert_eq!(cfg.nats.url, "nats://10.0.0.5:4222");
        assert_eq!(cfg.poller.interval_ms, 1000);
        assert_eq!(cfg.poller.initial_delay_ms, 5000);
        assert_eq!(cfg.metrics.url, "http://victoriametrics:8428");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "shutdown_timeout_sec = 3\n[nats]\nseed = \"SUAFILESEED\"\n[metrics]\nurl = \"http://vm.local:8428\""
        )
        .unwrap();

        let cfg = BridgeConfig::from_figment(BridgeConfig::base_figment(Some(&path))).unwrap();
        assert_eq!(cfg.shutdown_timeout(), Duration::from_secs(3));
        assert_eq!(cfg.metrics.url, "http://vm.local:8428");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let figment = BridgeConfig::base_figment(None)
            .merge(Toml::string("[nats]\nseed = \"S\"\nbogus = 1"));
        assert!(BridgeConfig::from_figment(figment).is_err());
    }

    #[test]
    fn test_legacy_env_key_mapping() {
        assert_eq!(
            legacy_env_key(UncasedStr::new("NATS_URL")).unwrap().as_str(),
            "nats.url"
        );
        assert_eq!(
            legacy_env_key(UncasedStr::new("poll_interval_ms")).unwrap().as_str(),
            "poller.interval_ms"
        );
        assert!(legacy_env_key(UncasedStr::new("HOME")).is_none());
    }

    #[test]
    fn test_legacy_env_vars_drive_load_config() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("NATS_SEED", "SUALEGACYSEED");
            jail.set_env("POLL_INTERVAL_MS", "1234");
            jail.set_env("VM_URL", "http://vm2:8428/prefix");
            jail.set_env("NATS_URL", "nats://legacy:4222");

            let cfg = BridgeConfig::load_config(None).map_err(|e| e.to_string())?;
            assert_eq!(cfg.nats.seed, "SUALEGACYSEED");
            assert_eq!(cfg.nats.url, "nats://legacy:4222");
            assert_eq!(cfg.poller.interval_ms, 1234);
            assert_eq!(cfg.metrics.url, "http://vm2:8428/prefix");
            assert_eq!(
                cfg.metrics.import_endpoint().map_err(|e| e.to_string())?.as_str(),
                "http://vm2:8428/prefix/api/v1/import/prometheus"
            );
            Ok(())
        });
    }

    #[test]
    fn test_env_layers_override_file_in_order() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "mesh-bridge.toml",
                "[nats]\nseed = \"SUAFILESEED\"\n[poller]\ninterval_ms = 1000\n[metrics]\ntimeout_sec = 3",
            )?;
            jail.set_env("MESH_BRIDGE__POLLER__INTERVAL_MS", "2000");
            jail.set_env("MESH_BRIDGE__METRICS__TIMEOUT_SEC", "7");
            jail.set_env("POLL_INTERVAL_MS", "3000");

            let cfg = BridgeConfig::load_config(None).map_err(|e| e.to_string())?;
            assert_eq!(cfg.nats.seed, "SUAFILESEED");
            assert_eq!(cfg.metrics.timeout_sec, 7);
            // 旧版变量最后叠加
            assert_eq!(cfg.poller.interval_ms, 3000);
            Ok(())
        });
    }

    #[test]
    fn test_debug_redacts_seed() {
        let rendered = format!("{:?}", with_seed().nats);
        assert!(!rendered.contains("SUAEXAMPLESEED"));
        assert!(rendered.contains("<redacted>"));
    }
}
