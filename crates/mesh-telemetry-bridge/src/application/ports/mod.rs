pub mod metrics_sink;
pub mod snapshot_export;
pub mod snapshot_store;

pub use metrics_sink::MetricsSinkPort;
pub use snapshot_export::SnapshotExportPort;
pub use snapshot_store::SnapshotStorePort;
