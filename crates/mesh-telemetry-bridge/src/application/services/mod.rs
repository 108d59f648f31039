pub mod encoder;
pub mod exporter;
pub mod push_ingestor;
pub mod reconciler;
pub mod snapshot_poller;

pub use encoder::encode_snapshot;
pub use exporter::{ExportStats, MetricsExporter};
pub use push_ingestor::{IngestReport, InboundTelemetry, PushIngestor};
pub use reconciler::StateReconciler;
pub use snapshot_poller::{PollReport, SnapshotPoller};
