pub mod kv_store;
pub mod subscription;

pub use kv_store::NatsKvSnapshotStore;
pub use subscription::subscribe_telemetry;
