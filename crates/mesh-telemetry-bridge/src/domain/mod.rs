pub mod source;
pub mod state_table;

pub use source::SnapshotSource;
pub use state_table::{AgentStateTable, ReconcileDecision};
