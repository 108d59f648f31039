pub mod core_types;
pub mod snapshot;

pub mod config;
pub mod error;

pub mod backoff;
pub mod constants;
pub mod nats;
pub mod shutdown;
pub mod telemetry;

pub use constants::*;

/// 常用类型统一出口
pub mod types {
    pub use crate::core_types::AgentId;
    pub use crate::snapshot::{
        AgentTelemetrySnapshot, MessageCounters, ResourceUsage, SessionCounts, SubAgentCounts,
        TokenCounters,
    };
}
