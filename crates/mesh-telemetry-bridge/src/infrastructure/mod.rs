pub mod lifecycle;
pub mod metrics;
pub mod nats;
