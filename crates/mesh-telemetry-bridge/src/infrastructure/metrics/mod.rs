pub mod victoria;

pub use victoria::VictoriaMetricsSink;
