pub mod application;
pub mod bootstrap;
pub mod domain;
pub mod infrastructure;

// 重新导出错误类型
pub use mesh_core::error::{CoreError, Result};
