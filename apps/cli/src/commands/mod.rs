//! 命令定义和实现

pub mod config;
pub mod waypoints;

pub use config::{CliConfig, ConfigCommand};
pub use waypoints::list_waypoints;
