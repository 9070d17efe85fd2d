//! # Strider Map
//!
//! 导航图（GraphNav 风格）数据模型与航点解析（无 SDK 依赖）。
//!
//! ## 模块
//!
//! - `graph`: 图模型（航点 / 边 / 短码派生）
//! - `loader`: 地图目录加载（`graph.json` + 快照文件）
//! - `resolver`: 航点标识解析（短码 / 名称前缀 / 子串）
//! - `error`: 地图层错误类型
//!
//! ## 地图目录布局
//!
//! ```text
//! map_dir/
//! ├── graph.json              # 图定义（航点、边、锚定）
//! ├── waypoint_snapshots/     # 按快照 id 命名的二进制快照
//! │   └── <snapshot_id>
//! └── edge_snapshots/
//!     └── <snapshot_id>       # 快照 id 为空的边没有快照文件
//! ```
//!
//! 图在会话建立时一次性加载，之后只读。

pub mod error;
pub mod graph;
pub mod loader;
pub mod resolver;

pub use error::MapError;
pub use graph::{Edge, Graph, Waypoint, short_code};
pub use loader::{MapBundle, load_map_dir};
pub use resolver::{ResolveError, WaypointEntry, WaypointResolver};
