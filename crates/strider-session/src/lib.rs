//! Strider 会话控制器
//!
//! 在 [`strider_api::RobotSdk`] 之上实现完整的控制会话：
//!
//! - 连接生命周期（认证 → 租约 → 地图上传 → 定位）
//! - 独占租约的后台续约与丢失检测
//! - 电源状态跟踪（谁上的电谁还原）
//! - 阻塞式导航执行（轮询 + 心跳 + 取消 + 超时）
//!
//! 对外入口是 [`RobotSession`]，其余模块是它的组成部件，按需
//! 单独使用。所有操作都是阻塞调用，适合 CLI 与脚本场景。

pub mod config;
pub mod connect;
pub mod dispatch;
pub mod error;
pub mod lease;
pub mod nav;
pub mod power;
pub mod progress;
pub mod session;
pub mod state;

pub use config::SessionConfig;
pub use connect::{ConnectionManager, MapContext};
pub use dispatch::{DispatchError, Pending, SdkWorkerPool};
pub use error::SessionError;
pub use lease::LeaseSupervisor;
pub use nav::{Arrival, NavigationExecutor};
pub use power::PowerStateTracker;
pub use progress::{NullProgress, ProgressSink};
pub use session::{RobotSession, SessionStatus};
pub use state::{AtomicSessionState, SessionState};
