//! # Strider API
//!
//! Actuator SDK 抽象层，定义机器人控制 SDK 的统一接口（无硬件依赖）。
//!
//! ## 模块
//!
//! - `types`: 租约、机器人状态、上传响应等数据类型
//! - `feedback`: 导航状态码解析
//! - `error`: SDK 统一错误类型
//! - `mock`: 可编程模拟机器人（`mock` feature，仅用于测试）
//!
//! ## 架构位置
//!
//! ```text
//! Session Layer (strider-session)
//!     ↓ 通过 RobotSdk trait 调用阻塞原语
//! RobotSdk (此 trait)
//!     ↓ 具体实现（gRPC 客户端 / MockRobot）
//! Actuator
//! ```
//!
//! 所有方法均为阻塞调用。上层（strider-session）通过专用工作线程池
//! 桥接阻塞调用，本层不做任何线程管理。

use bytes::Bytes;

pub mod error;
pub mod feedback;
pub mod types;

#[cfg(feature = "mock")]
pub mod mock;

pub use error::SdkError;
pub use feedback::NavFeedback;
pub use types::{LeaseToken, NavCommandId, RobotState, UploadResponse};

#[cfg(feature = "mock")]
pub use mock::MockRobot;

/// 机器人控制 SDK 统一接口
///
/// # 阻塞语义
///
/// 每个方法对应一次远程调用，调用期间阻塞当前线程。
/// 实现必须是 `Send + Sync`：上层通过 `Arc<dyn RobotSdk>` 在
/// 工作线程间共享同一个实例。
///
/// # 租约模型
///
/// 机器人同一时刻只接受一个持有者的指令。`acquire_lease` 在已有
/// 持有者时返回 [`SdkError::LeaseHeld`]；`take_lease` 无条件夺取
/// （使先前持有者的租约失效）。租约需要周期性 `renew_lease`，
/// 超过 TTL 未续约即失效。
pub trait RobotSdk: Send + Sync {
    // ==================== 认证 ====================

    /// 认证并建立会话
    fn authenticate(&self, username: &str, password: &str) -> Result<(), SdkError>;

    /// 与机器人时钟同步（导航指令带时间戳，必须先同步）
    fn sync_clock(&self) -> Result<(), SdkError>;

    // ==================== 租约 ====================

    /// 申请独占租约
    ///
    /// 已有其他持有者时返回 [`SdkError::LeaseHeld`]，携带当前持有者名。
    fn acquire_lease(&self) -> Result<LeaseToken, SdkError>;

    /// 强制夺取租约（使先前持有者失效）
    fn take_lease(&self) -> Result<LeaseToken, SdkError>;

    /// 归还租约
    ///
    /// 对已失效或未持有的租约，实现应当容忍并返回 `Ok`。
    fn release_lease(&self, token: &LeaseToken) -> Result<(), SdkError>;

    /// 续约（心跳）
    fn renew_lease(&self, token: &LeaseToken) -> Result<(), SdkError>;

    /// 查询当前租约持有者（无持有者时返回 `None`）
    fn lease_owner(&self) -> Result<Option<String>, SdkError>;

    // ==================== 地图 ====================

    /// 上传导航图定义
    ///
    /// 返回机器人侧缺失的快照 id 列表，调用方据此补传快照。
    fn upload_graph(&self, graph: Bytes) -> Result<UploadResponse, SdkError>;

    /// 上传航点快照
    fn upload_waypoint_snapshot(&self, snapshot_id: &str, data: Bytes) -> Result<(), SdkError>;

    /// 上传边快照
    fn upload_edge_snapshot(&self, snapshot_id: &str, data: Bytes) -> Result<(), SdkError>;

    /// 基于基准标记（fiducial）在已上传的图中定位
    fn localize_to_fiducial(&self) -> Result<(), SdkError>;

    // ==================== 导航 ====================

    /// 下发导航指令，返回可用于轮询/取消的指令 id
    ///
    /// `velocity_limit` 单位 m/s。
    fn navigate_to(
        &self,
        waypoint_id: &str,
        velocity_limit: f64,
    ) -> Result<NavCommandId, SdkError>;

    /// 轮询导航指令的原始状态码
    ///
    /// 状态码语义见 [`NavFeedback`]。未定义的码值由上层按
    /// [`NavFeedback::Unknown`] 处理（继续轮询）。
    fn navigation_status(&self, command: NavCommandId) -> Result<u8, SdkError>;

    /// 取消进行中的导航指令
    fn cancel_navigation(&self, command: NavCommandId) -> Result<(), SdkError>;

    // ==================== 电源与状态 ====================

    /// 上电（电机使能）。命令发出即返回，上电完成与否通过
    /// [`RobotSdk::robot_state`] 轮询确认。
    fn power_on(&self) -> Result<(), SdkError>;

    /// 下电（电机失能）
    fn power_off(&self) -> Result<(), SdkError>;

    /// 读取机器人当前状态（电量、电机电源、急停）
    fn robot_state(&self) -> Result<RobotState, SdkError>;
}
