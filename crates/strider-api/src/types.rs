//! SDK 数据类型定义

/// 独占租约凭证
///
/// 由 [`acquire_lease`](crate::RobotSdk::acquire_lease) /
/// [`take_lease`](crate::RobotSdk::take_lease) 颁发，
/// 续约与归还时原样传回。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseToken {
    /// 持有者标识
    pub owner: String,
    /// 租约纪元（每次 take 会推进纪元，使旧凭证失效）
    pub epoch: String,
    /// 纪元内的序列号
    pub sequence: u64,
}

/// 机器人即时状态快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobotState {
    /// 电池电量（0.0 ~ 100.0）
    pub battery_percent: f32,
    /// 电机是否上电
    pub motor_powered: bool,
    /// 急停是否按下
    pub estop_engaged: bool,
}

/// 导航图上传响应
///
/// 机器人侧对照已缓存的快照，报告仍然缺失的 id；
/// 调用方只需补传这些快照。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadResponse {
    /// 缺失的航点快照 id
    pub unknown_waypoint_snapshot_ids: Vec<String>,
    /// 缺失的边快照 id
    pub unknown_edge_snapshot_ids: Vec<String>,
}

/// 导航指令 id
///
/// 由 [`navigate_to`](crate::RobotSdk::navigate_to) 返回，
/// 用于轮询状态和取消指令。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NavCommandId(pub u64);

impl std::fmt::Display for NavCommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "nav-{}", self.0)
    }
}
