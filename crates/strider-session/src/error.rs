//! 会话层错误类型
//!
//! SDK 原始错误（[`strider_api::SdkError`]）不跨越本层边界：
//! 每个调用点就地分类为下列带语义的变体。未能归类的故障记入
//! `Internal`，完整细节进日志，对外只暴露概括信息。

use thiserror::Error;

use strider_map::{MapError, ResolveError};

/// 会话操作错误
#[derive(Error, Debug)]
pub enum SessionError {
    /// 认证失败（凭证错误 / 会话被拒）
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// 租约被其他客户端持有（非强制连接时）
    #[error("robot is controlled by {owner}, use force connect to take over")]
    LeaseConflict { owner: String },

    /// 租约在持有期间丢失（续约连续失败 / 被他人夺取）
    #[error("exclusive lease was lost")]
    LeaseLost,

    /// 导航图或快照上传失败
    #[error("map upload failed: {0}")]
    MapUploadFailed(String),

    /// 基准标记定位失败
    #[error("localization failed: {0}")]
    LocalizationFailed(String),

    /// 导航中定位丢失
    #[error("navigation failed: robot got lost")]
    NavigationLost,

    /// 导航中被障碍物困住
    #[error("navigation failed: robot got stuck")]
    NavigationStuck,

    /// 导航中机器人硬件异常
    #[error("navigation failed: robot is impaired")]
    NavigationImpaired,

    /// 位置代号无法解析
    #[error("no waypoint matches '{query}'")]
    WaypointNotFound { query: String },

    /// 位置代号歧义
    #[error("'{query}' is ambiguous: matches {}", candidates.join(", "))]
    WaypointAmbiguous {
        query: String,
        candidates: Vec<String>,
    },

    /// 操作被取消（disconnect 抢占 / 用户取消）
    #[error("operation cancelled")]
    Cancelled,

    /// 操作超出时限
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// SDK 暂不可用（工作队列满 / 工作线程退出）
    #[error("sdk unavailable: {0}")]
    SdkUnavailable(String),

    /// 另一个操作正在进行
    #[error("another operation is in progress")]
    Busy,

    /// 操作需要已连接的会话
    #[error("not connected")]
    NotConnected,

    /// 地图加载错误
    #[error(transparent)]
    Map(#[from] MapError),

    /// 未归类的内部故障（细节见日志）
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ResolveError> for SessionError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound { query } => Self::WaypointNotFound { query },
            ResolveError::Ambiguous { query, candidates } => {
                Self::WaypointAmbiguous { query, candidates }
            }
        }
    }
}
