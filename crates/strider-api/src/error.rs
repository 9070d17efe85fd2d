//! SDK 统一错误类型

use thiserror::Error;

/// SDK 调用错误
///
/// 本层只做机械分类，不做策略判断。策略（重试/回滚/状态迁移）
/// 由 strider-session 在调用点决定。
#[derive(Error, Debug, Clone)]
pub enum SdkError {
    /// 认证被拒绝（凭证错误 / 会话过期）
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// 租约已被其他客户端持有
    #[error("lease already held by {owner}")]
    LeaseHeld {
        /// 当前持有者标识
        owner: String,
    },

    /// 操作需要租约，但当前未持有
    #[error("no lease is currently held")]
    NoLease,

    /// 远程调用失败（网络中断 / 服务端错误）
    #[error("rpc failed: {0}")]
    Rpc(String),

    /// 远程调用超时
    #[error("rpc timed out")]
    Timeout,

    /// 指令 id 无效（已完成或从未下发）
    #[error("unknown navigation command: {0}")]
    UnknownCommand(crate::NavCommandId),
}

impl SdkError {
    /// 是否为租约冲突错误
    pub fn is_lease_conflict(&self) -> bool {
        matches!(self, Self::LeaseHeld { .. })
    }
}
