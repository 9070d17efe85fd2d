//! 会话状态机定义
//!
//! 会话在任一时刻只处于一个状态。状态只由 ConnectionManager、
//! NavigationExecutor 和 LeaseSupervisor 推进，其余组件只读。
//!
//! # 线程安全
//!
//! 状态存储为 u8 原子量，跨线程共享时无需加锁。

use std::sync::atomic::{AtomicU8, Ordering};

/// 会话状态
///
/// # 迁移
///
/// ```text
/// Disconnected → Authenticating → LeaseAcquiring → MapUploading
///     → Localizing → Ready ⇄ Navigating
/// ```
///
/// 连接序列中任一步失败回到 Disconnected；租约丢失进入 Error，
/// 需要重新 connect 才能恢复。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SessionState {
    /// 未连接（初始状态，连接失败也回到这里）
    #[default]
    Disconnected = 0,
    /// 认证与时钟同步中
    Authenticating = 1,
    /// 申请独占租约中
    LeaseAcquiring = 2,
    /// 上传导航图与快照中
    MapUploading = 3,
    /// 基准标记定位中
    Localizing = 4,
    /// 就绪，可接受导航指令
    Ready = 5,
    /// 导航执行中
    Navigating = 6,
    /// 租约丢失等致命故障，需要重新连接
    Error = 7,
}

impl SessionState {
    /// 从 u8 转换，无效值按 Disconnected 处理
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Disconnected,
            1 => Self::Authenticating,
            2 => Self::LeaseAcquiring,
            3 => Self::MapUploading,
            4 => Self::Localizing,
            5 => Self::Ready,
            6 => Self::Navigating,
            7 => Self::Error,
            _ => Self::Disconnected,
        }
    }

    /// 转换为 u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 是否处于已连接状态（Ready 或 Navigating）
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Ready | Self::Navigating)
    }

    /// 是否处于连接序列中间步骤
    pub fn is_connecting(self) -> bool {
        matches!(
            self,
            Self::Authenticating | Self::LeaseAcquiring | Self::MapUploading | Self::Localizing
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Authenticating => "authenticating",
            Self::LeaseAcquiring => "acquiring lease",
            Self::MapUploading => "uploading map",
            Self::Localizing => "localizing",
            Self::Ready => "ready",
            Self::Navigating => "navigating",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// 会话状态（原子版本，用于线程间共享）
#[derive(Debug)]
pub struct AtomicSessionState {
    inner: AtomicU8,
}

impl AtomicSessionState {
    pub fn new(state: SessionState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    /// 获取当前状态
    pub fn get(&self, ordering: Ordering) -> SessionState {
        SessionState::from_u8(self.inner.load(ordering))
    }

    /// 设置状态
    pub fn set(&self, state: SessionState, ordering: Ordering) {
        self.inner.store(state.as_u8(), ordering);
    }

    /// 比较并交换
    ///
    /// 当前值等于 `current` 时设置为 `new` 并返回 true，否则返回 false。
    pub fn compare_exchange(
        &self,
        current: SessionState,
        new: SessionState,
        success: Ordering,
        failure: Ordering,
    ) -> bool {
        self.inner
            .compare_exchange(current.as_u8(), new.as_u8(), success, failure)
            .is_ok()
    }
}

impl Default for AtomicSessionState {
    fn default() -> Self {
        Self::new(SessionState::Disconnected)
    }
}

impl Clone for AtomicSessionState {
    fn clone(&self) -> Self {
        Self::new(self.get(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_conversions() {
        for state in [
            SessionState::Disconnected,
            SessionState::Authenticating,
            SessionState::LeaseAcquiring,
            SessionState::MapUploading,
            SessionState::Localizing,
            SessionState::Ready,
            SessionState::Navigating,
            SessionState::Error,
        ] {
            assert_eq!(SessionState::from_u8(state.as_u8()), state);
        }
        // 无效值
        assert_eq!(SessionState::from_u8(255), SessionState::Disconnected);
    }

    #[test]
    fn test_connected_classification() {
        assert!(SessionState::Ready.is_connected());
        assert!(SessionState::Navigating.is_connected());
        assert!(!SessionState::Disconnected.is_connected());
        assert!(!SessionState::Error.is_connected());
        assert!(SessionState::MapUploading.is_connecting());
    }

    #[test]
    fn test_atomic_state() {
        let state = AtomicSessionState::default();
        assert_eq!(state.get(Ordering::Relaxed), SessionState::Disconnected);

        state.set(SessionState::Ready, Ordering::Relaxed);
        assert_eq!(state.get(Ordering::Relaxed), SessionState::Ready);

        assert!(state.compare_exchange(
            SessionState::Ready,
            SessionState::Navigating,
            Ordering::Relaxed,
            Ordering::Relaxed
        ));
        assert_eq!(state.get(Ordering::Relaxed), SessionState::Navigating);

        // 失败情况：期望值不匹配
        assert!(!state.compare_exchange(
            SessionState::Ready,
            SessionState::Error,
            Ordering::Relaxed,
            Ordering::Relaxed
        ));
        assert_eq!(state.get(Ordering::Relaxed), SessionState::Navigating);
    }
}
