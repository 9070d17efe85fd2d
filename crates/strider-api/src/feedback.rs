//! 导航状态码解析
//!
//! SDK 以原始 u8 码值上报导航进度。本模块把码值解析为带标签的
//! 枚举，未定义的码值落入 `Unknown`（表示"尚无结论，继续轮询"），
//! 避免新固件引入的码值导致上层误判。

/// 导航指令反馈状态
///
/// # 码值
///
/// - `0` Unknown: 尚无结论（指令刚下发 / 固件新增码值），继续轮询
/// - `1` ReachedGoal: 到达目标航点（终态，成功）
/// - `2` Lost: 定位丢失（终态，失败）
/// - `3` Stuck: 被障碍物困住（终态，失败）
/// - `4` RobotImpaired: 机器人硬件异常（终态，失败）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, num_enum::FromPrimitive)]
#[repr(u8)]
pub enum NavFeedback {
    /// 尚无结论，继续轮询（兜底值：未定义码值也落在这里）
    #[default]
    Unknown = 0,
    /// 到达目标航点
    ReachedGoal = 1,
    /// 定位丢失
    Lost = 2,
    /// 被障碍物困住
    Stuck = 3,
    /// 机器人硬件异常
    RobotImpaired = 4,
}

impl NavFeedback {
    /// 是否为终态（到达或失败，轮询可以结束）
    pub fn is_terminal(self) -> bool {
        self != Self::Unknown
    }

    /// 是否成功到达
    pub fn is_success(self) -> bool {
        self == Self::ReachedGoal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_codes() {
        assert_eq!(NavFeedback::from(0u8), NavFeedback::Unknown);
        assert_eq!(NavFeedback::from(1u8), NavFeedback::ReachedGoal);
        assert_eq!(NavFeedback::from(2u8), NavFeedback::Lost);
        assert_eq!(NavFeedback::from(3u8), NavFeedback::Stuck);
        assert_eq!(NavFeedback::from(4u8), NavFeedback::RobotImpaired);
    }

    #[test]
    fn test_undefined_code_falls_back_to_unknown() {
        // 新固件可能引入未定义码值，必须按 Unknown 处理
        assert_eq!(NavFeedback::from(5u8), NavFeedback::Unknown);
        assert_eq!(NavFeedback::from(255u8), NavFeedback::Unknown);
    }

    #[test]
    fn test_terminal_classification() {
        assert!(!NavFeedback::Unknown.is_terminal());
        assert!(NavFeedback::ReachedGoal.is_terminal());
        assert!(NavFeedback::Lost.is_terminal());
        assert!(NavFeedback::Stuck.is_terminal());
        assert!(NavFeedback::RobotImpaired.is_terminal());

        assert!(NavFeedback::ReachedGoal.is_success());
        assert!(!NavFeedback::Stuck.is_success());
    }
}
