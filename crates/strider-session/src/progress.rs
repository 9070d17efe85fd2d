//! 进度上报
//!
//! 连接与导航等长操作通过 [`ProgressSink`] 向调用方推送人类可读
//! 的进度消息。CLI 把它接到终端输出，测试里收集到向量断言。

/// 进度消息接收端
pub trait ProgressSink: Send + Sync {
    /// 上报一条进度消息
    fn report(&self, message: &str);
}

/// 任何 `Fn(&str)` 闭包都可直接当作进度接收端
impl<F: Fn(&str) + Send + Sync> ProgressSink for F {
    fn report(&self, message: &str) {
        self(message)
    }
}

/// 丢弃所有进度消息
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _message: &str) {}
}
