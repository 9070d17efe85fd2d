//! 电机上电状态跟踪
//!
//! 导航前电机必须上电。谁上的电谁负责恢复：连接时记录机器人
//! 的初始上电状态，导航需要时由本会话上电的，导航结束后断电
//! 还原；机器人本来就带电的（例如操作员手动上电），导航结束后
//! 绝不替人断电。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use strider_api::RobotSdk;

use crate::config::SessionConfig;
use crate::dispatch::SdkWorkerPool;
use crate::error::SessionError;

/// 电源状态跟踪器
pub struct PowerStateTracker {
    sdk: Arc<dyn RobotSdk>,
    pool: Arc<SdkWorkerPool>,
    /// 连接时机器人是否已上电
    started_powered_on: AtomicBool,
    /// 本会话是否执行过上电（决定导航后是否断电还原）
    self_powered: AtomicBool,
    poll_interval: Duration,
    power_on_timeout: Duration,
    sdk_call_timeout: Duration,
}

impl PowerStateTracker {
    pub fn new(sdk: Arc<dyn RobotSdk>, pool: Arc<SdkWorkerPool>, config: &SessionConfig) -> Self {
        Self {
            sdk,
            pool,
            started_powered_on: AtomicBool::new(false),
            self_powered: AtomicBool::new(false),
            poll_interval: config.power_poll_interval,
            power_on_timeout: config.power_on_timeout,
            sdk_call_timeout: config.sdk_call_timeout,
        }
    }

    /// 连接完成时记录初始上电状态
    pub fn capture_initial_state(&self) -> Result<(), SessionError> {
        let powered = self.query_powered()?;
        self.started_powered_on.store(powered, Ordering::Release);
        self.self_powered.store(false, Ordering::Release);
        info!(powered, "captured initial motor power state");
        Ok(())
    }

    /// 断开时清空跟踪状态
    pub fn reset(&self) {
        self.started_powered_on.store(false, Ordering::Release);
        self.self_powered.store(false, Ordering::Release);
    }

    /// 确保电机已上电，必要时代为上电并轮询确认
    pub fn ensure_powered_for_navigation(&self) -> Result<(), SessionError> {
        if self.query_powered()? {
            debug!("motors already powered");
            return Ok(());
        }

        info!("powering on motors for navigation");
        let sdk = self.sdk.clone();
        self.pool
            .call(self.sdk_call_timeout, move || sdk.power_on())?
            .map_err(|err| SessionError::Internal(format!("power on failed: {err}")))?;

        let start = Instant::now();
        loop {
            if self.query_powered()? {
                self.self_powered.store(true, Ordering::Release);
                info!(elapsed_ms = start.elapsed().as_millis() as u64, "motors powered on");
                return Ok(());
            }
            let elapsed = start.elapsed();
            if elapsed >= self.power_on_timeout {
                return Err(SessionError::Timeout {
                    timeout_ms: self.power_on_timeout.as_millis() as u64,
                });
            }
            let remaining = self.power_on_timeout - elapsed;
            spin_sleep::sleep(self.poll_interval.min(remaining));
        }
    }

    /// 导航结束后按需还原电源状态
    ///
    /// 只有「本会话上的电、且机器人连接时未带电」才执行断电。
    /// 断电失败只记日志，不影响导航结果。
    pub fn restore_state_after_navigation(&self) {
        let self_powered = self.self_powered.swap(false, Ordering::AcqRel);
        if !self_powered || self.started_powered_on.load(Ordering::Acquire) {
            return;
        }
        info!("powering off motors to restore initial state");
        let sdk = self.sdk.clone();
        match self.pool.call(self.sdk_call_timeout, move || sdk.power_off()) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "power off rejected by robot"),
            Err(err) => warn!(error = %err, "power off call failed"),
        }
    }

    fn query_powered(&self) -> Result<bool, SessionError> {
        let sdk = self.sdk.clone();
        let state = self
            .pool
            .call(self.sdk_call_timeout, move || sdk.robot_state())?
            .map_err(|err| SessionError::Internal(format!("robot state query failed: {err}")))?;
        Ok(state.motor_powered)
    }
}
