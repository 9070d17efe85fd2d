//! 导航执行
//!
//! 一次导航是一个阻塞的轮询循环：下发导航命令后按固定间隔查询
//! 反馈码，直到终态、取消、租约丢失或超时。每个循环拍的检查顺序
//! 固定：取消 → 租约 → 心跳 → 总时限 → 状态查询。
//!
//! 无论哪条路径退出，都会先还原电源状态再返回。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use strider_api::{NavCommandId, NavFeedback, RobotSdk, SdkError};
use strider_map::WaypointResolver;

use crate::config::SessionConfig;
use crate::dispatch::SdkWorkerPool;
use crate::error::SessionError;
use crate::lease::LeaseSupervisor;
use crate::power::PowerStateTracker;
use crate::progress::ProgressSink;

/// 一次成功导航的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arrival {
    pub waypoint_id: String,
    pub waypoint_name: String,
    pub elapsed: Duration,
}

/// 导航执行器
pub struct NavigationExecutor {
    sdk: Arc<dyn RobotSdk>,
    pool: Arc<SdkWorkerPool>,
    power: Arc<PowerStateTracker>,
    lease: Arc<LeaseSupervisor>,
    heartbeat_interval: Duration,
    nav_poll_interval: Duration,
    nav_timeout: Duration,
    sdk_call_timeout: Duration,
    velocity_limit: f64,
}

impl NavigationExecutor {
    pub fn new(
        sdk: Arc<dyn RobotSdk>,
        pool: Arc<SdkWorkerPool>,
        power: Arc<PowerStateTracker>,
        lease: Arc<LeaseSupervisor>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            sdk,
            pool,
            power,
            lease,
            heartbeat_interval: config.heartbeat_interval,
            nav_poll_interval: config.nav_poll_interval,
            nav_timeout: config.nav_timeout,
            sdk_call_timeout: config.sdk_call_timeout,
            velocity_limit: config.velocity_limit,
        }
    }

    /// 导航到 `query` 指定的航点
    ///
    /// `cancel` 置位后在下一个循环拍中止并下发取消命令。
    pub fn goto(
        &self,
        resolver: &WaypointResolver,
        query: &str,
        progress: &dyn ProgressSink,
        cancel: &AtomicBool,
    ) -> Result<Arrival, SessionError> {
        let waypoint_id = resolver.resolve(query)?.to_string();
        let waypoint_name = resolver
            .entries()
            .iter()
            .find(|e| e.id == waypoint_id)
            .map(|e| {
                if e.name.is_empty() {
                    e.id.clone()
                } else {
                    e.name.clone()
                }
            })
            .unwrap_or_else(|| waypoint_id.clone());
        info!(waypoint = %waypoint_id, name = %waypoint_name, "starting navigation");

        self.power.ensure_powered_for_navigation()?;

        let result = self.run_to_completion(&waypoint_id, &waypoint_name, progress, cancel);
        self.power.restore_state_after_navigation();

        match &result {
            Ok(arrival) => {
                info!(
                    waypoint = %arrival.waypoint_id,
                    elapsed_ms = arrival.elapsed.as_millis() as u64,
                    "navigation complete"
                );
                progress.report(&format!("Arrived at {waypoint_name}"));
            }
            Err(err) => {
                warn!(waypoint = %waypoint_id, error = %err, "navigation did not complete");
                progress.report(&err.to_string());
            }
        }
        result
    }

    fn run_to_completion(
        &self,
        waypoint_id: &str,
        waypoint_name: &str,
        progress: &dyn ProgressSink,
        cancel: &AtomicBool,
    ) -> Result<Arrival, SessionError> {
        let command = self.send_navigate(waypoint_id)?;
        let start = Instant::now();
        let mut last_beat = start;

        loop {
            if cancel.load(Ordering::Acquire) {
                self.cancel_best_effort(command);
                return Err(SessionError::Cancelled);
            }
            if !self.lease.is_valid() {
                return Err(SessionError::LeaseLost);
            }
            if last_beat.elapsed() >= self.heartbeat_interval {
                last_beat = Instant::now();
                progress.report(&format!(
                    "Navigating to {waypoint_name}... ({}s)",
                    start.elapsed().as_secs()
                ));
            }
            if start.elapsed() >= self.nav_timeout {
                self.cancel_best_effort(command);
                return Err(SessionError::Timeout {
                    timeout_ms: self.nav_timeout.as_millis() as u64,
                });
            }

            let feedback = self.poll_status(command)?;
            debug!(command = %command, ?feedback, "navigation feedback");
            match feedback {
                NavFeedback::ReachedGoal => {
                    return Ok(Arrival {
                        waypoint_id: waypoint_id.to_string(),
                        waypoint_name: waypoint_name.to_string(),
                        elapsed: start.elapsed(),
                    });
                }
                NavFeedback::Lost => return Err(SessionError::NavigationLost),
                NavFeedback::Stuck => return Err(SessionError::NavigationStuck),
                NavFeedback::RobotImpaired => return Err(SessionError::NavigationImpaired),
                NavFeedback::Unknown => {}
            }

            spin_sleep::sleep(self.nav_poll_interval);
        }
    }

    fn send_navigate(&self, waypoint_id: &str) -> Result<NavCommandId, SessionError> {
        let sdk = self.sdk.clone();
        let waypoint = waypoint_id.to_string();
        let velocity = self.velocity_limit;
        self.pool
            .call(self.sdk_call_timeout, move || {
                sdk.navigate_to(&waypoint, velocity)
            })?
            .map_err(|err| match err {
                SdkError::NoLease => SessionError::LeaseLost,
                other => SessionError::Internal(format!("navigation command failed: {other}")),
            })
    }

    fn poll_status(&self, command: NavCommandId) -> Result<NavFeedback, SessionError> {
        let sdk = self.sdk.clone();
        let code = self
            .pool
            .call(self.sdk_call_timeout, move || sdk.navigation_status(command))?
            .map_err(|err| SessionError::Internal(format!("status query failed: {err}")))?;
        Ok(NavFeedback::from(code))
    }

    fn cancel_best_effort(&self, command: NavCommandId) {
        let sdk = self.sdk.clone();
        match self.pool.call(self.sdk_call_timeout, move || {
            sdk.cancel_navigation(command)
        }) {
            Ok(Ok(())) => info!(command = %command, "navigation cancelled"),
            Ok(Err(err)) => warn!(command = %command, error = %err, "cancel rejected by robot"),
            Err(err) => warn!(command = %command, error = %err, "cancel call failed"),
        }
    }
}
