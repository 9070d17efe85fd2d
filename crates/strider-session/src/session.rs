//! 会话门面
//!
//! [`RobotSession`] 是对外的唯一入口，组合连接管理、租约监护、
//! 电源跟踪与导航执行。长操作（connect / goto）互斥执行：同一
//! 时刻只允许一个在途，后来者立即得到 [`SessionError::Busy`]。
//! disconnect 例外：它总是被受理，先置位在途操作的取消标志，
//! 等其退出后再清理。
//!
//! status 与 waypoints 是只读查询，不参与互斥，导航中也可调用。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use tracing::{info, warn};

use strider_api::RobotSdk;
use strider_map::WaypointEntry;

use crate::config::SessionConfig;
use crate::connect::{ConnectionManager, MapContext};
use crate::dispatch::SdkWorkerPool;
use crate::error::SessionError;
use crate::lease::LeaseSupervisor;
use crate::nav::{Arrival, NavigationExecutor};
use crate::power::PowerStateTracker;
use crate::progress::ProgressSink;
use crate::state::{AtomicSessionState, SessionState};

/// 会话状态快照
///
/// 未连接时机器人侧字段为 `None`；已连接但查询失败时同样回退
/// 为 `None`，status 本身从不报错。
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub connected: bool,
    pub state: SessionState,
    pub battery_percent: Option<f32>,
    pub powered_on: Option<bool>,
    pub estop_engaged: Option<bool>,
    pub lease_owner: Option<String>,
}

/// 机器人会话控制器
pub struct RobotSession {
    sdk: Arc<dyn RobotSdk>,
    pool: Arc<SdkWorkerPool>,
    state: Arc<AtomicSessionState>,
    lease: Arc<LeaseSupervisor>,
    conn: ConnectionManager,
    nav: NavigationExecutor,
    map: Arc<ArcSwapOption<MapContext>>,
    /// 长操作互斥锁
    op_lock: Mutex<()>,
    /// 在途导航的取消标志（disconnect 用它抢占）
    active_cancel: ArcSwapOption<AtomicBool>,
    sdk_call_timeout: std::time::Duration,
}

impl RobotSession {
    pub fn new(sdk: Arc<dyn RobotSdk>, config: SessionConfig) -> Self {
        let pool = Arc::new(SdkWorkerPool::new(config.worker_threads, config.queue_depth));
        let state = Arc::new(AtomicSessionState::default());
        let lease = Arc::new(LeaseSupervisor::new(
            sdk.clone(),
            pool.clone(),
            state.clone(),
            &config,
        ));
        let power = Arc::new(PowerStateTracker::new(sdk.clone(), pool.clone(), &config));
        let map = Arc::new(ArcSwapOption::<MapContext>::empty());
        let nav = NavigationExecutor::new(
            sdk.clone(),
            pool.clone(),
            power.clone(),
            lease.clone(),
            &config,
        );
        let conn = ConnectionManager::new(
            sdk.clone(),
            pool.clone(),
            lease.clone(),
            power,
            state.clone(),
            map.clone(),
            config.clone(),
        );
        Self {
            sdk,
            pool,
            state,
            lease,
            conn,
            nav,
            map,
            op_lock: Mutex::new(()),
            active_cancel: ArcSwapOption::empty(),
            sdk_call_timeout: config.sdk_call_timeout,
        }
    }

    /// 当前会话状态
    pub fn state(&self) -> SessionState {
        self.state.get(Ordering::SeqCst)
    }

    /// 建立连接
    pub fn connect(&self, progress: &dyn ProgressSink) -> Result<(), SessionError> {
        let _guard = self.op_lock.try_lock().ok_or(SessionError::Busy)?;
        self.conn.connect(false, progress)
    }

    /// 建立连接，强占他人持有的租约
    pub fn force_connect(&self, progress: &dyn ProgressSink) -> Result<(), SessionError> {
        let _guard = self.op_lock.try_lock().ok_or(SessionError::Busy)?;
        self.conn.connect(true, progress)
    }

    /// 导航到指定航点
    ///
    /// 要求会话处于 Ready。导航期间状态为 Navigating，结束后回到
    /// Ready（租约丢失时留在 Error）。
    pub fn goto(
        &self,
        query: &str,
        progress: &dyn ProgressSink,
    ) -> Result<Arrival, SessionError> {
        let _guard = self.op_lock.try_lock().ok_or(SessionError::Busy)?;

        let Some(ctx) = self.map.load_full() else {
            return Err(SessionError::NotConnected);
        };
        if !self.state.compare_exchange(
            SessionState::Ready,
            SessionState::Navigating,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            return Err(match self.state.get(Ordering::SeqCst) {
                SessionState::Error => SessionError::LeaseLost,
                _ => SessionError::NotConnected,
            });
        }

        let cancel = Arc::new(AtomicBool::new(false));
        self.active_cancel.store(Some(cancel.clone()));

        let result = self.nav.goto(&ctx.resolver, query, progress, &cancel);

        self.active_cancel.store(None);
        // 租约丢失时续约线程已把状态置为 Error，保持不动
        self.state.compare_exchange(
            SessionState::Navigating,
            SessionState::Ready,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        result
    }

    /// 取消在途导航（保持连接）
    ///
    /// 没有在途导航时为空操作。
    pub fn cancel_navigation(&self) {
        if let Some(cancel) = self.active_cancel.load_full() {
            info!("navigation cancel requested");
            cancel.store(true, Ordering::Release);
        }
    }

    /// 断开连接
    ///
    /// 总是被受理：先抢占在途导航（置位取消标志），等其退出后
    /// 释放租约并清理。重复断开为空操作。
    pub fn disconnect(&self) {
        if let Some(cancel) = self.active_cancel.load_full() {
            info!("disconnect requested, cancelling active navigation");
            cancel.store(true, Ordering::Release);
        }
        let _guard = self.op_lock.lock();

        if self.state.get(Ordering::SeqCst) == SessionState::Disconnected {
            return;
        }
        self.lease.release();
        self.map.store(None);
        self.state.set(SessionState::Disconnected, Ordering::SeqCst);
        info!("disconnected");
    }

    /// 会话与机器人状态快照
    ///
    /// 从不报错：机器人侧查询失败只降级为 `None` 字段。
    pub fn status(&self) -> SessionStatus {
        let state = self.state.get(Ordering::SeqCst);
        if !state.is_connected() {
            return SessionStatus {
                connected: false,
                state,
                battery_percent: None,
                powered_on: None,
                estop_engaged: None,
                lease_owner: None,
            };
        }

        let sdk = self.sdk.clone();
        let robot = match self.pool.call(self.sdk_call_timeout, move || sdk.robot_state()) {
            Ok(Ok(robot)) => Some(robot),
            Ok(Err(err)) => {
                warn!(error = %err, "robot state query failed");
                None
            }
            Err(err) => {
                warn!(error = %err, "robot state query failed");
                None
            }
        };
        let sdk = self.sdk.clone();
        let lease_owner = match self.pool.call(self.sdk_call_timeout, move || sdk.lease_owner()) {
            Ok(Ok(owner)) => owner,
            Ok(Err(err)) => {
                warn!(error = %err, "lease owner query failed");
                None
            }
            Err(err) => {
                warn!(error = %err, "lease owner query failed");
                None
            }
        };

        SessionStatus {
            connected: true,
            state,
            battery_percent: robot.as_ref().map(|r| r.battery_percent),
            powered_on: robot.as_ref().map(|r| r.motor_powered),
            estop_engaged: robot.as_ref().map(|r| r.estop_engaged),
            lease_owner,
        }
    }

    /// 已加载地图的航点清单
    pub fn waypoints(&self) -> Result<Vec<WaypointEntry>, SessionError> {
        let ctx = self.map.load_full().ok_or(SessionError::NotConnected)?;
        Ok(ctx.resolver.entries().to_vec())
    }

    /// 租约当前是否有效
    pub fn lease_valid(&self) -> bool {
        self.lease.is_valid()
    }
}

impl Drop for RobotSession {
    fn drop(&mut self) {
        // 租约释放由 LeaseSupervisor 的 Drop 兜底，这里只确保
        // 在途导航不再阻塞退出
        if let Some(cancel) = self.active_cancel.load_full() {
            cancel.store(true, Ordering::Release);
        }
    }
}
