//! 独占租约监护
//!
//! 机器人同一时刻只接受一个控制端。会话取得租约后必须以小于
//! TTL 的间隔持续续约，否则租约过期、机器人急停。
//!
//! [`LeaseSupervisor`] 负责取得 / 强占 / 释放租约，并在持有期间
//! 运行一个专职续约线程。连续续约失败达到阈值即判定租约丢失：
//! 有效位清零、会话状态置为 Error，导航循环在下一拍感知并中止。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;

use crossbeam_channel::{Sender, bounded};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use strider_api::{LeaseToken, RobotSdk, SdkError};

use crate::config::SessionConfig;
use crate::dispatch::{JoinTimeout, SdkWorkerPool};
use crate::error::SessionError;
use crate::state::{AtomicSessionState, SessionState};

/// 持有中的租约与其续约线程
struct HeldLease {
    token: LeaseToken,
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
}

/// 租约监护器
pub struct LeaseSupervisor {
    sdk: Arc<dyn RobotSdk>,
    pool: Arc<SdkWorkerPool>,
    state: Arc<AtomicSessionState>,
    valid: Arc<AtomicBool>,
    held: Mutex<Option<HeldLease>>,
    renewal_interval: Duration,
    renewal_failure_threshold: u32,
    sdk_call_timeout: Duration,
}

impl LeaseSupervisor {
    pub fn new(
        sdk: Arc<dyn RobotSdk>,
        pool: Arc<SdkWorkerPool>,
        state: Arc<AtomicSessionState>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            sdk,
            pool,
            state,
            valid: Arc::new(AtomicBool::new(false)),
            held: Mutex::new(None),
            renewal_interval: config.renewal_interval,
            renewal_failure_threshold: config.renewal_failure_threshold,
            sdk_call_timeout: config.sdk_call_timeout,
        }
    }

    /// 当前租约是否有效
    ///
    /// 续约线程在连续失败达到阈值时清零。未持有租约时为 false。
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// 取得租约并启动续约线程
    ///
    /// `force` 为 true 时强占他人持有的租约，否则他人持有时
    /// 返回 [`SessionError::LeaseConflict`]。重复调用会先释放
    /// 已持有的旧租约。
    pub fn acquire(&self, force: bool) -> Result<LeaseToken, SessionError> {
        let mut held = self.held.lock();
        if let Some(old) = held.take() {
            debug!("releasing previously held lease before re-acquiring");
            self.stop_and_release(old);
        }

        let sdk = self.sdk.clone();
        let result = self.pool.call(self.sdk_call_timeout, move || {
            if force { sdk.take_lease() } else { sdk.acquire_lease() }
        })?;
        let token = result.map_err(|err| match err {
            SdkError::LeaseHeld { owner } => SessionError::LeaseConflict { owner },
            SdkError::AuthRejected(msg) => SessionError::AuthenticationFailed(msg),
            other => {
                error!(error = %other, "lease acquisition failed");
                SessionError::Internal(other.to_string())
            }
        })?;
        info!(owner = %token.owner, epoch = %token.epoch, forced = force, "lease acquired");

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let thread = {
            let sdk = self.sdk.clone();
            let valid = self.valid.clone();
            let state = self.state.clone();
            let interval = self.renewal_interval;
            let threshold = self.renewal_failure_threshold;
            let token = token.clone();
            spawn(move || {
                let mut failures: u32 = 0;
                loop {
                    match stop_rx.recv_timeout(interval) {
                        // 超时即到续约时刻
                        Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                    }
                    match sdk.renew_lease(&token) {
                        Ok(()) => {
                            if failures > 0 {
                                info!(failures, "lease renewal recovered");
                            }
                            failures = 0;
                        }
                        Err(err) => {
                            failures += 1;
                            warn!(error = %err, failures, threshold, "lease renewal failed");
                            if failures >= threshold {
                                error!("lease lost after {failures} consecutive renewal failures");
                                valid.store(false, Ordering::Release);
                                state.set(SessionState::Error, Ordering::SeqCst);
                                break;
                            }
                        }
                    }
                }
                debug!("lease renewal thread exiting");
            })
        };

        self.valid.store(true, Ordering::Release);
        *held = Some(HeldLease {
            token: token.clone(),
            stop_tx,
            thread,
        });
        Ok(token)
    }

    /// 释放租约
    ///
    /// 未持有租约时为空操作（幂等）。释放对端失败只记日志，
    /// 本地状态总是清理干净。
    pub fn release(&self) {
        let Some(held) = self.held.lock().take() else {
            return;
        };
        self.stop_and_release(held);
    }

    fn stop_and_release(&self, held: HeldLease) {
        self.valid.store(false, Ordering::Release);
        let _ = held.stop_tx.send(());
        if held.thread.join_timeout(Duration::from_secs(2)).is_err() {
            warn!("lease renewal thread did not exit in time");
        }
        let sdk = self.sdk.clone();
        let token = held.token;
        match self.pool.call(self.sdk_call_timeout, move || {
            sdk.release_lease(&token)
        }) {
            Ok(Ok(())) => info!("lease released"),
            Ok(Err(err)) => warn!(error = %err, "lease release rejected by robot"),
            Err(err) => warn!(error = %err, "lease release call failed"),
        }
    }
}

impl Drop for LeaseSupervisor {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strider_api::mock::MockRobot;

    fn supervisor(
        sdk: Arc<MockRobot>,
        config: &SessionConfig,
    ) -> (LeaseSupervisor, Arc<AtomicSessionState>) {
        let state = Arc::new(AtomicSessionState::default());
        let pool = Arc::new(SdkWorkerPool::new(2, 4));
        let sup = LeaseSupervisor::new(sdk, pool, state.clone(), config);
        (sup, state)
    }

    fn fast_config() -> SessionConfig {
        SessionConfig {
            renewal_interval: Duration::from_millis(10),
            renewal_failure_threshold: 3,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_acquire_and_release() {
        let sdk = Arc::new(MockRobot::new());
        let (sup, _state) = supervisor(sdk.clone(), &fast_config());

        sup.acquire(false).unwrap();
        assert!(sup.is_valid());
        assert!(sdk.lease_held());

        sup.release();
        assert!(!sup.is_valid());
        assert_eq!(sdk.release_count(), 1);
    }

    #[test]
    fn test_acquire_conflict_without_force() {
        let sdk = Arc::new(MockRobot::new());
        sdk.set_external_owner(Some("tablet-7"));
        let (sup, _state) = supervisor(sdk, &fast_config());

        match sup.acquire(false) {
            Err(SessionError::LeaseConflict { owner }) => assert_eq!(owner, "tablet-7"),
            other => panic!("expected LeaseConflict, got {other:?}"),
        }
        assert!(!sup.is_valid());
    }

    #[test]
    fn test_force_acquire_takes_over() {
        let sdk = Arc::new(MockRobot::new());
        sdk.set_external_owner(Some("tablet-7"));
        let (sup, _state) = supervisor(sdk.clone(), &fast_config());

        sup.acquire(true).unwrap();
        assert!(sup.is_valid());
        assert!(sdk.lease_held());
        sup.release();
    }

    #[test]
    fn test_renewal_thread_renews() {
        let sdk = Arc::new(MockRobot::new());
        let (sup, _state) = supervisor(sdk.clone(), &fast_config());

        sup.acquire(false).unwrap();
        std::thread::sleep(Duration::from_millis(60));
        sup.release();

        assert!(sdk.renew_count() >= 3, "renew_count = {}", sdk.renew_count());
    }

    #[test]
    fn test_lease_lost_after_consecutive_failures() {
        let sdk = Arc::new(MockRobot::new());
        let (sup, state) = supervisor(sdk.clone(), &fast_config());

        sup.acquire(false).unwrap();
        sdk.set_fail_renew(true);

        // 3 次失败 × 10ms 间隔，留足余量
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while sup.is_valid() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!sup.is_valid());
        assert_eq!(state.get(Ordering::SeqCst), SessionState::Error);
    }

    #[test]
    fn test_renewal_failure_below_threshold_recovers() {
        let sdk = Arc::new(MockRobot::new());
        let (sup, state) = supervisor(sdk.clone(), &fast_config());

        sup.acquire(false).unwrap();
        sdk.set_fail_renew(true);
        // 只允许失败一到两次，然后恢复
        std::thread::sleep(Duration::from_millis(15));
        sdk.set_fail_renew(false);
        std::thread::sleep(Duration::from_millis(50));

        assert!(sup.is_valid());
        assert_ne!(state.get(Ordering::SeqCst), SessionState::Error);
        sup.release();
    }

    #[test]
    fn test_release_is_idempotent() {
        let sdk = Arc::new(MockRobot::new());
        let (sup, _state) = supervisor(sdk.clone(), &fast_config());

        sup.acquire(false).unwrap();
        sup.release();
        sup.release();
        assert_eq!(sdk.release_count(), 1);
    }
}
