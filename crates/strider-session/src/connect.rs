//! 连接建立
//!
//! 连接是一个固定顺序的序列：认证与时钟同步 → 取得租约 → 上传
//! 导航图与快照 → 基准标记定位。每步完成推送一条进度消息；任一
//! 步失败即回滚（已取得的租约归还），会话回到 Disconnected，并
//! 返回该步对应的带语义错误。
//!
//! 连接成功后发布 [`MapContext`]（图 + 解析器），供导航与列表
//! 查询无锁读取。

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::{info, warn};

use strider_api::{RobotSdk, SdkError};
use strider_map::{MapBundle, WaypointResolver, load_map_dir};

use crate::config::SessionConfig;
use crate::dispatch::SdkWorkerPool;
use crate::error::SessionError;
use crate::lease::LeaseSupervisor;
use crate::power::PowerStateTracker;
use crate::progress::ProgressSink;
use crate::state::{AtomicSessionState, SessionState};

use std::sync::atomic::Ordering;

/// 连接成功后发布的地图上下文
pub struct MapContext {
    pub bundle: MapBundle,
    pub resolver: WaypointResolver,
}

/// 连接管理器
pub struct ConnectionManager {
    sdk: Arc<dyn RobotSdk>,
    pool: Arc<SdkWorkerPool>,
    lease: Arc<LeaseSupervisor>,
    power: Arc<PowerStateTracker>,
    state: Arc<AtomicSessionState>,
    map: Arc<ArcSwapOption<MapContext>>,
    config: SessionConfig,
}

impl ConnectionManager {
    pub fn new(
        sdk: Arc<dyn RobotSdk>,
        pool: Arc<SdkWorkerPool>,
        lease: Arc<LeaseSupervisor>,
        power: Arc<PowerStateTracker>,
        state: Arc<AtomicSessionState>,
        map: Arc<ArcSwapOption<MapContext>>,
        config: SessionConfig,
    ) -> Self {
        Self {
            sdk,
            pool,
            lease,
            power,
            state,
            map,
            config,
        }
    }

    /// 执行连接序列
    ///
    /// 已连接时直接返回 Ok（幂等）。`force` 为 true 时强占他人
    /// 持有的租约。
    pub fn connect(&self, force: bool, progress: &dyn ProgressSink) -> Result<(), SessionError> {
        if self.state.get(Ordering::SeqCst).is_connected() {
            info!("already connected");
            return Ok(());
        }

        match self.connect_sequence(force, progress) {
            Ok(()) => {
                self.state.set(SessionState::Ready, Ordering::SeqCst);
                progress.report("Connected and ready");
                info!("session ready");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "connect failed, rolling back");
                self.lease.release();
                self.map.store(None);
                self.state.set(SessionState::Disconnected, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    fn connect_sequence(&self, force: bool, progress: &dyn ProgressSink) -> Result<(), SessionError> {
        self.state
            .set(SessionState::Authenticating, Ordering::SeqCst);
        self.authenticate()?;
        progress.report("Authenticated");

        self.state
            .set(SessionState::LeaseAcquiring, Ordering::SeqCst);
        self.lease.acquire(force)?;
        progress.report("Lease acquired");

        self.state.set(SessionState::MapUploading, Ordering::SeqCst);
        let bundle = load_map_dir(&self.config.map_dir)?;
        self.upload_map(&bundle)?;
        progress.report("Map uploaded");

        self.state.set(SessionState::Localizing, Ordering::SeqCst);
        self.localize()?;
        progress.report("Robot localized");

        self.power.reset();
        self.power.capture_initial_state()?;

        let resolver = WaypointResolver::new(&bundle.graph);
        self.map
            .store(Some(Arc::new(MapContext { bundle, resolver })));
        Ok(())
    }

    fn authenticate(&self) -> Result<(), SessionError> {
        let (username, password) = self.config.credentials()?;
        let sdk = self.sdk.clone();
        self.pool
            .call(self.config.sdk_call_timeout, move || {
                sdk.authenticate(&username, &password)
            })?
            .map_err(|err| match err {
                SdkError::AuthRejected(msg) => SessionError::AuthenticationFailed(msg),
                other => SessionError::Internal(format!("authentication failed: {other}")),
            })?;

        let sdk = self.sdk.clone();
        self.pool
            .call(self.config.sdk_call_timeout, move || sdk.sync_clock())?
            .map_err(|err| SessionError::Internal(format!("clock sync failed: {err}")))?;
        info!("authenticated and clock synced");
        Ok(())
    }

    /// 上传导航图，然后按机器人报告的缺失清单补传快照
    fn upload_map(&self, bundle: &MapBundle) -> Result<(), SessionError> {
        let sdk = self.sdk.clone();
        let graph_bytes = bundle.graph_bytes.clone();
        let response = self
            .pool
            .call(self.config.sdk_call_timeout, move || {
                sdk.upload_graph(graph_bytes)
            })?
            .map_err(|err| SessionError::MapUploadFailed(err.to_string()))?;
        info!(
            missing_waypoint_snapshots = response.unknown_waypoint_snapshot_ids.len(),
            missing_edge_snapshots = response.unknown_edge_snapshot_ids.len(),
            "graph uploaded"
        );

        for snapshot_id in &response.unknown_waypoint_snapshot_ids {
            let Some(data) = bundle.waypoint_snapshots.get(snapshot_id) else {
                warn!(snapshot_id = %snapshot_id, "robot requested unknown waypoint snapshot");
                continue;
            };
            let sdk = self.sdk.clone();
            let id = snapshot_id.clone();
            let data = data.clone();
            self.pool
                .call(self.config.sdk_call_timeout, move || {
                    sdk.upload_waypoint_snapshot(&id, data)
                })?
                .map_err(|err| SessionError::MapUploadFailed(err.to_string()))?;
        }
        for snapshot_id in &response.unknown_edge_snapshot_ids {
            let Some(data) = bundle.edge_snapshots.get(snapshot_id) else {
                warn!(snapshot_id = %snapshot_id, "robot requested unknown edge snapshot");
                continue;
            };
            let sdk = self.sdk.clone();
            let id = snapshot_id.clone();
            let data = data.clone();
            self.pool
                .call(self.config.sdk_call_timeout, move || {
                    sdk.upload_edge_snapshot(&id, data)
                })?
                .map_err(|err| SessionError::MapUploadFailed(err.to_string()))?;
        }
        Ok(())
    }

    fn localize(&self) -> Result<(), SessionError> {
        let sdk = self.sdk.clone();
        self.pool
            .call(self.config.sdk_call_timeout, move || {
                sdk.localize_to_fiducial()
            })?
            .map_err(|err| SessionError::LocalizationFailed(err.to_string()))?;
        info!("localized to fiducial");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::fs;
    use std::path::Path;
    use strider_api::mock::MockRobot;
    use tempfile::TempDir;

    fn write_map_fixture(dir: &Path) {
        let graph = serde_json::json!({
            "waypoints": [
                {
                    "id": "aula-lofty-swine-1",
                    "name": "Aula",
                    "position": [0.0, 0.0, 0.0],
                    "snapshot_id": "snap-aula"
                },
                {
                    "id": "turm-upper-deck-2",
                    "name": "Turm",
                    "position": [4.0, 2.0, 0.0],
                    "snapshot_id": "snap-turm"
                }
            ],
            "edges": [
                {
                    "from_id": "aula-lofty-swine-1",
                    "to_id": "turm-upper-deck-2",
                    "snapshot_id": "snap-edge"
                }
            ]
        });
        fs::write(dir.join("graph.json"), graph.to_string()).unwrap();
        fs::create_dir(dir.join("waypoint_snapshots")).unwrap();
        fs::write(dir.join("waypoint_snapshots/snap-aula"), b"aula-blob").unwrap();
        fs::write(dir.join("waypoint_snapshots/snap-turm"), b"turm-blob").unwrap();
        fs::create_dir(dir.join("edge_snapshots")).unwrap();
        fs::write(dir.join("edge_snapshots/snap-edge"), b"edge-blob").unwrap();
    }

    struct Fixture {
        sdk: Arc<MockRobot>,
        manager: ConnectionManager,
        state: Arc<AtomicSessionState>,
        map: Arc<ArcSwapOption<MapContext>>,
        _tmp: TempDir,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        write_map_fixture(tmp.path());
        let config = SessionConfig {
            username: Some("operator".to_string()),
            password: Some("secret".to_string()),
            map_dir: tmp.path().to_path_buf(),
            renewal_interval: std::time::Duration::from_millis(50),
            ..SessionConfig::default()
        };
        let sdk: Arc<MockRobot> = Arc::new(MockRobot::new());
        let pool = Arc::new(SdkWorkerPool::new(2, 8));
        let state = Arc::new(AtomicSessionState::default());
        let lease = Arc::new(LeaseSupervisor::new(
            sdk.clone(),
            pool.clone(),
            state.clone(),
            &config,
        ));
        let power = Arc::new(PowerStateTracker::new(sdk.clone(), pool.clone(), &config));
        let map = Arc::new(ArcSwapOption::<MapContext>::empty());
        let manager = ConnectionManager::new(
            sdk.clone(),
            pool,
            lease,
            power,
            state.clone(),
            map.clone(),
            config,
        );
        Fixture {
            sdk,
            manager,
            state,
            map,
            _tmp: tmp,
        }
    }

    #[derive(Default)]
    struct Collector(Mutex<Vec<String>>);

    impl ProgressSink for Collector {
        fn report(&self, message: &str) {
            self.0.lock().push(message.to_string());
        }
    }

    #[test]
    fn test_connect_sequence_and_progress_order() {
        let f = fixture();
        let collector = Collector::default();

        f.manager.connect(false, &collector).unwrap();
        assert_eq!(f.state.get(Ordering::SeqCst), SessionState::Ready);
        assert!(f.sdk.lease_held());
        assert!(f.map.load().is_some());
        assert_eq!(
            *collector.0.lock(),
            vec![
                "Authenticated",
                "Lease acquired",
                "Map uploaded",
                "Robot localized",
                "Connected and ready",
            ]
        );
    }

    #[test]
    fn test_connect_is_idempotent_when_ready() {
        let f = fixture();
        f.manager.connect(false, &crate::progress::NullProgress).unwrap();

        let collector = Collector::default();
        f.manager.connect(false, &collector).unwrap();
        assert!(collector.0.lock().is_empty());
        assert_eq!(f.state.get(Ordering::SeqCst), SessionState::Ready);
    }

    #[test]
    fn test_auth_failure_rolls_back() {
        let f = fixture();
        f.sdk.set_fail_auth(true);

        let err = f
            .manager
            .connect(false, &crate::progress::NullProgress)
            .unwrap_err();
        assert!(matches!(err, SessionError::AuthenticationFailed(_)));
        assert_eq!(f.state.get(Ordering::SeqCst), SessionState::Disconnected);
        assert!(!f.sdk.lease_held());
    }

    #[test]
    fn test_lease_conflict_surfaces_owner() {
        let f = fixture();
        f.sdk.set_external_owner(Some("tablet-7"));

        let err = f
            .manager
            .connect(false, &crate::progress::NullProgress)
            .unwrap_err();
        match err {
            SessionError::LeaseConflict { owner } => assert_eq!(owner, "tablet-7"),
            other => panic!("expected LeaseConflict, got {other:?}"),
        }
        assert_eq!(f.state.get(Ordering::SeqCst), SessionState::Disconnected);
    }

    #[test]
    fn test_force_connect_takes_over() {
        let f = fixture();
        f.sdk.set_external_owner(Some("tablet-7"));

        f.manager
            .connect(true, &crate::progress::NullProgress)
            .unwrap();
        assert_eq!(f.state.get(Ordering::SeqCst), SessionState::Ready);
        assert!(f.sdk.lease_held());
    }

    #[test]
    fn test_upload_failure_releases_lease() {
        let f = fixture();
        f.sdk.set_fail_upload(true);

        let err = f
            .manager
            .connect(false, &crate::progress::NullProgress)
            .unwrap_err();
        assert!(matches!(err, SessionError::MapUploadFailed(_)));
        assert_eq!(f.state.get(Ordering::SeqCst), SessionState::Disconnected);
        assert_eq!(f.sdk.release_count(), 1);
        assert!(f.map.load().is_none());
    }

    #[test]
    fn test_localize_failure_releases_lease() {
        let f = fixture();
        f.sdk.set_fail_localize(true);

        let err = f
            .manager
            .connect(false, &crate::progress::NullProgress)
            .unwrap_err();
        assert!(matches!(err, SessionError::LocalizationFailed(_)));
        assert_eq!(f.sdk.release_count(), 1);
        assert_eq!(f.state.get(Ordering::SeqCst), SessionState::Disconnected);
    }

    #[test]
    fn test_uploads_only_requested_snapshots() {
        let f = fixture();
        f.sdk.script_unknown_snapshots(&["snap-turm"], &["snap-edge"]);

        f.manager
            .connect(false, &crate::progress::NullProgress)
            .unwrap();
        assert_eq!(f.sdk.uploaded_waypoint_snapshots(), vec!["snap-turm"]);
        assert_eq!(f.sdk.uploaded_edge_snapshots(), vec!["snap-edge"]);
    }

    #[test]
    fn test_unknown_requested_snapshot_is_skipped() {
        let f = fixture();
        f.sdk.script_unknown_snapshots(&["snap-nonexistent"], &[]);

        f.manager
            .connect(false, &crate::progress::NullProgress)
            .unwrap();
        assert!(f.sdk.uploaded_waypoint_snapshots().is_empty());
        assert_eq!(f.state.get(Ordering::SeqCst), SessionState::Ready);
    }

    #[test]
    fn test_missing_map_dir_fails_before_localize() {
        let f = fixture();
        fs::remove_file(f._tmp.path().join("graph.json")).unwrap();

        let err = f
            .manager
            .connect(false, &crate::progress::NullProgress)
            .unwrap_err();
        assert!(matches!(err, SessionError::Map(_)));
        assert_eq!(f.sdk.release_count(), 1);
        assert_eq!(f.state.get(Ordering::SeqCst), SessionState::Disconnected);
    }
}
