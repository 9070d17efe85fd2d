//! 会话控制器集成测试
//!
//! 通过 [`RobotSession`] 门面走完整流程，包括：
//! - 连接 → 状态查询 → 导航 → 断开的完整任务生命周期
//! - 租约冲突与强占（force connect）
//! - 电源状态还原（谁上的电谁还原）
//! - 导航心跳节奏与失败上报
//! - 续约失败导致在途导航中止
//! - 快照按需上传
//!
//! 全部使用 `MockRobot`，不触碰真实硬件。

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;

use strider_api::mock::{MOCK_SELF_OWNER, MockRobot};
use strider_session::{NullProgress, RobotSession, SessionConfig, SessionError, SessionState};

/// 两个航点（Aula / Turm）、一条带快照的边、一条无快照的边
fn write_map_fixture(dir: &Path) {
    let graph = serde_json::json!({
        "waypoints": [
            {
                "id": "aula-lofty-swine-1",
                "name": "Aula",
                "position": [1.0, 2.0, 0.0],
                "snapshot_id": "wp-snap-1"
            },
            {
                "id": "turm-upper-deck-2",
                "name": "Turm",
                "position": [4.0, 5.0, 0.0],
                "snapshot_id": "wp-snap-2"
            }
        ],
        "edges": [
            {
                "from_id": "aula-lofty-swine-1",
                "to_id": "turm-upper-deck-2",
                "snapshot_id": "edge-snap-1"
            },
            {
                "from_id": "turm-upper-deck-2",
                "to_id": "aula-lofty-swine-1",
                "snapshot_id": ""
            }
        ]
    });
    fs::write(dir.join("graph.json"), graph.to_string()).unwrap();
    fs::create_dir(dir.join("waypoint_snapshots")).unwrap();
    fs::write(dir.join("waypoint_snapshots/wp-snap-1"), b"wp-blob-1").unwrap();
    fs::write(dir.join("waypoint_snapshots/wp-snap-2"), b"wp-blob-2").unwrap();
    fs::create_dir(dir.join("edge_snapshots")).unwrap();
    fs::write(dir.join("edge_snapshots/edge-snap-1"), b"edge-blob").unwrap();
}

fn fast_config(map_dir: &Path) -> SessionConfig {
    SessionConfig {
        username: Some("operator".to_string()),
        password: Some("secret".to_string()),
        map_dir: map_dir.to_path_buf(),
        heartbeat_interval: Duration::from_millis(90),
        nav_poll_interval: Duration::from_millis(30),
        power_poll_interval: Duration::from_millis(5),
        renewal_interval: Duration::from_millis(30),
        ..SessionConfig::default()
    }
}

fn session_with(
    configure: impl FnOnce(&mut SessionConfig),
) -> (Arc<MockRobot>, Arc<RobotSession>, TempDir) {
    let tmp = TempDir::new().unwrap();
    write_map_fixture(tmp.path());
    let mut config = fast_config(tmp.path());
    configure(&mut config);
    let sdk = Arc::new(MockRobot::new());
    let session = Arc::new(RobotSession::new(sdk.clone(), config));
    (sdk, session, tmp)
}

fn session() -> (Arc<MockRobot>, Arc<RobotSession>, TempDir) {
    session_with(|_| {})
}

/// 消息收集器（跨线程共享）
#[derive(Clone, Default)]
struct Collector {
    messages: Arc<Mutex<Vec<String>>>,
}

impl Collector {
    fn report(&self) -> impl Fn(&str) + Send + Sync + use<> {
        let messages = self.messages.clone();
        move |message: &str| messages.lock().push(message.to_string())
    }

    fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    fn heartbeats(&self) -> usize {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.starts_with("Navigating to"))
            .count()
    }
}

#[test]
fn test_full_mission_lifecycle() {
    let (sdk, session, _tmp) = session();
    sdk.script_nav_status(&[0, 0, 1]);

    let collector = Collector::default();
    session.connect(&collector.report()).unwrap();
    assert_eq!(session.state(), SessionState::Ready);

    let status = session.status();
    assert!(status.connected);
    assert_eq!(status.lease_owner.as_deref(), Some(MOCK_SELF_OWNER));

    let entries = session.waypoints().unwrap();
    assert_eq!(entries.len(), 2);

    // 短码解析：tu → Turm
    let arrival = session.goto("tu", &collector.report()).unwrap();
    assert_eq!(arrival.waypoint_id, "turm-upper-deck-2");
    assert_eq!(arrival.waypoint_name, "Turm");
    assert_eq!(session.state(), SessionState::Ready);

    session.disconnect();
    session.disconnect();
    assert_eq!(session.state(), SessionState::Disconnected);
    // 重复断开只归还一次租约
    assert_eq!(sdk.release_count(), 1);

    let messages = collector.messages();
    assert_eq!(
        &messages[..5],
        &[
            "Authenticated",
            "Lease acquired",
            "Map uploaded",
            "Robot localized",
            "Connected and ready",
        ]
    );
    assert_eq!(messages.last().unwrap(), "Arrived at Turm");
}

#[test]
fn test_lease_conflict_then_force_connect() {
    let (sdk, session, _tmp) = session();
    sdk.set_external_owner(Some("tablet-7"));

    match session.connect(&NullProgress) {
        Err(SessionError::LeaseConflict { owner }) => assert_eq!(owner, "tablet-7"),
        other => panic!("expected LeaseConflict, got {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Disconnected);

    session.force_connect(&NullProgress).unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(
        session.status().lease_owner.as_deref(),
        Some(MOCK_SELF_OWNER)
    );
}

#[test]
fn test_started_powered_robot_is_left_powered() {
    let (sdk, session, _tmp) = session();
    sdk.set_motor_powered(true);
    sdk.script_nav_status(&[0, 1]);

    session.connect(&NullProgress).unwrap();
    session.goto("Aula", &NullProgress).unwrap();

    // 连接前已上电的机器人导航后保持上电
    assert_eq!(sdk.power_on_count(), 0);
    assert_eq!(sdk.power_off_count(), 0);
    assert!(sdk.motor_powered());
}

#[test]
fn test_self_powered_robot_is_restored_after_each_goto() {
    let (sdk, session, _tmp) = session();
    sdk.script_nav_status(&[1]);

    session.connect(&NullProgress).unwrap();
    session.goto("Aula", &NullProgress).unwrap();
    session.goto("Turm", &NullProgress).unwrap();

    // 每次导航自己上的电自己还原
    assert_eq!(sdk.power_on_count(), 2);
    assert_eq!(sdk.power_off_count(), 2);
    assert!(!sdk.motor_powered());
}

#[test]
fn test_waypoint_resolution_through_session() {
    let (sdk, session, _tmp) = session();
    sdk.script_nav_status(&[1]);
    session.connect(&NullProgress).unwrap();

    let arrival = session.goto("al", &NullProgress).unwrap();
    assert_eq!(arrival.waypoint_id, "aula-lofty-swine-1");

    match session.goto("zzz", &NullProgress) {
        Err(SessionError::WaypointNotFound { query }) => assert_eq!(query, "zzz"),
        other => panic!("expected WaypointNotFound, got {other:?}"),
    }
    // 解析失败不应触碰 SDK 导航接口
    assert_eq!(sdk.navigate_count(), 1);
}

#[test]
fn test_heartbeat_cadence_during_goto() {
    let (sdk, session, _tmp) = session();
    // 9 次轮询 × 30ms ≈ 270ms，心跳间隔 90ms → 恰好 3 次心跳
    sdk.script_nav_status(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);

    session.connect(&NullProgress).unwrap();
    let collector = Collector::default();
    session.goto("Aula", &collector.report()).unwrap();

    assert_eq!(collector.heartbeats(), 3);
}

#[test]
fn test_stuck_navigation_reports_failure() {
    let (sdk, session, _tmp) = session_with(|config| {
        config.heartbeat_interval = Duration::ZERO;
    });
    sdk.script_nav_status(&[0, 3]);

    session.connect(&NullProgress).unwrap();
    let collector = Collector::default();
    let err = session.goto("tu", &collector.report()).unwrap_err();
    assert!(matches!(err, SessionError::NavigationStuck));

    // 心跳间隔为零：每个轮询周期都上报一次，两次轮询 = 两次心跳
    assert_eq!(collector.heartbeats(), 2);
    // 最后一条消息是失败原因
    let messages = collector.messages();
    assert_eq!(messages.last().unwrap(), &err.to_string());
    // 导航失败不影响会话，仍可再次导航
    assert_eq!(session.state(), SessionState::Ready);
}

#[test]
fn test_renewal_failure_aborts_inflight_navigation() {
    let (sdk, session, _tmp) = session();
    // 永远 Unknown：导航只能被租约丢失打断
    sdk.script_nav_status(&[0]);

    session.connect(&NullProgress).unwrap();
    let nav = {
        let session = session.clone();
        std::thread::spawn(move || session.goto("Aula", &NullProgress))
    };
    while session.state() != SessionState::Navigating {
        std::thread::sleep(Duration::from_millis(5));
    }

    sdk.set_fail_renew(true);
    let result = nav.join().unwrap();
    assert!(matches!(result, Err(SessionError::LeaseLost)));
    assert_eq!(session.state(), SessionState::Error);
    assert!(!session.lease_valid());
}

#[test]
fn test_snapshots_uploaded_only_on_request() {
    let (sdk, session, _tmp) = session();
    // 机器人只缺一份航点快照
    sdk.script_unknown_snapshots(&["wp-snap-2"], &[]);

    session.connect(&NullProgress).unwrap();

    assert_eq!(sdk.uploaded_waypoint_snapshots(), vec!["wp-snap-2"]);
    assert!(sdk.uploaded_edge_snapshots().is_empty());
}

#[test]
fn test_status_allowed_during_navigation() {
    let (sdk, session, _tmp) = session();
    sdk.script_nav_status(&[0]);
    session.connect(&NullProgress).unwrap();

    let nav = {
        let session = session.clone();
        std::thread::spawn(move || session.goto("Aula", &NullProgress))
    };
    while session.state() != SessionState::Navigating {
        std::thread::sleep(Duration::from_millis(5));
    }

    // 只读查询不参与互斥
    let status = session.status();
    assert!(status.connected);
    assert_eq!(status.state, SessionState::Navigating);

    // 第二个长操作立即拒绝
    assert!(matches!(
        session.goto("Turm", &NullProgress),
        Err(SessionError::Busy)
    ));

    session.disconnect();
    assert!(matches!(nav.join().unwrap(), Err(SessionError::Cancelled)));
}
