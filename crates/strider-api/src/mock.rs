//! 可编程模拟机器人
//!
//! 仅在 `mock` feature 下编译，用于 strider-session 的集成测试。
//!
//! # 能力
//!
//! - 预设故障开关（认证 / 上传 / 定位 / 续约失败）
//! - 模拟竞争持有者（`acquire_lease` 返回冲突，`take_lease` 夺取）
//! - 导航状态码脚本（按轮询次序弹出，耗尽后重复最后一个值）
//! - 上电延迟（`power_on` 后需轮询 N 次 `robot_state` 才上电）
//! - 调用计数（release / power_on / power_off / cancel），供测试断言
//!
//! # 线程安全
//!
//! 内部状态由 `parking_lot::Mutex` 保护。测试通过 `Arc<MockRobot>`
//! 同时持有 SDK 句柄和断言句柄。

use std::collections::VecDeque;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::{LeaseToken, NavCommandId, RobotSdk, RobotState, SdkError, UploadResponse};

/// 模拟机器人持有者名（颁发的租约使用此 owner）
pub const MOCK_SELF_OWNER: &str = "strider";

#[derive(Debug)]
struct MockState {
    authenticated: bool,
    clock_synced: bool,

    // 故障开关
    fail_auth: bool,
    fail_upload: bool,
    fail_localize: bool,
    fail_renew: bool,
    fail_navigate: bool,

    // 租约
    external_owner: Option<String>,
    held: Option<LeaseToken>,
    epoch_counter: u64,
    sequence_counter: u64,

    // 电源
    motor_powered: bool,
    battery_percent: f32,
    estop_engaged: bool,
    power_on_polls_remaining: u32,
    power_on_poll_delay: u32,

    // 导航
    nav_script: VecDeque<u8>,
    last_nav_status: u8,
    next_command_id: u64,

    // 地图
    unknown_waypoint_snapshot_ids: Vec<String>,
    unknown_edge_snapshot_ids: Vec<String>,
    uploaded_waypoint_snapshots: Vec<String>,
    uploaded_edge_snapshots: Vec<String>,

    // 调用计数
    release_count: u32,
    renew_count: u32,
    power_on_count: u32,
    power_off_count: u32,
    cancel_count: u32,
    navigate_count: u32,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            authenticated: false,
            clock_synced: false,
            fail_auth: false,
            fail_upload: false,
            fail_localize: false,
            fail_renew: false,
            fail_navigate: false,
            external_owner: None,
            held: None,
            epoch_counter: 0,
            sequence_counter: 0,
            motor_powered: false,
            battery_percent: 87.0,
            estop_engaged: false,
            power_on_polls_remaining: 0,
            power_on_poll_delay: 0,
            nav_script: VecDeque::new(),
            last_nav_status: 0,
            next_command_id: 1,
            unknown_waypoint_snapshot_ids: Vec::new(),
            unknown_edge_snapshot_ids: Vec::new(),
            uploaded_waypoint_snapshots: Vec::new(),
            uploaded_edge_snapshots: Vec::new(),
            release_count: 0,
            renew_count: 0,
            power_on_count: 0,
            power_off_count: 0,
            cancel_count: 0,
            navigate_count: 0,
        }
    }
}

/// 可编程模拟机器人
#[derive(Debug, Default)]
pub struct MockRobot {
    state: Mutex<MockState>,
}

impl MockRobot {
    /// 创建默认模拟机器人（电机下电，无竞争持有者，脚本为空）
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== 脚本接口 ====================

    /// 设置认证失败
    pub fn set_fail_auth(&self, fail: bool) {
        self.state.lock().fail_auth = fail;
    }

    /// 设置图上传失败
    pub fn set_fail_upload(&self, fail: bool) {
        self.state.lock().fail_upload = fail;
    }

    /// 设置定位失败
    pub fn set_fail_localize(&self, fail: bool) {
        self.state.lock().fail_localize = fail;
    }

    /// 设置续约失败（所有后续 `renew_lease` 都返回错误）
    pub fn set_fail_renew(&self, fail: bool) {
        self.state.lock().fail_renew = fail;
    }

    /// 设置导航指令下发失败
    pub fn set_fail_navigate(&self, fail: bool) {
        self.state.lock().fail_navigate = fail;
    }

    /// 模拟竞争持有者（`acquire_lease` 将返回冲突）
    pub fn set_external_owner(&self, owner: Option<&str>) {
        self.state.lock().external_owner = owner.map(str::to_string);
    }

    /// 设置电机初始上电状态
    pub fn set_motor_powered(&self, powered: bool) {
        self.state.lock().motor_powered = powered;
    }

    /// 设置电量
    pub fn set_battery_percent(&self, percent: f32) {
        self.state.lock().battery_percent = percent;
    }

    /// 设置急停状态
    pub fn set_estop_engaged(&self, engaged: bool) {
        self.state.lock().estop_engaged = engaged;
    }

    /// 设置上电延迟：`power_on` 之后需轮询 `polls` 次
    /// `robot_state` 电机才变为上电
    pub fn set_power_on_poll_delay(&self, polls: u32) {
        self.state.lock().power_on_poll_delay = polls;
    }

    /// 预设导航状态码脚本（按 `navigation_status` 调用次序弹出，
    /// 耗尽后重复最后一个值；初始为空时恒返回 0）
    pub fn script_nav_status(&self, codes: &[u8]) {
        let mut state = self.state.lock();
        state.nav_script = codes.iter().copied().collect();
    }

    /// 预设图上传响应中缺失的快照 id
    pub fn script_unknown_snapshots(&self, waypoint_ids: &[&str], edge_ids: &[&str]) {
        let mut state = self.state.lock();
        state.unknown_waypoint_snapshot_ids =
            waypoint_ids.iter().map(|s| s.to_string()).collect();
        state.unknown_edge_snapshot_ids = edge_ids.iter().map(|s| s.to_string()).collect();
    }

    // ==================== 断言接口 ====================

    /// `release_lease` 被调用的次数
    pub fn release_count(&self) -> u32 {
        self.state.lock().release_count
    }

    /// `renew_lease` 被调用的次数
    pub fn renew_count(&self) -> u32 {
        self.state.lock().renew_count
    }

    /// `power_on` 被调用的次数
    pub fn power_on_count(&self) -> u32 {
        self.state.lock().power_on_count
    }

    /// `power_off` 被调用的次数
    pub fn power_off_count(&self) -> u32 {
        self.state.lock().power_off_count
    }

    /// `cancel_navigation` 被调用的次数
    pub fn cancel_count(&self) -> u32 {
        self.state.lock().cancel_count
    }

    /// `navigate_to` 被调用的次数
    pub fn navigate_count(&self) -> u32 {
        self.state.lock().navigate_count
    }

    /// 电机当前是否上电
    pub fn motor_powered(&self) -> bool {
        self.state.lock().motor_powered
    }

    /// 当前是否持有租约（夺取后视角为本进程持有）
    pub fn lease_held(&self) -> bool {
        self.state.lock().held.is_some()
    }

    /// 已上传的航点快照 id
    pub fn uploaded_waypoint_snapshots(&self) -> Vec<String> {
        self.state.lock().uploaded_waypoint_snapshots.clone()
    }

    /// 已上传的边快照 id
    pub fn uploaded_edge_snapshots(&self) -> Vec<String> {
        self.state.lock().uploaded_edge_snapshots.clone()
    }

    fn issue_token(state: &mut MockState) -> LeaseToken {
        state.sequence_counter += 1;
        let token = LeaseToken {
            owner: MOCK_SELF_OWNER.to_string(),
            epoch: format!("epoch-{}", state.epoch_counter),
            sequence: state.sequence_counter,
        };
        state.held = Some(token.clone());
        token
    }
}

impl RobotSdk for MockRobot {
    fn authenticate(&self, username: &str, _password: &str) -> Result<(), SdkError> {
        let mut state = self.state.lock();
        if state.fail_auth {
            return Err(SdkError::AuthRejected(format!(
                "invalid credentials for {username}"
            )));
        }
        state.authenticated = true;
        Ok(())
    }

    fn sync_clock(&self) -> Result<(), SdkError> {
        self.state.lock().clock_synced = true;
        Ok(())
    }

    fn acquire_lease(&self) -> Result<LeaseToken, SdkError> {
        let mut state = self.state.lock();
        if let Some(owner) = &state.external_owner {
            return Err(SdkError::LeaseHeld {
                owner: owner.clone(),
            });
        }
        state.epoch_counter += 1;
        Ok(Self::issue_token(&mut state))
    }

    fn take_lease(&self) -> Result<LeaseToken, SdkError> {
        let mut state = self.state.lock();
        // 夺取使先前持有者失效
        state.external_owner = None;
        state.epoch_counter += 1;
        Ok(Self::issue_token(&mut state))
    }

    fn release_lease(&self, _token: &LeaseToken) -> Result<(), SdkError> {
        let mut state = self.state.lock();
        state.release_count += 1;
        state.held = None;
        // 对未持有的租约容忍归还
        Ok(())
    }

    fn renew_lease(&self, _token: &LeaseToken) -> Result<(), SdkError> {
        let mut state = self.state.lock();
        state.renew_count += 1;
        if state.fail_renew {
            return Err(SdkError::Rpc("lease renewal rejected".to_string()));
        }
        if state.held.is_none() {
            return Err(SdkError::NoLease);
        }
        Ok(())
    }

    fn lease_owner(&self) -> Result<Option<String>, SdkError> {
        let state = self.state.lock();
        if let Some(owner) = &state.external_owner {
            return Ok(Some(owner.clone()));
        }
        Ok(state.held.as_ref().map(|t| t.owner.clone()))
    }

    fn upload_graph(&self, _graph: Bytes) -> Result<UploadResponse, SdkError> {
        let state = self.state.lock();
        if state.fail_upload {
            return Err(SdkError::Rpc("graph rejected by robot".to_string()));
        }
        Ok(UploadResponse {
            unknown_waypoint_snapshot_ids: state.unknown_waypoint_snapshot_ids.clone(),
            unknown_edge_snapshot_ids: state.unknown_edge_snapshot_ids.clone(),
        })
    }

    fn upload_waypoint_snapshot(&self, snapshot_id: &str, _data: Bytes) -> Result<(), SdkError> {
        self.state
            .lock()
            .uploaded_waypoint_snapshots
            .push(snapshot_id.to_string());
        Ok(())
    }

    fn upload_edge_snapshot(&self, snapshot_id: &str, _data: Bytes) -> Result<(), SdkError> {
        self.state
            .lock()
            .uploaded_edge_snapshots
            .push(snapshot_id.to_string());
        Ok(())
    }

    fn localize_to_fiducial(&self) -> Result<(), SdkError> {
        if self.state.lock().fail_localize {
            return Err(SdkError::Rpc("no fiducial in view".to_string()));
        }
        Ok(())
    }

    fn navigate_to(
        &self,
        _waypoint_id: &str,
        _velocity_limit: f64,
    ) -> Result<NavCommandId, SdkError> {
        let mut state = self.state.lock();
        state.navigate_count += 1;
        if state.fail_navigate {
            return Err(SdkError::Rpc("navigation command rejected".to_string()));
        }
        let id = NavCommandId(state.next_command_id);
        state.next_command_id += 1;
        Ok(id)
    }

    fn navigation_status(&self, _command: NavCommandId) -> Result<u8, SdkError> {
        let mut state = self.state.lock();
        if let Some(code) = state.nav_script.pop_front() {
            state.last_nav_status = code;
        }
        Ok(state.last_nav_status)
    }

    fn cancel_navigation(&self, _command: NavCommandId) -> Result<(), SdkError> {
        self.state.lock().cancel_count += 1;
        Ok(())
    }

    fn power_on(&self) -> Result<(), SdkError> {
        let mut state = self.state.lock();
        state.power_on_count += 1;
        if state.power_on_poll_delay == 0 {
            state.motor_powered = true;
        } else {
            state.power_on_polls_remaining = state.power_on_poll_delay;
        }
        Ok(())
    }

    fn power_off(&self) -> Result<(), SdkError> {
        let mut state = self.state.lock();
        state.power_off_count += 1;
        state.motor_powered = false;
        Ok(())
    }

    fn robot_state(&self) -> Result<RobotState, SdkError> {
        let mut state = self.state.lock();
        if state.power_on_polls_remaining > 0 {
            state.power_on_polls_remaining -= 1;
            if state.power_on_polls_remaining == 0 {
                state.motor_powered = true;
            }
        }
        Ok(RobotState {
            battery_percent: state.battery_percent,
            motor_powered: state.motor_powered,
            estop_engaged: state.estop_engaged,
        })
    }
}
