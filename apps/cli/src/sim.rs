//! 内置模拟器后端
//!
//! 无硬件时试用 CLI 的默认后端：租约、上电和导航都在进程内
//! 模拟，导航按固定行程时间完成。真实机器人传输后端接入时在
//! [`crate::build_sdk`] 挂接。

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use strider_api::{
    LeaseToken, NavCommandId, RobotSdk, RobotState, SdkError, UploadResponse,
};

const SIM_OWNER: &str = "strider-cli";

struct ActiveNav {
    command: NavCommandId,
    started: Instant,
}

struct SimState {
    lease: Option<LeaseToken>,
    epoch_counter: u64,
    sequence_counter: u64,
    motor_powered: bool,
    nav: Option<ActiveNav>,
    next_command_id: u64,
}

/// 进程内模拟机器人
pub struct SimRobot {
    state: Mutex<SimState>,
    travel_time: Duration,
}

impl SimRobot {
    pub fn new(travel_time: Duration) -> Self {
        Self {
            state: Mutex::new(SimState {
                lease: None,
                epoch_counter: 0,
                sequence_counter: 0,
                motor_powered: false,
                nav: None,
                next_command_id: 1,
            }),
            travel_time,
        }
    }

    fn issue_token(state: &mut SimState) -> LeaseToken {
        state.epoch_counter += 1;
        state.sequence_counter += 1;
        let token = LeaseToken {
            owner: SIM_OWNER.to_string(),
            epoch: format!("epoch-{}", state.epoch_counter),
            sequence: state.sequence_counter,
        };
        state.lease = Some(token.clone());
        token
    }
}

impl RobotSdk for SimRobot {
    fn authenticate(&self, _username: &str, _password: &str) -> Result<(), SdkError> {
        Ok(())
    }

    fn sync_clock(&self) -> Result<(), SdkError> {
        Ok(())
    }

    fn acquire_lease(&self) -> Result<LeaseToken, SdkError> {
        let mut state = self.state.lock();
        if let Some(held) = &state.lease {
            return Err(SdkError::LeaseHeld {
                owner: held.owner.clone(),
            });
        }
        Ok(Self::issue_token(&mut state))
    }

    fn take_lease(&self) -> Result<LeaseToken, SdkError> {
        Ok(Self::issue_token(&mut self.state.lock()))
    }

    fn release_lease(&self, _token: &LeaseToken) -> Result<(), SdkError> {
        self.state.lock().lease = None;
        Ok(())
    }

    fn renew_lease(&self, _token: &LeaseToken) -> Result<(), SdkError> {
        if self.state.lock().lease.is_none() {
            return Err(SdkError::NoLease);
        }
        Ok(())
    }

    fn lease_owner(&self) -> Result<Option<String>, SdkError> {
        Ok(self.state.lock().lease.as_ref().map(|t| t.owner.clone()))
    }

    fn upload_graph(&self, _graph: bytes::Bytes) -> Result<UploadResponse, SdkError> {
        // 模拟器不缓存快照，也不索要
        Ok(UploadResponse::default())
    }

    fn upload_waypoint_snapshot(
        &self,
        _snapshot_id: &str,
        _data: bytes::Bytes,
    ) -> Result<(), SdkError> {
        Ok(())
    }

    fn upload_edge_snapshot(&self, _snapshot_id: &str, _data: bytes::Bytes) -> Result<(), SdkError> {
        Ok(())
    }

    fn localize_to_fiducial(&self) -> Result<(), SdkError> {
        Ok(())
    }

    fn navigate_to(&self, _waypoint_id: &str, _velocity_limit: f64) -> Result<NavCommandId, SdkError> {
        let mut state = self.state.lock();
        if state.lease.is_none() {
            return Err(SdkError::NoLease);
        }
        let command = NavCommandId(state.next_command_id);
        state.next_command_id += 1;
        state.nav = Some(ActiveNav {
            command,
            started: Instant::now(),
        });
        Ok(command)
    }

    fn navigation_status(&self, command: NavCommandId) -> Result<u8, SdkError> {
        let state = self.state.lock();
        match &state.nav {
            Some(nav) if nav.command == command => {
                if nav.started.elapsed() >= self.travel_time {
                    Ok(1) // reached goal
                } else {
                    Ok(0)
                }
            }
            _ => Err(SdkError::UnknownCommand(command)),
        }
    }

    fn cancel_navigation(&self, _command: NavCommandId) -> Result<(), SdkError> {
        self.state.lock().nav = None;
        Ok(())
    }

    fn power_on(&self) -> Result<(), SdkError> {
        self.state.lock().motor_powered = true;
        Ok(())
    }

    fn power_off(&self) -> Result<(), SdkError> {
        self.state.lock().motor_powered = false;
        Ok(())
    }

    fn robot_state(&self) -> Result<RobotState, SdkError> {
        let state = self.state.lock();
        Ok(RobotState {
            battery_percent: 92.0,
            motor_powered: state.motor_powered,
            estop_engaged: false,
        })
    }
}
