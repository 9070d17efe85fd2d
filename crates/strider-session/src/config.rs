//! 会话配置
//!
//! 所有时间参数在配置文件中以毫秒整数表示（字段带 `_ms` 后缀），
//! 代码内使用 [`Duration`]。默认值取自实机调参结果：心跳 3s、
//! 导航轮询 500ms、上电轮询 250ms、速度上限 1.0 m/s。

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// 凭证环境变量（配置文件未提供时的回退来源）
pub const USERNAME_ENV: &str = "STRIDER_USERNAME";
pub const PASSWORD_ENV: &str = "STRIDER_PASSWORD";

/// 会话配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 认证用户名（缺省时读 `STRIDER_USERNAME`）
    pub username: Option<String>,
    /// 认证口令（缺省时读 `STRIDER_PASSWORD`）
    pub password: Option<String>,
    /// 地图目录（`graph.json` + 快照子目录）
    pub map_dir: PathBuf,

    /// 导航进度心跳间隔
    #[serde(rename = "heartbeat_interval_ms", with = "duration_ms")]
    pub heartbeat_interval: Duration,
    /// 导航状态轮询间隔
    #[serde(rename = "nav_poll_interval_ms", with = "duration_ms")]
    pub nav_poll_interval: Duration,
    /// 上电确认轮询间隔
    #[serde(rename = "power_poll_interval_ms", with = "duration_ms")]
    pub power_poll_interval: Duration,
    /// 导航速度上限（m/s）
    pub velocity_limit: f64,
    /// 单次导航总时限
    #[serde(rename = "nav_timeout_ms", with = "duration_ms")]
    pub nav_timeout: Duration,
    /// 单次 SDK 调用时限
    #[serde(rename = "sdk_call_timeout_ms", with = "duration_ms")]
    pub sdk_call_timeout: Duration,
    /// 上电完成等待时限
    #[serde(rename = "power_on_timeout_ms", with = "duration_ms")]
    pub power_on_timeout: Duration,
    /// 租约 TTL（续约间隔必须严格小于它）
    #[serde(rename = "lease_ttl_ms", with = "duration_ms")]
    pub lease_ttl: Duration,
    /// 续约间隔
    #[serde(rename = "renewal_interval_ms", with = "duration_ms")]
    pub renewal_interval: Duration,
    /// 连续续约失败多少次视为租约丢失
    pub renewal_failure_threshold: u32,
    /// SDK 工作线程数
    pub worker_threads: usize,
    /// SDK 命令队列深度
    pub queue_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            map_dir: PathBuf::from("map"),
            heartbeat_interval: Duration::from_secs(3),
            nav_poll_interval: Duration::from_millis(500),
            power_poll_interval: Duration::from_millis(250),
            velocity_limit: 1.0,
            nav_timeout: Duration::from_secs(600),
            sdk_call_timeout: Duration::from_secs(30),
            power_on_timeout: Duration::from_secs(30),
            lease_ttl: Duration::from_secs(10),
            renewal_interval: Duration::from_secs(2),
            renewal_failure_threshold: 3,
            worker_threads: 4,
            queue_depth: 8,
        }
    }
}

impl SessionConfig {
    /// 解析认证凭证：配置优先，环境变量兜底
    pub fn credentials(&self) -> Result<(String, String), SessionError> {
        let username = self
            .username
            .clone()
            .or_else(|| std::env::var(USERNAME_ENV).ok())
            .ok_or_else(|| {
                SessionError::AuthenticationFailed(format!(
                    "no username configured (set config or {USERNAME_ENV})"
                ))
            })?;
        let password = self
            .password
            .clone()
            .or_else(|| std::env::var(PASSWORD_ENV).ok())
            .ok_or_else(|| {
                SessionError::AuthenticationFailed(format!(
                    "no password configured (set config or {PASSWORD_ENV})"
                ))
            })?;
        Ok((username, password))
    }
}

/// Duration ⇄ 毫秒整数
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
