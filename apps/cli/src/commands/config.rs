//! 配置管理命令
//!
//! CLI 配置保存在 `~/.config/strider/config.toml`，包含机器人地址、
//! 地图目录、凭证和日志级别。凭证也可以用 `STRIDER_USERNAME` /
//! `STRIDER_PASSWORD` 环境变量提供，配置文件优先。

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};

use strider_session::SessionConfig;

/// 配置文件目录
fn config_dir() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;

    path.push("strider");
    Ok(path)
}

fn config_file() -> Result<PathBuf> {
    let mut path = config_dir()?;
    fs::create_dir_all(&path).context("创建配置目录失败")?;

    path.push("config.toml");
    Ok(path)
}

/// CLI 配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// 机器人地址
    pub hostname: Option<String>,

    /// 地图目录（`graph.json` + 快照子目录）
    pub map_dir: Option<PathBuf>,

    /// 认证用户名
    pub username: Option<String>,

    /// 认证口令
    pub password: Option<String>,

    /// 日志级别（未设 `RUST_LOG` 时生效）
    pub log_level: Option<String>,
}

impl CliConfig {
    /// 加载配置
    pub fn load() -> Result<Self> {
        let path = config_file()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("读取配置文件失败")?;
        toml::from_str(&content).context("解析配置文件失败")
    }

    /// 保存配置
    pub fn save(&self) -> Result<()> {
        let path = config_file()?;

        let content = toml::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(&path, content).context("写入配置文件失败")?;

        Ok(())
    }

    /// 生成会话配置：CLI 配置覆盖默认值
    pub fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::default();

        if let Some(map_dir) = &self.map_dir {
            config.map_dir = map_dir.clone();
        }
        config.username = self.username.clone();
        config.password = self.password.clone();

        config
    }
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 显示当前配置
    Show,

    /// 设置配置项
    Set {
        /// 机器人地址
        #[arg(long)]
        hostname: Option<String>,

        /// 地图目录
        #[arg(long)]
        map_dir: Option<PathBuf>,

        /// 认证用户名
        #[arg(long)]
        username: Option<String>,

        /// 认证口令
        #[arg(long)]
        password: Option<String>,

        /// 日志级别
        #[arg(long)]
        log_level: Option<String>,
    },
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Show => Self::show(),

            ConfigCommand::Set {
                hostname,
                map_dir,
                username,
                password,
                log_level,
            } => Self::set(hostname, map_dir, username, password, log_level),
        }
    }

    fn show() -> Result<()> {
        let config = CliConfig::load()?;
        let path = config_file()?;

        println!("配置文件: {}", path.display());
        println!("  机器人地址: {}", display_opt(&config.hostname));
        println!(
            "  地图目录: {}",
            config
                .map_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(未设置)".to_string())
        );
        println!("  用户名: {}", display_opt(&config.username));
        println!(
            "  口令: {}",
            if config.password.is_some() {
                "(已设置)"
            } else {
                "(未设置)"
            }
        );
        println!("  日志级别: {}", display_opt(&config.log_level));

        Ok(())
    }

    fn set(
        hostname: Option<String>,
        map_dir: Option<PathBuf>,
        username: Option<String>,
        password: Option<String>,
        log_level: Option<String>,
    ) -> Result<()> {
        let mut config = CliConfig::load()?;

        if let Some(hostname) = hostname {
            println!("✅ 设置机器人地址: {}", hostname);
            config.hostname = Some(hostname);
        }

        if let Some(map_dir) = map_dir {
            println!("✅ 设置地图目录: {}", map_dir.display());
            config.map_dir = Some(map_dir);
        }

        if let Some(username) = username {
            println!("✅ 设置用户名: {}", username);
            config.username = Some(username);
        }

        if let Some(password) = password {
            config.password = Some(password);
            println!("✅ 设置口令");
        }

        if let Some(log_level) = log_level {
            println!("✅ 设置日志级别: {}", log_level);
            config.log_level = Some(log_level);
        }

        config.save()?;
        Ok(())
    }
}

fn display_opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("(未设置)")
}
