//! # Strider CLI
//!
//! Command-line interface for Strider robot navigation sessions.
//!
//! ## 双模式架构
//!
//! ### One-shot 模式（推荐用于 CI/脚本）
//!
//! ```bash
//! # 配置地图目录
//! strider-cli config set --map-dir /data/maps/office
//!
//! # 执行操作（内部：连接 -> 导航 -> 断开）
//! strider-cli goto al
//! ```
//!
//! ### REPL 模式（推荐用于调试）
//!
//! ```bash
//! $ strider-cli shell
//! strider> connect
//! strider> waypoints
//! strider> goto Aula
//! strider> stop
//! strider> exit
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;

use strider_api::RobotSdk;
use strider_session::RobotSession;

mod commands;
mod modes;
mod sim;

use commands::{CliConfig, ConfigCommand, list_waypoints};
use modes::oneshot::OneShotMode;
use modes::repl::run_repl;
use sim::SimRobot;

/// 模拟器的固定行程时间
const SIM_TRAVEL_TIME: Duration = Duration::from_secs(3);

/// Strider CLI - 机器人导航命令行工具
#[derive(Parser, Debug)]
#[command(name = "strider-cli")]
#[command(about = "Command-line interface for Strider robot navigation sessions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 查询机器人状态
    Status,

    /// 导航到指定航点（短码 / 名称 / id）
    Goto {
        /// 目标航点
        waypoint: String,

        /// 强占他人持有的租约
        #[arg(long)]
        force: bool,
    },

    /// 列出地图中的航点（不连接机器人）
    Waypoints,

    /// 启动交互式 Shell（REPL 模式）
    Shell,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load()?;

    init_logging(&config);

    match cli.command {
        Commands::Config(cmd) => {
            // One-shot 模式：配置管理
            cmd.execute()
        },

        Commands::Status => {
            // One-shot 模式：状态查询
            let mode = OneShotMode::new(build_session(&config));
            mode.status()
        },

        Commands::Goto { waypoint, force } => {
            // One-shot 模式：导航
            let mode = OneShotMode::new(build_session(&config));
            mode.goto(&waypoint, force)
        },

        Commands::Waypoints => {
            // 离线：只读本地地图目录
            list_waypoints(&config.session_config().map_dir)
        },

        Commands::Shell => {
            // REPL 模式：交互式 Shell
            run_repl(build_session(&config))
        },
    }
}

/// 初始化日志：`RUST_LOG` 优先，其次配置文件的 log_level
fn init_logging(config: &CliConfig) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        tracing_subscriber::EnvFilter::new(config.log_level.as_deref().unwrap_or("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_session(config: &CliConfig) -> Arc<RobotSession> {
    Arc::new(RobotSession::new(build_sdk(config), config.session_config()))
}

/// 构建 SDK 后端
///
/// 目前唯一内置后端是进程内模拟器；真实机器人传输层接入后在
/// 这里按 hostname 选择。
fn build_sdk(config: &CliConfig) -> Arc<dyn RobotSdk> {
    if let Some(hostname) = &config.hostname {
        warn!(%hostname, "no robot transport built in, using the local simulator");
    }
    Arc::new(SimRobot::new(SIM_TRAVEL_TIME))
}
