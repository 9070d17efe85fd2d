//! One-shot 模式
//!
//! 每个命令独立执行：
//! 1. 连接机器人（认证 → 租约 → 地图上传 → 定位）
//! 2. 执行操作
//! 3. 断开连接
//!
//! Ctrl+C 随时抢占：取消在途导航、释放租约后退出。

use std::process;
use std::sync::Arc;

use anyhow::Result;

use strider_session::{RobotSession, SessionStatus};

/// One-shot 模式
pub struct OneShotMode {
    session: Arc<RobotSession>,
}

impl OneShotMode {
    /// 创建 One-shot 模式实例并挂接 Ctrl+C 处理
    pub fn new(session: Arc<RobotSession>) -> Self {
        let handler_session = session.clone();
        ctrlc::set_handler(move || {
            eprintln!("\n收到退出信号，正在断开...");
            handler_session.disconnect();
            process::exit(130);
        })
        .expect("Failed to set signal handler");

        Self { session }
    }

    /// 状态查询
    pub fn status(&self) -> Result<()> {
        println!("⏳ 连接到机器人...");
        let progress = |message: &str| println!("  {message}");
        self.session.connect(&progress)?;

        let status = self.session.status();
        self.session.disconnect();

        print_status(&status);
        Ok(())
    }

    /// 导航到指定航点
    pub fn goto(&self, waypoint: &str, force: bool) -> Result<()> {
        println!("⏳ 连接到机器人...");
        let progress = |message: &str| println!("  {message}");
        if force {
            self.session.force_connect(&progress)?;
        } else {
            self.session.connect(&progress)?;
        }

        println!("⏳ 导航到 {waypoint}...");
        let result = self.session.goto(waypoint, &progress);
        self.session.disconnect();

        let arrival = result?;
        println!(
            "✅ 到达 {} (用时 {:.1}s)",
            arrival.waypoint_name,
            arrival.elapsed.as_secs_f64()
        );
        Ok(())
    }
}

pub(crate) fn print_status(status: &SessionStatus) {
    println!("机器人状态:");
    println!("  会话: {}", status.state);

    match status.battery_percent {
        Some(battery) => println!("  电量: {battery:.1}%"),
        None => println!("  电量: (未知)"),
    }
    match status.powered_on {
        Some(true) => println!("  电机: 已上电"),
        Some(false) => println!("  电机: 未上电"),
        None => println!("  电机: (未知)"),
    }
    match status.estop_engaged {
        Some(true) => println!("  急停: ⚠️ 已触发"),
        Some(false) => println!("  急停: 正常"),
        None => println!("  急停: (未知)"),
    }
    match &status.lease_owner {
        Some(owner) => println!("  租约持有者: {owner}"),
        None => println!("  租约持有者: (无)"),
    }
}
