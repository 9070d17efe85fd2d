//! REPL 模式（交互式 Shell）
//!
//! 专用输入线程 + crossbeam 通道：rustyline 的阻塞读取留在输入
//! 线程里（保留历史记录），主线程串行处理命令。导航在后台线程
//! 执行，`stop` 和 Ctrl+C 随时取消。

use std::sync::Arc;
use std::thread;

use anyhow::Result;
use crossbeam_channel::{Receiver, bounded};
use rustyline::Editor;

use strider_session::RobotSession;

use crate::modes::oneshot::print_status;

/// REPL 输入（专用输入线程）
pub struct ReplInput {
    command_rx: Receiver<String>,
    _input_thread: thread::JoinHandle<Result<()>>,
}

impl ReplInput {
    /// 创建专用输入线程（保留历史记录）
    pub fn new() -> Self {
        let (command_tx, command_rx) = bounded::<String>(10);

        // ⭐ 关键：在专用线程内创建 Editor（生命周期 = REPL 会话）
        let input_thread = thread::spawn(move || {
            use rustyline::history::DefaultHistory;

            let mut rl = Editor::<(), DefaultHistory>::new()
                .map_err(|e| anyhow::anyhow!("Failed to initialize readline: {}", e))?;

            let history_path = ".strider_history";
            rl.load_history(history_path).ok(); // 忽略错误（首次运行）

            println!("Strider CLI v{} - 交互式 Shell", env!("CARGO_PKG_VERSION"));
            println!("输入 'help' 查看帮助，'exit' 退出");
            println!();

            loop {
                let readline = rl.readline("strider> ");

                match readline {
                    Ok(line) => {
                        let line: String = line.trim().to_string();

                        if line.is_empty() {
                            continue;
                        }

                        if line == "exit" || line == "quit" {
                            rl.save_history(history_path).ok();
                            let _ = command_tx.send(line);
                            break;
                        }

                        // 添加到历史
                        let _ = rl.add_history_entry(line.clone());

                        // 发送到主线程
                        if command_tx.send(line).is_err() {
                            break; // 主线程已关闭
                        }
                    },

                    Err(rustyline::error::ReadlineError::Interrupted) => {
                        // Ctrl+C：在主线程取消导航
                        println!("^C");
                        let _ = command_tx.send("SIGINT".to_string());
                    },

                    Err(rustyline::error::ReadlineError::Eof) => {
                        // Ctrl+D：退出
                        rl.save_history(history_path).ok();
                        break;
                    },

                    Err(err) => {
                        eprintln!("Error: {:?}", err);
                        break;
                    },
                }
            }

            Ok(())
        });

        Self {
            command_rx,
            _input_thread: input_thread,
        }
    }

    /// 阻塞等待用户输入
    pub fn recv_command(&self) -> Option<String> {
        self.command_rx.recv().ok()
    }
}

/// 运行 REPL 模式
pub fn run_repl(session: Arc<RobotSession>) -> Result<()> {
    let input = ReplInput::new(); // ⭐ 一次性创建，保留历史
    let mut nav_thread: Option<thread::JoinHandle<()>> = None;

    println!();
    println!("💡 提示: 使用 'connect' 连接到机器人，然后 'goto <航点>' 导航");
    println!();

    while let Some(line) = input.recv_command() {
        if line == "SIGINT" {
            // Ctrl+C：取消在途导航（会话保持连接）
            session.cancel_navigation();
            continue;
        }

        match line.as_str() {
            "exit" | "quit" => {
                break;
            }

            "help" => {
                print_help();
            }

            _ => {
                if let Err(err) = handle_command(&line, &session, &mut nav_thread) {
                    eprintln!("❌ Error: {}", err);
                    print_help_hint(&line);
                }
            }
        }
    }

    println!("👋 再见！");
    session.disconnect();
    if let Some(handle) = nav_thread.take() {
        let _ = handle.join();
    }

    Ok(())
}

/// 处理命令
fn handle_command(
    line: &str,
    session: &Arc<RobotSession>,
    nav_thread: &mut Option<thread::JoinHandle<()>>,
) -> Result<()> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    if parts.is_empty() {
        return Ok(());
    }

    // 回收已结束的后台导航线程
    if let Some(handle) = nav_thread.take() {
        if handle.is_finished() {
            let _ = handle.join();
        } else {
            *nav_thread = Some(handle);
        }
    }

    match parts[0] {
        "connect" => {
            let force = parts.iter().any(|&p| p == "--force");
            println!("⏳ 连接到机器人...");
            let progress = |message: &str| println!("  {message}");
            if force {
                session.force_connect(&progress)?;
            } else {
                session.connect(&progress)?;
            }
            println!("✅ 已连接");
        },

        "disconnect" => {
            session.disconnect();
            println!("✅ 已断开");
        },

        "status" => {
            print_status(&session.status());
        },

        "goto" => {
            let Some(waypoint) = parts.get(1) else {
                anyhow::bail!("用法: goto <航点>");
            };

            if nav_thread.is_some() {
                println!("⚠️  导航进行中，请先 stop");
                return Ok(());
            }

            let waypoint = waypoint.to_string();
            let session = session.clone();
            *nav_thread = Some(thread::spawn(move || {
                println!("⏳ 导航到 {waypoint}...");
                let progress = |message: &str| println!("  {message}");
                match session.goto(&waypoint, &progress) {
                    Ok(arrival) => println!(
                        "✅ 到达 {} (用时 {:.1}s)",
                        arrival.waypoint_name,
                        arrival.elapsed.as_secs_f64()
                    ),
                    Err(err) => eprintln!("❌ 导航失败: {}", err),
                }
            }));
        },

        "waypoints" => {
            let entries = session.waypoints()?;
            println!("路点 ({}):", entries.len());
            for entry in entries {
                if entry.name.is_empty() {
                    println!("  {}", entry.id);
                } else {
                    println!("  {}  ({})", entry.name, entry.id);
                }
            }
        },

        "stop" => {
            session.cancel_navigation();
            println!("🛑 已请求取消导航");
        },

        _ => {
            anyhow::bail!("未知命令: {}", parts[0]);
        },
    }

    Ok(())
}

/// 打印帮助信息
fn print_help() {
    println!("可用命令:");
    println!("  connect [--force]             连接机器人（--force 强占租约）");
    println!("  disconnect                    断开连接并释放租约");
    println!("  status                        显示会话与机器人状态");
    println!("  goto <航点>                   导航到航点（短码 / 名称 / id）");
    println!("  waypoints                     列出已加载地图的航点");
    println!("  stop                          取消在途导航");
    println!("  help                          显示帮助");
    println!("  exit / quit                   退出");
    println!();
    println!("快捷键:");
    println!("  Ctrl+C                        取消在途导航");
    println!("  Ctrl+D                        退出");
    println!();
}

/// 提供基于错误的帮助提示
fn print_help_hint(command: &str) {
    if command.starts_with("goto") {
        eprintln!("💡 提示: 使用 'goto al' 或 'goto Aula' 导航，'waypoints' 查看可用航点");
    } else if command.starts_with("connect") {
        eprintln!("💡 提示: 租约被他人持有时使用 'connect --force' 强占");
    } else if command.starts_with("waypoints") {
        eprintln!("💡 提示: 需要先使用 'connect' 连接机器人并加载地图");
    } else {
        eprintln!("💡 提示: 输入 'help' 查看所有命令");
    }
}
