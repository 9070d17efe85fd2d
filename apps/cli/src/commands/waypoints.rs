//! 路点列表命令
//!
//! 只读本地地图目录，不连接机器人。

use std::path::Path;

use anyhow::{Context, Result};

use strider_map::{WaypointResolver, load_map_dir};

/// 列出地图中的全部路点
pub fn list_waypoints(map_dir: &Path) -> Result<()> {
    let bundle = load_map_dir(map_dir)
        .with_context(|| format!("加载地图目录失败: {}", map_dir.display()))?;
    let resolver = WaypointResolver::new(&bundle.graph);

    let entries = resolver.entries();
    if entries.is_empty() {
        println!("(地图中没有路点)");
        return Ok(());
    }

    println!("路点 ({}):", entries.len());
    for entry in entries {
        if entry.name.is_empty() {
            println!("  {}", entry.id);
        } else {
            println!("  {}  ({})", entry.name, entry.id);
        }
    }

    Ok(())
}
