//! 图模型定义
//!
//! 航点 id 是录制时生成的多段字符串（如 `aula-lofty-swine-8Sk...`），
//! 人类不可读。短码取前两段的首字符（如 `al`），供命令行快速引用；
//! 段数不足三段的 id 没有短码。

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// 航点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waypoint {
    /// 全局唯一 id（录制时生成）
    pub id: String,
    /// 录制时标注的人类可读名称
    #[serde(default)]
    pub name: String,
    /// 在图坐标系中的位置
    pub position: Point3<f64>,
    /// 航点快照 id
    #[serde(default)]
    pub snapshot_id: String,
}

/// 有向边（from → to）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from_id: String,
    pub to_id: String,
    /// 边快照 id（可为空：此类边没有快照文件）
    #[serde(default)]
    pub snapshot_id: String,
}

/// 导航图
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    pub waypoints: Vec<Waypoint>,
    pub edges: Vec<Edge>,
}

impl Graph {
    /// 按 id 查找航点
    pub fn waypoint(&self, id: &str) -> Option<&Waypoint> {
        self.waypoints.iter().find(|w| w.id == id)
    }
}

/// 从航点 id 派生两字符短码
///
/// 取前两个 `-` 分段的首字符；段数不足三段时返回 `None`。
///
/// # 示例
///
/// ```
/// use strider_map::short_code;
///
/// assert_eq!(short_code("aula-lofty-swine-8Sk").as_deref(), Some("al"));
/// assert_eq!(short_code("too-short"), None);
/// ```
pub fn short_code(waypoint_id: &str) -> Option<String> {
    let mut tokens = waypoint_id.split('-');
    let first = tokens.next()?.chars().next()?;
    let second = tokens.next()?.chars().next()?;
    // 第三段必须存在，否则 id 太短，不派生短码
    tokens.next()?;
    Some(format!("{first}{second}"))
}
