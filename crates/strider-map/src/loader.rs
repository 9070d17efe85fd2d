//! 地图目录加载
//!
//! 加载 `graph.json` 和图中引用的全部快照文件，产出一次性的
//! 只读 [`MapBundle`]。快照按 id 去重（多个航点可以共享同一份
//! 快照），快照 id 为空的边按录制约定没有快照文件，直接跳过。

use std::collections::HashMap;
use std::path::Path;

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::MapError;
use crate::graph::Graph;

const GRAPH_FILE: &str = "graph.json";
const WAYPOINT_SNAPSHOT_DIR: &str = "waypoint_snapshots";
const EDGE_SNAPSHOT_DIR: &str = "edge_snapshots";

/// 加载完成的地图
///
/// `graph_bytes` 保留 `graph.json` 的原始字节，上传时原样发送，
/// 避免重新序列化引入差异。
#[derive(Debug, Clone)]
pub struct MapBundle {
    pub graph: Graph,
    pub graph_bytes: Bytes,
    /// 航点快照，按快照 id 索引
    pub waypoint_snapshots: HashMap<String, Bytes>,
    /// 边快照，按快照 id 索引
    pub edge_snapshots: HashMap<String, Bytes>,
}

/// 从目录加载地图
pub fn load_map_dir(dir: &Path) -> Result<MapBundle, MapError> {
    let graph_path = dir.join(GRAPH_FILE);
    if !graph_path.is_file() {
        return Err(MapError::GraphMissing { path: graph_path });
    }

    let graph_bytes = Bytes::from(std::fs::read(&graph_path)?);
    let graph: Graph = serde_json::from_slice(&graph_bytes)?;

    let mut waypoint_snapshots = HashMap::new();
    for waypoint in &graph.waypoints {
        if waypoint.snapshot_id.is_empty() {
            continue;
        }
        if waypoint_snapshots.contains_key(&waypoint.snapshot_id) {
            continue;
        }
        let data = read_snapshot(dir, WAYPOINT_SNAPSHOT_DIR, &waypoint.snapshot_id)?;
        waypoint_snapshots.insert(waypoint.snapshot_id.clone(), data);
    }

    let mut edge_snapshots = HashMap::new();
    for edge in &graph.edges {
        // 空快照 id：录制时未生成快照的边，跳过
        if edge.snapshot_id.is_empty() {
            debug!(from = %edge.from_id, to = %edge.to_id, "edge has no snapshot, skipping");
            continue;
        }
        if edge_snapshots.contains_key(&edge.snapshot_id) {
            continue;
        }
        let data = read_snapshot(dir, EDGE_SNAPSHOT_DIR, &edge.snapshot_id)?;
        edge_snapshots.insert(edge.snapshot_id.clone(), data);
    }

    info!(
        waypoints = graph.waypoints.len(),
        edges = graph.edges.len(),
        waypoint_snapshots = waypoint_snapshots.len(),
        edge_snapshots = edge_snapshots.len(),
        "map loaded from {}",
        dir.display()
    );

    Ok(MapBundle {
        graph,
        graph_bytes,
        waypoint_snapshots,
        edge_snapshots,
    })
}

fn read_snapshot(dir: &Path, subdir: &str, snapshot_id: &str) -> Result<Bytes, MapError> {
    let path = dir.join(subdir).join(snapshot_id);
    if !path.is_file() {
        return Err(MapError::SnapshotMissing {
            snapshot_id: snapshot_id.to_string(),
            path,
        });
    }
    Ok(Bytes::from(std::fs::read(&path)?))
}
