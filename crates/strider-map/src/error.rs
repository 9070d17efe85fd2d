//! 地图层错误类型

use std::path::PathBuf;

use thiserror::Error;

/// 地图加载错误
#[derive(Error, Debug)]
pub enum MapError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("graph definition parse failed: {0}")]
    Parse(#[from] serde_json::Error),

    /// 地图目录中缺少 `graph.json`
    #[error("graph definition not found: {path}")]
    GraphMissing { path: PathBuf },

    /// 图引用的快照文件在目录中不存在
    #[error("snapshot '{snapshot_id}' referenced by graph but missing: {path}")]
    SnapshotMissing { snapshot_id: String, path: PathBuf },
}
