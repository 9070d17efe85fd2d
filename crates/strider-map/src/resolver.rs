//! 航点标识解析
//!
//! 把用户输入的位置代号解析为航点 id。解析优先级：
//!
//! 1. 精确短码匹配（两字符代号，如 `al`）
//! 2. 精确航点 id 匹配（粘贴完整 id 的场景）
//! 3. 名称精确匹配（不区分大小写）
//! 4. 名称前缀匹配（不区分大小写）
//! 5. 名称子串匹配（不区分大小写）
//!
//! 每一级命中即返回；同级多个命中视为歧义（不降级到下一级），
//! 零命中走到底则为未找到。解析器在图加载后不再变化，可跨线程
//! 并发只读。

use thiserror::Error;

use crate::graph::{Graph, short_code};

/// 解析失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no waypoint matches '{query}'")]
    NotFound { query: String },

    #[error("'{query}' is ambiguous: matches {}", candidates.join(", "))]
    Ambiguous {
        query: String,
        /// 命中的航点名（诊断用）
        candidates: Vec<String>,
    },
}

/// 解析器内部航点条目，同时供 CLI 列表展示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaypointEntry {
    pub id: String,
    pub name: String,
    pub short_code: Option<String>,
}

/// 航点解析器
///
/// 由加载完成的图构建，预先派生所有短码。
#[derive(Debug, Clone)]
pub struct WaypointResolver {
    entries: Vec<WaypointEntry>,
}

impl WaypointResolver {
    pub fn new(graph: &Graph) -> Self {
        let entries = graph
            .waypoints
            .iter()
            .map(|w| WaypointEntry {
                id: w.id.clone(),
                name: w.name.clone(),
                short_code: short_code(&w.id),
            })
            .collect();
        Self { entries }
    }

    /// 已知航点条目（CLI 列表用）
    pub fn entries(&self) -> &[WaypointEntry] {
        &self.entries
    }

    /// 解析位置代号为航点 id
    pub fn resolve(&self, query: &str) -> Result<&str, ResolveError> {
        // 1. 精确短码
        if let Some(id) = self.match_one(query, |e, q| e.short_code.as_deref() == Some(q))? {
            return Ok(id);
        }

        // 2. 精确 id
        if let Some(entry) = self.entries.iter().find(|e| e.id == query) {
            return Ok(&entry.id);
        }

        let lowered = query.to_lowercase();

        // 3. 名称精确（不区分大小写）
        if let Some(id) = self.match_one(&lowered, |e, q| e.name.to_lowercase() == q)? {
            return Ok(id);
        }

        // 4. 名称前缀
        if let Some(id) = self.match_one(&lowered, |e, q| e.name.to_lowercase().starts_with(q))? {
            return Ok(id);
        }

        // 5. 名称子串
        if !lowered.is_empty() {
            if let Some(id) = self.match_one(&lowered, |e, q| e.name.to_lowercase().contains(q))? {
                return Ok(id);
            }
        }

        Err(ResolveError::NotFound {
            query: query.to_string(),
        })
    }

    /// 在一个匹配级别内查找：恰好一个命中返回 id，
    /// 多个命中返回歧义错误，零命中返回 `None`（降级到下一级）。
    fn match_one(
        &self,
        query: &str,
        matches: impl Fn(&WaypointEntry, &str) -> bool,
    ) -> Result<Option<&str>, ResolveError> {
        let mut hits = self.entries.iter().filter(|e| matches(e, query));
        let Some(first) = hits.next() else {
            return Ok(None);
        };
        let extra: Vec<&WaypointEntry> = hits.collect();
        if extra.is_empty() {
            return Ok(Some(&first.id));
        }
        let mut candidates = vec![display_name(first)];
        candidates.extend(extra.into_iter().map(display_name));
        Err(ResolveError::Ambiguous {
            query: query.to_string(),
            candidates,
        })
    }
}

fn display_name(entry: &WaypointEntry) -> String {
    if entry.name.is_empty() {
        entry.id.clone()
    } else {
        entry.name.clone()
    }
}
