//! Per-node like aggregation over raw `LikeRecord` rows.

use domains::{LikeRecord, LikeSummary, NodeId, UserId};
use std::collections::{HashMap, HashSet};

/// Like counts for a set of nodes, from one viewer's perspective.
#[derive(Debug, Default)]
pub struct LikeTally {
    by_node: HashMap<NodeId, LikeSummary>,
}

impl LikeTally {
    /// Counts distinct users with `liked = true` per node. Rows with the flag
    /// cleared only record that a user once toggled.
    pub fn from_records(records: impl IntoIterator<Item = LikeRecord>, viewer: Option<UserId>) -> Self {
        let mut seen = HashSet::new();
        let mut by_node: HashMap<NodeId, LikeSummary> = HashMap::new();
        for record in records {
            if !record.liked || !seen.insert((record.node_id, record.user_id)) {
                continue;
            }
            let summary = by_node.entry(record.node_id).or_default();
            summary.like_count += 1;
            if viewer == Some(record.user_id) {
                summary.viewer_liked = true;
            }
        }
        Self { by_node }
    }

    pub fn summary(&self, node_id: NodeId) -> LikeSummary {
        self.by_node.get(&node_id).copied().unwrap_or_default()
    }
}
