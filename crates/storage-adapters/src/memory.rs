//! In-process store backed by `DashMap`.
//!
//! Used by tests and single-node deployments. Every port call counts as one
//! read or write against the store, which `ReadStats` exposes so callers can
//! check that assembly stays at a constant number of reads.

use async_trait::async_trait;
use dashmap::DashMap;
use domains::{
    LikeRecord, LikeRepository, NodeId, Page, RepoError, ThreadNode, ThreadRepository, UserId,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Counters of bulk reads served by a `MemoryStore`.
#[derive(Debug, Default)]
pub struct ReadStats {
    node_reads: AtomicU64,
    subtree_reads: AtomicU64,
    like_reads: AtomicU64,
}

impl ReadStats {
    pub fn node_reads(&self) -> u64 {
        self.node_reads.load(Ordering::Relaxed)
    }

    pub fn subtree_reads(&self) -> u64 {
        self.subtree_reads.load(Ordering::Relaxed)
    }

    pub fn like_reads(&self) -> u64 {
        self.like_reads.load(Ordering::Relaxed)
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: DashMap<NodeId, ThreadNode>,
    /// Keyed by (node, user); the value is the `liked` flag.
    likes: DashMap<(NodeId, UserId), bool>,
    stats: ReadStats,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    /// Number of stored records, deleted ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[async_trait]
impl ThreadRepository for MemoryStore {
    async fn find_node(&self, id: NodeId) -> Result<Option<ThreadNode>, RepoError> {
        ReadStats::bump(&self.stats.node_reads);
        Ok(self.nodes.get(&id).map(|n| n.value().clone()))
    }

    async fn load_subtree(&self, root_id: NodeId) -> Result<Vec<ThreadNode>, RepoError> {
        ReadStats::bump(&self.stats.subtree_reads);

        let mut by_parent: HashMap<NodeId, Vec<ThreadNode>> = HashMap::new();
        for entry in self.nodes.iter() {
            if let Some(parent) = entry.parent_id {
                by_parent.entry(parent).or_default().push(entry.value().clone());
            }
        }

        let mut out = Vec::new();
        let mut visited = HashSet::from([root_id]);
        let mut frontier = vec![root_id];
        while let Some(parent) = frontier.pop() {
            for child in by_parent.remove(&parent).unwrap_or_default() {
                if visited.insert(child.id) {
                    frontier.push(child.id);
                    out.push(child);
                }
            }
        }
        trace!(root = %root_id, count = out.len(), "subtree loaded");
        Ok(out)
    }

    async fn ancestors(&self, id: NodeId) -> Result<Vec<ThreadNode>, RepoError> {
        ReadStats::bump(&self.stats.node_reads);

        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if !visited.insert(current) {
                return Err(RepoError::Corrupt(format!("parent cycle through {current}")));
            }
            let Some(node) = self.nodes.get(&current).map(|n| n.value().clone()) else {
                break;
            };
            cursor = node.parent_id;
            chain.push(node);
        }
        Ok(chain)
    }

    async fn insert_node(&self, node: &ThreadNode) -> Result<(), RepoError> {
        self.nodes.insert(node.id, node.clone());
        Ok(())
    }

    async fn mark_deleted(&self, id: NodeId) -> Result<bool, RepoError> {
        Ok(match self.nodes.get_mut(&id) {
            Some(mut node) => {
                node.deleted = true;
                true
            }
            None => false,
        })
    }

    async fn list_roots(&self, viewer: Option<UserId>, page: Page) -> Result<Vec<ThreadNode>, RepoError> {
        ReadStats::bump(&self.stats.node_reads);

        let mut roots: Vec<ThreadNode> = self
            .nodes
            .iter()
            .filter(|n| n.is_root() && n.is_live() && n.visible_to(viewer))
            .map(|n| n.value().clone())
            .collect();
        roots.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        Ok(roots
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }
}

#[async_trait]
impl LikeRepository for MemoryStore {
    async fn likes_for(&self, node_ids: &[NodeId]) -> Result<Vec<LikeRecord>, RepoError> {
        ReadStats::bump(&self.stats.like_reads);

        let wanted: HashSet<NodeId> = node_ids.iter().copied().collect();
        Ok(self
            .likes
            .iter()
            .filter(|e| wanted.contains(&e.key().0))
            .map(|e| LikeRecord {
                node_id: e.key().0,
                user_id: e.key().1,
                liked: *e.value(),
            })
            .collect())
    }

    async fn toggle_like(&self, node_id: NodeId, user_id: UserId) -> Result<LikeRecord, RepoError> {
        // The entry guard holds the shard lock, so concurrent toggles on the
        // same key serialize.
        let mut flag = self.likes.entry((node_id, user_id)).or_insert(false);
        *flag = !*flag;
        Ok(LikeRecord {
            node_id,
            user_id,
            liked: *flag,
        })
    }

    async fn count_likes(&self, node_id: NodeId) -> Result<u64, RepoError> {
        Ok(self
            .likes
            .iter()
            .filter(|e| e.key().0 == node_id && *e.value())
            .count() as u64)
    }
}
