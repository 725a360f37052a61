//! # Mutation Service
//!
//! Appends replies and roots, flips likes and soft-deletes. Each operation
//! either fully succeeds and returns the new state of exactly one node, or
//! fails without writing.

use crate::validation;
use chrono::Utc;
use domains::{
    AssembledNode, Author, LikeRepository, LikeSummary, NewDiscussion, NodeId, Result,
    ThreadError, ThreadNode, ThreadRepository, TombstonePolicy, UserId,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Limits and policies applied to every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadRules {
    pub max_body_chars: usize,
    pub max_title_chars: usize,
    pub tombstones: TombstonePolicy,
}

impl Default for ThreadRules {
    fn default() -> Self {
        Self {
            max_body_chars: 10_000,
            max_title_chars: 200,
            tombstones: TombstonePolicy::Prune,
        }
    }
}

pub struct MutationService {
    threads: Arc<dyn ThreadRepository>,
    likes: Arc<dyn LikeRepository>,
    rules: ThreadRules,
}

impl MutationService {
    pub fn new(threads: Arc<dyn ThreadRepository>, likes: Arc<dyn LikeRepository>, rules: ThreadRules) -> Self {
        Self {
            threads,
            likes,
            rules,
        }
    }

    pub fn rules(&self) -> ThreadRules {
        self.rules
    }

    /// Appends a reply under `parent_id` and returns it as a childless,
    /// unliked node.
    #[instrument(skip(self, author, body), fields(parent = %parent_id, author = %author.id))]
    pub async fn add_node(&self, parent_id: NodeId, author: &Author, body: &str) -> Result<AssembledNode> {
        let body = validation::text_field("body", body, self.rules.max_body_chars)?;
        self.reachable(parent_id, author.id).await?;

        let node = ThreadNode::reply(parent_id, author, body, Utc::now());
        self.threads.insert_node(&node).await?;
        info!(node = %node.id, "reply added");
        Ok(AssembledNode::leaf(node, LikeSummary::default()))
    }

    /// Authors a new root discussion.
    #[instrument(skip(self, author, input), fields(author = %author.id))]
    pub async fn create_discussion(&self, author: &Author, input: NewDiscussion) -> Result<AssembledNode> {
        let input = validation::discussion(input, self.rules.max_title_chars, self.rules.max_body_chars)?;

        let node = ThreadNode::root(author, input, Utc::now());
        self.threads.insert_node(&node).await?;
        info!(node = %node.id, visibility = node.visibility.as_str(), "discussion created");
        Ok(AssembledNode::leaf(node, LikeSummary::default()))
    }

    /// Flips `user_id`'s like on `node_id`. Two calls restore the original
    /// state.
    #[instrument(skip(self), fields(node = %node_id, user = %user_id))]
    pub async fn toggle_like(&self, node_id: NodeId, user_id: UserId) -> Result<LikeSummary> {
        self.reachable(node_id, user_id).await?;

        let record = self.likes.toggle_like(node_id, user_id).await?;
        let like_count = self.likes.count_likes(node_id).await?;
        info!(liked = record.liked, like_count, "like toggled");
        Ok(LikeSummary {
            like_count,
            viewer_liked: record.liked,
        })
    }

    /// Marks `node_id` deleted. Only its author may do so; replies below it
    /// are left untouched.
    #[instrument(skip(self), fields(node = %node_id, requester = %requester))]
    pub async fn soft_delete(&self, node_id: NodeId, requester: UserId) -> Result<()> {
        let mut chain = self.visible_chain(node_id, requester).await?;
        let node = chain.swap_remove(0);

        if node.author_id != requester {
            warn!(author = %node.author_id, "delete refused for non-author");
            return Err(ThreadError::Unauthorized(
                "only the author may delete this node".to_string(),
            ));
        }

        if !self.threads.mark_deleted(node_id).await? {
            return Err(ThreadError::not_found("node", node_id));
        }
        info!("node soft-deleted");
        Ok(())
    }

    /// Resolves `id` for a write by `user`: it must be live, its root must be
    /// visible to `user`, and under `Prune` no ancestor may be deleted (a
    /// reply there could never be assembled).
    async fn reachable(&self, id: NodeId, user: UserId) -> Result<ThreadNode> {
        let mut chain = self.visible_chain(id, user).await?;

        let path_live = match self.rules.tombstones {
            TombstonePolicy::Prune => chain.iter().all(ThreadNode::is_live),
            TombstonePolicy::Placeholder => true,
        };
        if !path_live {
            return Err(ThreadError::not_found("node", id));
        }
        Ok(chain.swap_remove(0))
    }

    /// The live node `id` followed by its ancestors up to a root `user` may
    /// see. Anything else is `NotFound`, so a private thread looks the same
    /// as a missing one.
    async fn visible_chain(&self, id: NodeId, user: UserId) -> Result<Vec<ThreadNode>> {
        let chain = self.threads.ancestors(id).await?;

        let node_live = chain.first().is_some_and(|n| n.id == id && n.is_live());
        let root_visible = chain.last().is_some_and(|r| r.is_root() && r.visible_to(Some(user)));
        if !(node_live && root_visible) {
            return Err(ThreadError::not_found("node", id));
        }
        Ok(chain)
    }
}
