//! # Ports
//!
//! Contracts the services depend on. Adapters implement them; tests use the
//! `MockXxx` types generated here.

use crate::errors::{AuthError, RepoError};
use crate::models::{Author, LikeRecord, NodeId, Page, ThreadNode, UserId};
use async_trait::async_trait;

/// Persistence contract for the flat discussion relation.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ThreadRepository: Send + Sync {
    /// Fetches one record, deleted or not.
    async fn find_node(&self, id: NodeId) -> Result<Option<ThreadNode>, RepoError>;

    /// Every descendant of `root_id` (root excluded, deleted rows included) in
    /// a single read. Implementations must not issue one query per level.
    async fn load_subtree(&self, root_id: NodeId) -> Result<Vec<ThreadNode>, RepoError>;

    /// `id` followed by each of its ancestors up to the root, in one read.
    /// Empty when `id` does not exist.
    async fn ancestors(&self, id: NodeId) -> Result<Vec<ThreadNode>, RepoError>;

    async fn insert_node(&self, node: &ThreadNode) -> Result<(), RepoError>;

    /// Sets `deleted`. Returns false when no row matched.
    async fn mark_deleted(&self, id: NodeId) -> Result<bool, RepoError>;

    /// Live roots newest first, public ones plus `viewer`'s private ones.
    async fn list_roots(&self, viewer: Option<UserId>, page: Page) -> Result<Vec<ThreadNode>, RepoError>;
}

/// Persistence contract for the like relation.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait LikeRepository: Send + Sync {
    /// All like rows (either flag value) for the given nodes, in one read.
    async fn likes_for(&self, node_ids: &[NodeId]) -> Result<Vec<LikeRecord>, RepoError>;

    /// Atomically flips the row for (`node_id`, `user_id`), creating it as
    /// liked if absent. Returns the row after the flip.
    async fn toggle_like(&self, node_id: NodeId, user_id: UserId) -> Result<LikeRecord, RepoError>;

    /// Number of rows with `liked = true` for `node_id`.
    async fn count_likes(&self, node_id: NodeId) -> Result<u64, RepoError>;
}

/// Identity contract: turns a bearer credential into an author.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<Author, AuthError>;
}
