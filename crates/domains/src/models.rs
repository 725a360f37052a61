//! # Domain Models
//!
//! The stored record (`ThreadNode`), the like relation (`LikeRecord`) and the
//! nested, derived view (`AssembledNode`) exchanged with the presentation layer.
//! Identifiers are UUID v7 so that id order follows creation order.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Identifier of a discussion or comment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Allocates a fresh, time-ordered id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Reads a parent reference. Older records mark roots with `0` (number or
/// string) or the nil UUID instead of leaving the field out.
fn parent_ref<'de, D: Deserializer<'de>>(de: D) -> Result<Option<NodeId>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(de)? {
        None | Some(Raw::Number(0)) => Ok(None),
        Some(Raw::Number(n)) => Err(D::Error::custom(format!("invalid parent id {n}"))),
        Some(Raw::Text(text)) if text.trim() == "0" => Ok(None),
        Some(Raw::Text(text)) => {
            let id = Uuid::parse_str(text.trim()).map_err(D::Error::custom)?;
            Ok((!id.is_nil()).then_some(NodeId(id)))
        }
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identifier of a user, issued by the external identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    pub name: String,
}

/// Who may read a root discussion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(format!("unknown visibility '{other}'")),
        }
    }
}

/// The flat stored record. Roots have no `parent_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadNode {
    pub id: NodeId,
    #[serde(default, deserialize_with = "parent_ref")]
    pub parent_id: Option<NodeId>,
    pub author_id: UserId,
    pub author_name: String,
    /// Only set on roots.
    pub title: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    /// Only meaningful on roots.
    pub tags: Vec<String>,
    /// Only meaningful on roots.
    pub resource_links: Vec<String>,
    /// Only meaningful on roots.
    pub visibility: Visibility,
    pub deleted: bool,
}

impl ThreadNode {
    /// Builds a reply record under `parent_id`.
    pub fn reply(parent_id: NodeId, author: &Author, body: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: NodeId::generate(),
            parent_id: Some(parent_id),
            author_id: author.id,
            author_name: author.name.clone(),
            title: None,
            body,
            created_at,
            tags: Vec::new(),
            resource_links: Vec::new(),
            visibility: Visibility::Public,
            deleted: false,
        }
    }

    /// Builds a root discussion record.
    pub fn root(author: &Author, discussion: NewDiscussion, created_at: DateTime<Utc>) -> Self {
        Self {
            id: NodeId::generate(),
            parent_id: None,
            author_id: author.id,
            author_name: author.name.clone(),
            title: Some(discussion.title),
            body: discussion.body,
            created_at,
            tags: discussion.tags,
            resource_links: discussion.resource_links,
            visibility: discussion.visibility,
            deleted: false,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_live(&self) -> bool {
        !self.deleted
    }

    /// Whether `viewer` may read this root. Replies inherit their root's rule.
    pub fn visible_to(&self, viewer: Option<UserId>) -> bool {
        match self.visibility {
            Visibility::Public => true,
            Visibility::Private => viewer == Some(self.author_id),
        }
    }
}

/// What assembly does with a soft-deleted node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TombstonePolicy {
    /// Drop the node and everything below it.
    #[default]
    Prune,
    /// Keep a scrubbed placeholder while it still has visible replies.
    Placeholder,
}

/// Joins a list into its comma-separated storage form.
pub fn join_list(items: &[String]) -> String {
    items.join(",")
}

/// Splits a comma-separated storage column, dropping empty entries.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// One row of the like relation. `liked` is flipped in place, never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeRecord {
    pub node_id: NodeId,
    pub user_id: UserId,
    pub liked: bool,
}

/// Like tally of one node as seen by one viewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeSummary {
    pub like_count: u64,
    pub viewer_liked: bool,
}

/// Input for authoring a root discussion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDiscussion {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub resource_links: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
}

/// Offset pagination for root listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    /// Clamps `limit` into `1..=MAX_LIMIT`.
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// A root discussion in a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionSummary {
    #[serde(flatten)]
    pub root: ThreadNode,
    pub like_count: u64,
    pub viewer_liked: bool,
}

/// A node of the nested thread tree.
///
/// Children sit behind `Arc` so an updated tree can share every untouched
/// subtree with the previous one; `Arc::ptr_eq` tells a renderer what it can
/// skip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledNode {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub author_id: UserId,
    pub author_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_links: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub deleted: bool,
    pub like_count: u64,
    pub viewer_liked: bool,
    /// Direct children only, never the whole subtree.
    pub reply_count: u64,
    /// Newest first.
    pub children: Vec<Arc<AssembledNode>>,
}

impl AssembledNode {
    /// A node with no children attached yet.
    pub fn leaf(node: ThreadNode, likes: LikeSummary) -> Self {
        let visibility = node.is_root().then_some(node.visibility);
        Self {
            id: node.id,
            parent_id: node.parent_id,
            author_id: node.author_id,
            author_name: node.author_name,
            title: node.title,
            body: node.body,
            created_at: node.created_at,
            tags: node.tags,
            resource_links: node.resource_links,
            visibility,
            deleted: node.deleted,
            like_count: likes.like_count,
            viewer_liked: likes.viewer_liked,
            reply_count: 0,
            children: Vec::new(),
        }
    }

    /// Replaces `children` and keeps `reply_count` in step with it.
    pub fn with_children(mut self, children: Vec<Arc<AssembledNode>>) -> Self {
        self.reply_count = children.len() as u64;
        self.children = children;
        self
    }

    pub fn likes(&self) -> LikeSummary {
        LikeSummary {
            like_count: self.like_count,
            viewer_liked: self.viewer_liked,
        }
    }

    /// Pre-order walk yielding `(depth, node)`, root at depth 0, siblings in
    /// stored order.
    pub fn depth_first(&self) -> DepthFirst<'_> {
        DepthFirst { stack: vec![(0, self)] }
    }
}

/// Iterator returned by [`AssembledNode::depth_first`]. Uses a heap stack.
pub struct DepthFirst<'a> {
    stack: Vec<(usize, &'a AssembledNode)>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (usize, &'a AssembledNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|c| (depth + 1, c.as_ref())));
        Some((depth, node))
    }
}

// Thread depth is user-controlled; the default drop glue would recurse once
// per level. Unlinking children onto a heap stack keeps teardown flat.
impl Drop for AssembledNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(child) = pending.pop() {
            if let Ok(mut node) = Arc::try_unwrap(child) {
                pending.append(&mut node.children);
            }
        }
    }
}
