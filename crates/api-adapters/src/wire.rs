//! JSON encoding of an assembled thread.
//!
//! The wire shape nests children inside their parent, but the derived
//! `Serialize` impl recurses once per level. This writer emits the same
//! document from an explicit stack so thread depth never reaches the call
//! stack.

use chrono::{DateTime, Utc};
use domains::{AssembledNode, NodeId, UserId, Visibility};
use serde::Serialize;

/// Every field of an `AssembledNode` except `children`, with the same names
/// and omission rules as the derived impl.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeFields<'a> {
    id: NodeId,
    parent_id: Option<NodeId>,
    author_id: UserId,
    author_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    body: &'a str,
    created_at: &'a DateTime<Utc>,
    #[serde(skip_serializing_if = "is_empty")]
    tags: &'a [String],
    #[serde(skip_serializing_if = "is_empty")]
    resource_links: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    visibility: Option<Visibility>,
    deleted: bool,
    like_count: u64,
    viewer_liked: bool,
    reply_count: u64,
}

fn is_empty(items: &&[String]) -> bool {
    items.is_empty()
}

impl<'a> From<&'a AssembledNode> for NodeFields<'a> {
    fn from(node: &'a AssembledNode) -> Self {
        Self {
            id: node.id,
            parent_id: node.parent_id,
            author_id: node.author_id,
            author_name: &node.author_name,
            title: node.title.as_deref(),
            body: &node.body,
            created_at: &node.created_at,
            tags: &node.tags,
            resource_links: &node.resource_links,
            visibility: node.visibility,
            deleted: node.deleted,
            like_count: node.like_count,
            viewer_liked: node.viewer_liked,
            reply_count: node.reply_count,
        }
    }
}

enum Step<'a> {
    Open { node: &'a AssembledNode, first: bool },
    Close,
}

/// Serializes `tree` to the nested JSON document.
pub fn thread_json(tree: &AssembledNode) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(256);
    let mut stack = vec![Step::Open { node: tree, first: true }];

    while let Some(step) = stack.pop() {
        match step {
            Step::Open { node, first } => {
                if !first {
                    out.push(b',');
                }
                serde_json::to_writer(&mut out, &NodeFields::from(node))?;
                // Reopen the object to append the children array.
                out.pop();
                out.extend_from_slice(br#","children":["#);

                stack.push(Step::Close);
                stack.extend(
                    node.children
                        .iter()
                        .enumerate()
                        .rev()
                        .map(|(i, c)| Step::Open { node: c, first: i == 0 }),
                );
            }
            Step::Close => out.extend_from_slice(b"]}"),
        }
    }
    Ok(out)
}
