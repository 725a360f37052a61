//! Locate-and-replace over the cached tree.
//!
//! All walks use a heap stack. A rewrite copies only the nodes on the path
//! from the root to the target; everything else is shared with the input.

use domains::{AssembledNode, LikeSummary, NodeId};
use std::sync::Arc;

pub type Tree = Arc<AssembledNode>;

/// Child-index path from the root to the node with `id`.
/// `Some(vec![])` means the root itself.
pub fn locate(tree: &AssembledNode, id: NodeId) -> Option<Vec<usize>> {
    if tree.id == id {
        return Some(Vec::new());
    }
    let mut path: Vec<usize> = Vec::new();
    let mut stack: Vec<(&AssembledNode, usize, usize)> = tree
        .children
        .iter()
        .enumerate()
        .rev()
        .map(|(i, c)| (c.as_ref(), 1, i))
        .collect();

    while let Some((node, depth, index)) = stack.pop() {
        path.truncate(depth - 1);
        path.push(index);
        if node.id == id {
            return Some(path);
        }
        stack.extend(
            node.children
                .iter()
                .enumerate()
                .rev()
                .map(|(i, c)| (c.as_ref(), depth + 1, i)),
        );
    }
    None
}

/// The node with `id`, if present.
pub fn find(tree: &AssembledNode, id: NodeId) -> Option<&AssembledNode> {
    tree.depth_first().map(|(_, n)| n).find(|n| n.id == id)
}

/// Copies the nodes along `path`, applies `edit` to the copy of the last one,
/// and returns the new root.
fn rewrite(tree: &Tree, path: &[usize], edit: impl FnOnce(&mut AssembledNode)) -> Tree {
    let mut ancestors: Vec<&Tree> = Vec::with_capacity(path.len());
    let mut cursor = tree;
    for &index in path {
        ancestors.push(cursor);
        cursor = &cursor.children[index];
    }

    let mut target = AssembledNode::clone(cursor);
    edit(&mut target);

    let mut current = Arc::new(target);
    for (ancestor, &index) in ancestors.iter().rev().zip(path.iter().rev()) {
        let mut copy = AssembledNode::clone(ancestor);
        copy.children[index] = current;
        current = Arc::new(copy);
    }
    current
}

/// Prepends `new_node` to the children of `parent_id` and bumps its reply
/// count. `None` when the parent is not in the cache; the caller must
/// re-assemble.
pub fn apply_new_reply(tree: &Tree, parent_id: NodeId, new_node: Tree) -> Option<Tree> {
    let path = locate(tree, parent_id)?;
    Some(rewrite(tree, &path, |parent| {
        parent.children.insert(0, new_node);
        parent.reply_count += 1;
    }))
}

/// Replaces only `like_count` and `viewer_liked` on `node_id`.
pub fn apply_like_toggle(tree: &Tree, node_id: NodeId, result: LikeSummary) -> Option<Tree> {
    let path = locate(tree, node_id)?;
    Some(rewrite(tree, &path, |node| {
        node.like_count = result.like_count;
        node.viewer_liked = result.viewer_liked;
    }))
}

/// Detaches `node_id` and its subtree from its parent. `None` when the node
/// is missing or is the root.
pub fn apply_removal(tree: &Tree, node_id: NodeId) -> Option<Tree> {
    let path = locate(tree, node_id)?;
    let (&index, parent_path) = path.split_last()?;
    Some(rewrite(tree, parent_path, |parent| {
        parent.children.remove(index);
        parent.reply_count = parent.reply_count.saturating_sub(1);
    }))
}

/// Thread-wide node count, root included. This backs the "Comments (N)"
/// badge; `reply_count` is per-parent and must not be used for it.
pub fn recompute_total_count(tree: &AssembledNode) -> u64 {
    tree.depth_first().count() as u64
}
