//! # Tree Assembler
//!
//! Turns the flat, self-referencing relation into a nested thread. The whole
//! subtree and its likes are read in bulk (two reads per thread regardless of
//! size), grouped by parent in memory, and materialized with an explicit work
//! list so thread depth never touches the call stack.

use crate::likes::LikeTally;
use domains::{
    AssembledNode, DiscussionSummary, LikeRepository, NodeId, Page, Result, ThreadError,
    ThreadNode, ThreadRepository, TombstonePolicy, UserId,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Body and author name served in place of a deleted node's content.
pub const TOMBSTONE_TEXT: &str = "[deleted]";

pub struct TreeAssembler {
    threads: Arc<dyn ThreadRepository>,
    likes: Arc<dyn LikeRepository>,
    tombstones: TombstonePolicy,
}

impl TreeAssembler {
    pub fn new(
        threads: Arc<dyn ThreadRepository>,
        likes: Arc<dyn LikeRepository>,
        tombstones: TombstonePolicy,
    ) -> Self {
        Self {
            threads,
            likes,
            tombstones,
        }
    }

    /// Builds the full thread under `root_id` as seen by `viewer`.
    ///
    /// Fails with `NotFound` when the id is missing, deleted, not a root, or
    /// a private root the viewer does not own.
    #[instrument(skip(self), fields(root = %root_id))]
    pub async fn assemble(&self, root_id: NodeId, viewer: Option<UserId>) -> Result<AssembledNode> {
        let root = self
            .threads
            .find_node(root_id)
            .await?
            .filter(|n| n.is_root() && n.is_live() && n.visible_to(viewer))
            .ok_or_else(|| ThreadError::not_found("discussion", root_id))?;

        let descendants = self.threads.load_subtree(root_id).await?;

        let mut ids = Vec::with_capacity(descendants.len() + 1);
        ids.push(root_id);
        ids.extend(descendants.iter().map(|n| n.id));
        let tally = LikeTally::from_records(self.likes.likes_for(&ids).await?, viewer);

        let tree = build_tree(root, descendants, &tally, self.tombstones);
        debug!(fetched = ids.len(), replies = tree.reply_count, "thread assembled");
        Ok(tree)
    }

    /// Roots newest first: public ones plus the viewer's private ones.
    #[instrument(skip(self))]
    pub async fn list_discussions(&self, viewer: Option<UserId>, page: Page) -> Result<Vec<DiscussionSummary>> {
        let roots = self.threads.list_roots(viewer, page).await?;
        let ids: Vec<NodeId> = roots.iter().map(|r| r.id).collect();
        let tally = LikeTally::from_records(self.likes.likes_for(&ids).await?, viewer);

        Ok(roots
            .into_iter()
            .map(|root| {
                let likes = tally.summary(root.id);
                DiscussionSummary {
                    root,
                    like_count: likes.like_count,
                    viewer_liked: likes.viewer_liked,
                }
            })
            .collect())
    }
}

/// Nests `descendants` under `root`.
///
/// Nodes whose parent is not reachable from the root are ignored, as is any
/// record seen twice. Siblings are ordered newest first, ties broken by id.
pub fn build_tree(
    root: ThreadNode,
    descendants: Vec<ThreadNode>,
    tally: &LikeTally,
    tombstones: TombstonePolicy,
) -> AssembledNode {
    let mut by_parent: HashMap<NodeId, Vec<ThreadNode>> = HashMap::new();
    for node in descendants {
        if let Some(parent) = node.parent_id {
            by_parent.entry(parent).or_default().push(node);
        }
    }
    for siblings in by_parent.values_mut() {
        siblings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    }

    // Top-down walk. Every node lands in `order` after its parent.
    let mut child_ids: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut seen: HashSet<NodeId> = HashSet::from([root.id]);
    let mut order: Vec<ThreadNode> = Vec::new();
    let mut expand = vec![root.id];
    while let Some(parent) = expand.pop() {
        let Some(children) = by_parent.remove(&parent) else {
            continue;
        };
        let mut ids = Vec::with_capacity(children.len());
        for child in children {
            if !seen.insert(child.id) {
                continue;
            }
            if child.deleted && tombstones == TombstonePolicy::Prune {
                continue;
            }
            ids.push(child.id);
            expand.push(child.id);
            order.push(child);
        }
        child_ids.insert(parent, ids);
    }

    // Bottom-up completion: walking `order` backwards finishes every child
    // before the parent that adopts it.
    let mut done: HashMap<NodeId, Arc<AssembledNode>> = HashMap::with_capacity(order.len());
    while let Some(node) = order.pop() {
        let children = adopt(&mut child_ids, &mut done, node.id);
        if node.deleted && children.is_empty() {
            continue;
        }
        let id = node.id;
        done.insert(id, Arc::new(materialize(node, children, tally)));
    }

    let children = adopt(&mut child_ids, &mut done, root.id);
    materialize(root, children, tally)
}

fn adopt(
    child_ids: &mut HashMap<NodeId, Vec<NodeId>>,
    done: &mut HashMap<NodeId, Arc<AssembledNode>>,
    parent: NodeId,
) -> Vec<Arc<AssembledNode>> {
    child_ids
        .remove(&parent)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|id| done.remove(&id))
        .collect()
}

fn materialize(node: ThreadNode, children: Vec<Arc<AssembledNode>>, tally: &LikeTally) -> AssembledNode {
    let likes = tally.summary(node.id);
    let deleted = node.deleted;
    let mut assembled = AssembledNode::leaf(node, likes).with_children(children);
    if deleted {
        assembled.title = None;
        assembled.body = TOMBSTONE_TEXT.to_string();
        assembled.author_name = TOMBSTONE_TEXT.to_string();
        assembled.tags.clear();
        assembled.resource_links.clear();
        assembled.like_count = 0;
        assembled.viewer_liked = false;
    }
    assembled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, author, reply, root};
    use domains::{
        LikeRecord, MockLikeRepository, MockThreadRepository, NewDiscussion, RepoError, Visibility,
    };

    fn assembler(
        root_node: ThreadNode,
        descendants: Vec<ThreadNode>,
        likes: Vec<LikeRecord>,
        tombstones: TombstonePolicy,
    ) -> TreeAssembler {
        let mut threads = MockThreadRepository::new();
        threads
            .expect_find_node()
            .returning(move |_| Ok(Some(root_node.clone())));
        threads
            .expect_load_subtree()
            .times(1)
            .returning(move |_| Ok(descendants.clone()));

        let mut like_repo = MockLikeRepository::new();
        like_repo
            .expect_likes_for()
            .times(1)
            .returning(move |_| Ok(likes.clone()));

        TreeAssembler::new(Arc::new(threads), Arc::new(like_repo), tombstones)
    }

    fn ids(node: &AssembledNode) -> Vec<NodeId> {
        node.children.iter().map(|c| c.id).collect()
    }

    #[tokio::test]
    async fn nests_children_newest_first() {
        let alice = author("alice");
        let r = root(&alice);
        let c1 = reply(r.id, &alice, 1);
        let c2 = reply(r.id, &alice, 2);
        let g = reply(c1.id, &alice, 3);

        let tree = assembler(
            r.clone(),
            vec![g.clone(), c1.clone(), c2.clone()],
            vec![],
            TombstonePolicy::Prune,
        )
        .assemble(r.id, None)
        .await
        .unwrap();

        assert_eq!(tree.id, r.id);
        assert_eq!(tree.parent_id, None);
        assert_eq!(ids(&tree), vec![c2.id, c1.id]);
        assert_eq!(tree.reply_count, 2);
        assert_eq!(ids(&tree.children[1]), vec![g.id]);
        assert_eq!(tree.children[1].reply_count, 1);
        assert_eq!(tree.children[0].reply_count, 0);
        assert_eq!(tree.visibility, Some(Visibility::Public));
    }

    #[tokio::test]
    async fn attaches_like_tallies_for_viewer() {
        let alice = author("alice");
        let bob = author("bob");
        let r = root(&alice);
        let c1 = reply(r.id, &bob, 1);
        let likes = vec![
            LikeRecord { node_id: r.id, user_id: bob.id, liked: true },
            LikeRecord { node_id: c1.id, user_id: alice.id, liked: true },
            LikeRecord { node_id: c1.id, user_id: bob.id, liked: false },
        ];

        let tree = assembler(r.clone(), vec![c1], likes, TombstonePolicy::Prune)
            .assemble(r.id, Some(bob.id))
            .await
            .unwrap();

        assert_eq!(tree.like_count, 1);
        assert!(tree.viewer_liked);
        assert_eq!(tree.children[0].like_count, 1);
        assert!(!tree.children[0].viewer_liked);
    }

    #[tokio::test]
    async fn same_state_assembles_identically() {
        let alice = author("alice");
        let r = root(&alice);
        let c1 = reply(r.id, &alice, 5);
        let c2 = reply(r.id, &alice, 5);
        let g = reply(c2.id, &alice, 6);
        let rows = vec![c1, c2, g];

        let a = assembler(r.clone(), rows.clone(), vec![], TombstonePolicy::Prune);
        let mut reversed = rows;
        reversed.reverse();
        let b = assembler(r.clone(), reversed, vec![], TombstonePolicy::Prune);

        let first = a.assemble(r.id, None).await.unwrap();
        let second = b.assemble(r.id, None).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn prune_policy_hides_deleted_subtree() {
        let alice = author("alice");
        let r = root(&alice);
        let mut gone = reply(r.id, &alice, 1);
        gone.deleted = true;
        let under_gone = reply(gone.id, &alice, 2);
        let kept = reply(r.id, &alice, 3);

        let tree = assembler(
            r.clone(),
            vec![gone, under_gone, kept.clone()],
            vec![],
            TombstonePolicy::Prune,
        )
        .assemble(r.id, None)
        .await
        .unwrap();

        assert_eq!(ids(&tree), vec![kept.id]);
        assert_eq!(tree.reply_count, 1);
    }

    #[tokio::test]
    async fn placeholder_policy_keeps_tombstone_with_live_replies() {
        let alice = author("alice");
        let r = root(&alice);
        let mut gone = reply(r.id, &alice, 1);
        gone.deleted = true;
        let under_gone = reply(gone.id, &alice, 2);
        let mut deleted_leaf = reply(r.id, &alice, 3);
        deleted_leaf.deleted = true;
        let likes = vec![LikeRecord { node_id: gone.id, user_id: alice.id, liked: true }];

        let tree = assembler(
            r.clone(),
            vec![gone.clone(), under_gone.clone(), deleted_leaf],
            likes,
            TombstonePolicy::Placeholder,
        )
        .assemble(r.id, None)
        .await
        .unwrap();

        assert_eq!(ids(&tree), vec![gone.id]);
        let tombstone = &tree.children[0];
        assert!(tombstone.deleted);
        assert_eq!(tombstone.body, TOMBSTONE_TEXT);
        assert_eq!(tombstone.author_name, TOMBSTONE_TEXT);
        assert_eq!(tombstone.like_count, 0);
        assert_eq!(ids(tombstone), vec![under_gone.id]);
    }

    #[tokio::test]
    async fn orphans_and_duplicates_are_ignored() {
        let alice = author("alice");
        let r = root(&alice);
        let c1 = reply(r.id, &alice, 1);
        let orphan = reply(NodeId::generate(), &alice, 2);

        let tree = assembler(
            r.clone(),
            vec![c1.clone(), c1.clone(), orphan],
            vec![],
            TombstonePolicy::Prune,
        )
        .assemble(r.id, None)
        .await
        .unwrap();

        assert_eq!(ids(&tree), vec![c1.id]);
    }

    #[tokio::test]
    async fn deep_chain_assembles_iteratively() {
        let alice = author("alice");
        let r = root(&alice);
        let mut chain = Vec::new();
        let mut parent = r.id;
        for i in 0..100_000 {
            let node = reply(parent, &alice, i);
            parent = node.id;
            chain.push(node);
        }

        let tree = assembler(r.clone(), chain, vec![], TombstonePolicy::Prune)
            .assemble(r.id, None)
            .await
            .unwrap();

        let mut depth = 0;
        let mut cursor: &AssembledNode = &tree;
        while let Some(child) = cursor.children.first() {
            depth += 1;
            cursor = child;
        }
        assert_eq!(depth, 100_000);
    }

    #[tokio::test]
    async fn missing_deleted_or_non_root_ids_are_not_found() {
        let alice = author("alice");
        let r = root(&alice);
        let mut deleted_root = root(&alice);
        deleted_root.deleted = true;
        let comment = reply(r.id, &alice, 1);

        for stored in [None, Some(deleted_root), Some(comment)] {
            let mut threads = MockThreadRepository::new();
            threads
                .expect_find_node()
                .returning(move |_| Ok(stored.clone()));
            threads.expect_load_subtree().never();
            let assembler = TreeAssembler::new(
                Arc::new(threads),
                Arc::new(MockLikeRepository::new()),
                TombstonePolicy::Prune,
            );

            let err = assembler.assemble(NodeId::generate(), None).await.unwrap_err();
            assert!(matches!(err, ThreadError::NotFound { .. }));
        }
    }

    #[tokio::test]
    async fn private_root_hidden_from_other_viewers() {
        let alice = author("alice");
        let bob = author("bob");
        let private = ThreadNode::root(
            &alice,
            NewDiscussion {
                title: "draft".into(),
                body: "not yet".into(),
                visibility: Visibility::Private,
                ..Default::default()
            },
            at(0),
        );

        let mut threads = MockThreadRepository::new();
        threads
            .expect_find_node()
            .returning(move |_| Ok(Some(private.clone())));
        let assembler = TreeAssembler::new(
            Arc::new(threads),
            Arc::new(MockLikeRepository::new()),
            TombstonePolicy::Prune,
        );

        let err = assembler.assemble(NodeId::generate(), Some(bob.id)).await.unwrap_err();
        assert!(matches!(err, ThreadError::NotFound { .. }));
    }

    #[tokio::test]
    async fn storage_failures_surface_as_transient() {
        let mut threads = MockThreadRepository::new();
        threads
            .expect_find_node()
            .returning(|_| Err(RepoError::Unavailable("connection reset".into())));
        let assembler = TreeAssembler::new(
            Arc::new(threads),
            Arc::new(MockLikeRepository::new()),
            TombstonePolicy::Prune,
        );

        let err = assembler.assemble(NodeId::generate(), None).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn listing_attaches_like_summaries() {
        let alice = author("alice");
        let r = root(&alice);
        let rid = r.id;

        let mut threads = MockThreadRepository::new();
        threads
            .expect_list_roots()
            .returning(move |_, _| Ok(vec![r.clone()]));
        let mut likes = MockLikeRepository::new();
        likes.expect_likes_for().returning(move |_| {
            Ok(vec![LikeRecord { node_id: rid, user_id: alice.id, liked: true }])
        });
        let assembler = TreeAssembler::new(Arc::new(threads), Arc::new(likes), TombstonePolicy::Prune);

        let listed = assembler.list_discussions(None, Page::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].root.id, rid);
        assert_eq!(listed[0].like_count, 1);
        assert!(!listed[0].viewer_liked);
    }
}
