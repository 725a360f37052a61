//! Client sessions driven against the real services.

use client_cache::{find, Reconcile, SessionError, ThreadSession, ViewState};
use domains::{ThreadError, TombstonePolicy};
use integration_tests::{author, World};
use std::sync::Arc;

#[tokio::test]
async fn reply_under_c1_reconciles_to_three_nodes() {
    let world = World::new(TombstonePolicy::Prune);
    let user1 = author("user1");
    let user2 = author("user2");
    let root = world.discussion(&user1, "R").await;
    let c1 = world.reply(root, &user1, "C1").await;

    let mut session = ThreadSession::new(world.backend(&user2), root);
    session.load().await.unwrap();
    assert_eq!(session.view().total_count(), 2);
    let before = session.view().tree().unwrap().clone();

    let outcome = session.reply(c1, "nice point").await.unwrap();
    assert_eq!(outcome, Reconcile::Applied);

    let tree = session.view().tree().unwrap();
    let c1_node = find(tree, c1).unwrap();
    assert_eq!(c1_node.reply_count, 1);
    assert_eq!(c1_node.children[0].body, "nice point");
    assert_eq!(c1_node.children[0].parent_id, Some(c1));
    assert_eq!(c1_node.children[0].author_id, user2.id);
    assert_eq!(session.view().total_count(), 3);
    assert!(!Arc::ptr_eq(&before, tree));

    // The reconciled tree matches a fresh assembly.
    let fresh = world.assembler.assemble(root, Some(user2.id)).await.unwrap();
    assert_eq!(**tree, fresh);
}

#[tokio::test]
async fn like_and_delete_reconcile_locally() {
    let world = World::new(TombstonePolicy::Prune);
    let alice = author("alice");
    let bob = author("bob");
    let root = world.discussion(&alice, "Generics").await;
    let keep = world.reply(root, &bob, "monomorphization").await;
    let gone = world.reply(root, &alice, "typo").await;

    let mut session = ThreadSession::new(world.backend(&alice), root);
    session.load().await.unwrap();
    let untouched = find(session.view().tree().unwrap(), keep).map(|n| n as *const _);

    assert_eq!(session.toggle_like(root).await.unwrap(), Reconcile::Applied);
    let tree = session.view().tree().unwrap();
    assert_eq!(tree.like_count, 1);
    assert!(tree.viewer_liked);
    assert_eq!(find(tree, keep).map(|n| n as *const _), untouched);

    assert_eq!(session.delete(gone).await.unwrap(), Reconcile::Applied);
    assert_eq!(session.view().total_count(), 2);

    let fresh = world.assembler.assemble(root, Some(alice.id)).await.unwrap();
    assert_eq!(**session.view().tree().unwrap(), fresh);
}

#[tokio::test]
async fn deleting_a_comment_with_replies_reloads() {
    let world = World::new(TombstonePolicy::Placeholder);
    let alice = author("alice");
    let root = world.discussion(&alice, "Lifetimes").await;
    let c1 = world.reply(root, &alice, "'a").await;
    world.reply(c1, &alice, "'b: 'a").await;

    let mut session = ThreadSession::new(world.backend(&alice), root);
    session.load().await.unwrap();

    assert_eq!(session.delete(c1).await.unwrap(), Reconcile::Stale);
    let tombstone = find(session.view().tree().unwrap(), c1).unwrap();
    assert!(tombstone.deleted);
    assert_eq!(session.view().total_count(), 3);
}

#[tokio::test]
async fn concurrent_delete_makes_reply_fail_until_reload() {
    let world = World::new(TombstonePolicy::Prune);
    let alice = author("alice");
    let bob = author("bob");
    let root = world.discussion(&alice, "Pinning").await;
    let c1 = world.reply(root, &alice, "self-referential").await;

    let mut session = ThreadSession::new(world.backend(&bob), root);
    session.load().await.unwrap();

    // Removed by its author behind the session's back.
    world.mutations.soft_delete(c1, alice.id).await.unwrap();

    let err = session.reply(c1, "too late").await.unwrap_err();
    assert!(matches!(err, SessionError::Thread(ThreadError::NotFound { .. })));
    assert!(matches!(session.view().state(), ViewState::Error { .. }));

    session.load().await.unwrap();
    assert_eq!(session.view().total_count(), 1);
}

#[tokio::test]
async fn unauthorized_delete_leaves_cache_in_error_with_last_tree() {
    let world = World::new(TombstonePolicy::Prune);
    let alice = author("alice");
    let bob = author("bob");
    let root = world.discussion(&alice, "Traits").await;
    let c1 = world.reply(root, &alice, "dyn").await;

    let mut session = ThreadSession::new(world.backend(&bob), root);
    session.load().await.unwrap();

    let err = session.delete(c1).await.unwrap_err();
    assert!(matches!(err, SessionError::Thread(ThreadError::Unauthorized(_))));
    match session.view().state() {
        ViewState::Error { last: Some(tree), .. } => assert_eq!(tree.reply_count, 1),
        other => panic!("unexpected state {other:?}"),
    }
}
