//! # Thread View
//!
//! One displayed thread: `Unloaded -> Loading -> Loaded <-> Mutating`.
//! Failures while loading or mutating park the view in `Error`, from which
//! only a reload leads out.

use crate::reconcile::{self, Tree};
use domains::{AssembledNode, LikeSummary, NodeId, ThreadError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// The mutation currently awaiting its server round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    Reply { parent_id: NodeId },
    Like { node_id: NodeId },
    Delete { node_id: NodeId },
}

/// Successful server response to a [`Pending`] mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationResult {
    Reply(AssembledNode),
    Like { node_id: NodeId, summary: LikeSummary },
    Deleted { node_id: NodeId },
}

#[derive(Debug, Clone)]
pub enum ViewState {
    Unloaded,
    Loading,
    Loaded(Tree),
    Mutating { tree: Tree, pending: Pending },
    /// `last` is the tree shown before the failure, kept for display.
    Error { error: ThreadError, last: Option<Tree> },
}

/// What `finish_mutation` did with the server's answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconcile {
    /// Spliced into the cached tree.
    Applied,
    /// The cache no longer holds the target; re-assemble to catch up.
    Stale,
    /// The root itself was deleted; the view is `Unloaded` again.
    ThreadGone,
    Failed(ThreadError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("a mutation is already in flight")]
    Busy,

    #[error("thread is not loaded")]
    NotLoaded,

    #[error("no load in progress")]
    NotLoading,

    #[error("no mutation in flight")]
    Idle,
}

#[derive(Debug)]
pub struct ThreadView {
    root_id: NodeId,
    state: ViewState,
    total: u64,
}

impl ThreadView {
    pub fn new(root_id: NodeId) -> Self {
        Self {
            root_id,
            state: ViewState::Unloaded,
            total: 0,
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.root_id
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// The tree currently on screen, if any.
    pub fn tree(&self) -> Option<&Tree> {
        match &self.state {
            ViewState::Loaded(tree) | ViewState::Mutating { tree, .. } => Some(tree),
            ViewState::Error { last, .. } => last.as_ref(),
            ViewState::Unloaded | ViewState::Loading => None,
        }
    }

    /// Thread-wide node count of the displayed tree.
    pub fn total_count(&self) -> u64 {
        self.total
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, ViewState::Loading | ViewState::Mutating { .. })
    }

    /// Starts a (re)load. Refused while a request is outstanding.
    pub fn begin_load(&mut self) -> Result<(), TransitionError> {
        match self.state {
            ViewState::Loading | ViewState::Mutating { .. } => Err(TransitionError::Busy),
            _ => {
                self.state = ViewState::Loading;
                Ok(())
            }
        }
    }

    pub fn finish_load(&mut self, outcome: Result<AssembledNode, ThreadError>) -> Result<(), TransitionError> {
        if !matches!(self.state, ViewState::Loading) {
            return Err(TransitionError::NotLoading);
        }
        match outcome {
            Ok(tree) => self.show(Arc::new(tree)),
            Err(error) => {
                warn!(root = %self.root_id, code = error.code(), "thread load failed");
                self.total = 0;
                self.state = ViewState::Error { error, last: None };
            }
        }
        Ok(())
    }

    /// Records `pending` as in flight. Only one mutation may be outstanding.
    pub fn begin_mutation(&mut self, pending: Pending) -> Result<(), TransitionError> {
        let tree = match &self.state {
            ViewState::Loaded(tree) => tree.clone(),
            ViewState::Mutating { .. } | ViewState::Loading => return Err(TransitionError::Busy),
            ViewState::Unloaded | ViewState::Error { .. } => return Err(TransitionError::NotLoaded),
        };
        self.state = ViewState::Mutating { tree, pending };
        Ok(())
    }

    /// Applies the server's answer to the in-flight mutation.
    pub fn finish_mutation(
        &mut self,
        outcome: Result<MutationResult, ThreadError>,
    ) -> Result<Reconcile, TransitionError> {
        let tree = match &self.state {
            ViewState::Mutating { tree, .. } => tree.clone(),
            _ => return Err(TransitionError::Idle),
        };

        let result = match outcome {
            Ok(result) => result,
            Err(error) => {
                warn!(root = %self.root_id, code = error.code(), "mutation failed");
                self.state = ViewState::Error {
                    error: error.clone(),
                    last: Some(tree),
                };
                return Ok(Reconcile::Failed(error));
            }
        };

        let updated = match result {
            MutationResult::Reply(node) => match node.parent_id {
                Some(parent_id) => reconcile::apply_new_reply(&tree, parent_id, Arc::new(node)),
                None => None,
            },
            MutationResult::Like { node_id, summary } => {
                reconcile::apply_like_toggle(&tree, node_id, summary)
            }
            MutationResult::Deleted { node_id } if node_id == tree.id => {
                debug!(root = %self.root_id, "root deleted");
                self.total = 0;
                self.state = ViewState::Unloaded;
                return Ok(Reconcile::ThreadGone);
            }
            // A deleted node with replies is pruned or tombstoned depending on
            // server policy; only a reload shows which.
            MutationResult::Deleted { node_id } => match reconcile::find(&tree, node_id) {
                Some(node) if node.children.is_empty() => reconcile::apply_removal(&tree, node_id),
                _ => None,
            },
        };

        match updated {
            Some(next) => {
                self.show(next);
                Ok(Reconcile::Applied)
            }
            None => {
                debug!(root = %self.root_id, "mutation target not cached");
                self.state = ViewState::Loaded(tree);
                Ok(Reconcile::Stale)
            }
        }
    }

    fn show(&mut self, tree: Tree) {
        self.total = reconcile::recompute_total_count(&tree);
        self.state = ViewState::Loaded(tree);
    }
}
