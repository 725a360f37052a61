//! Drives a [`ThreadView`] against a backend speaking the four thread
//! endpoints.

use crate::view::{MutationResult, Pending, Reconcile, ThreadView, TransitionError};
use async_trait::async_trait;
use domains::{AssembledNode, LikeSummary, NodeId, ThreadError};
use thiserror::Error;
use tracing::{debug, instrument};

/// Remote side of a thread view: an HTTP client, or the services directly.
#[async_trait]
pub trait ThreadBackend: Send + Sync {
    async fn fetch_thread(&self, root_id: NodeId) -> Result<AssembledNode, ThreadError>;

    async fn add_comment(&self, parent_id: NodeId, body: &str) -> Result<AssembledNode, ThreadError>;

    async fn toggle_like(&self, node_id: NodeId) -> Result<LikeSummary, ThreadError>;

    async fn delete_node(&self, node_id: NodeId) -> Result<(), ThreadError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Thread(#[from] ThreadError),
}

pub struct ThreadSession<B> {
    backend: B,
    view: ThreadView,
}

impl<B: ThreadBackend> ThreadSession<B> {
    pub fn new(backend: B, root_id: NodeId) -> Self {
        Self {
            backend,
            view: ThreadView::new(root_id),
        }
    }

    pub fn view(&self) -> &ThreadView {
        &self.view
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Fetches the whole thread. Also the way out of the error state.
    #[instrument(skip(self), fields(root = %self.view.root_id()))]
    pub async fn load(&mut self) -> Result<(), SessionError> {
        self.view.begin_load()?;
        let outcome = self.backend.fetch_thread(self.view.root_id()).await;
        let failure = outcome.as_ref().err().cloned();
        self.view.finish_load(outcome)?;
        match failure {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Posts a reply and splices it under `parent_id`.
    pub async fn reply(&mut self, parent_id: NodeId, body: &str) -> Result<Reconcile, SessionError> {
        self.view.begin_mutation(Pending::Reply { parent_id })?;
        let outcome = self
            .backend
            .add_comment(parent_id, body)
            .await
            .map(MutationResult::Reply);
        self.settle(outcome).await
    }

    pub async fn toggle_like(&mut self, node_id: NodeId) -> Result<Reconcile, SessionError> {
        self.view.begin_mutation(Pending::Like { node_id })?;
        let outcome = self
            .backend
            .toggle_like(node_id)
            .await
            .map(|summary| MutationResult::Like { node_id, summary });
        self.settle(outcome).await
    }

    pub async fn delete(&mut self, node_id: NodeId) -> Result<Reconcile, SessionError> {
        self.view.begin_mutation(Pending::Delete { node_id })?;
        let outcome = self
            .backend
            .delete_node(node_id)
            .await
            .map(|()| MutationResult::Deleted { node_id });
        self.settle(outcome).await
    }

    /// Applies a mutation outcome; a stale cache triggers one reload.
    async fn settle(&mut self, outcome: Result<MutationResult, ThreadError>) -> Result<Reconcile, SessionError> {
        match self.view.finish_mutation(outcome)? {
            Reconcile::Stale => {
                debug!("cache stale after mutation, reloading");
                self.load().await?;
                Ok(Reconcile::Stale)
            }
            Reconcile::Failed(err) => Err(err.into()),
            other => Ok(other),
        }
    }
}
