//! Shared fixtures for the cross-crate tests in `tests/`.

use async_trait::async_trait;
use client_cache::ThreadBackend;
use domains::{
    AssembledNode, Author, LikeRepository, LikeSummary, NewDiscussion, NodeId, ThreadError,
    ThreadRepository, TombstonePolicy, UserId,
};
use services::{MutationService, ThreadRules, TreeAssembler};
use std::sync::Arc;
use storage_adapters::MemoryStore;
use uuid::Uuid;

pub fn author(name: &str) -> Author {
    Author {
        id: UserId(Uuid::new_v4()),
        name: name.to_string(),
    }
}

/// Services wired to one in-memory store.
pub struct World {
    pub store: Arc<MemoryStore>,
    pub assembler: Arc<TreeAssembler>,
    pub mutations: Arc<MutationService>,
}

impl World {
    pub fn new(tombstones: TombstonePolicy) -> Self {
        let store = Arc::new(MemoryStore::new());
        let threads: Arc<dyn ThreadRepository> = store.clone();
        let likes: Arc<dyn LikeRepository> = store.clone();
        let rules = ThreadRules {
            tombstones,
            ..ThreadRules::default()
        };
        Self {
            assembler: Arc::new(TreeAssembler::new(threads.clone(), likes.clone(), tombstones)),
            mutations: Arc::new(MutationService::new(threads, likes, rules)),
            store,
        }
    }

    pub async fn discussion(&self, by: &Author, title: &str) -> NodeId {
        let input = NewDiscussion {
            title: title.to_string(),
            body: format!("{title}, discuss."),
            ..Default::default()
        };
        match self.mutations.create_discussion(by, input).await {
            Ok(root) => root.id,
            Err(err) => panic!("seeding discussion failed: {err}"),
        }
    }

    pub async fn reply(&self, parent: NodeId, by: &Author, body: &str) -> NodeId {
        match self.mutations.add_node(parent, by, body).await {
            Ok(node) => node.id,
            Err(err) => panic!("seeding reply failed: {err}"),
        }
    }

    /// A backend acting for `user` directly against the services.
    pub fn backend(&self, user: &Author) -> LocalBackend {
        LocalBackend {
            assembler: self.assembler.clone(),
            mutations: self.mutations.clone(),
            user: user.clone(),
        }
    }
}

/// `ThreadBackend` without the HTTP hop.
pub struct LocalBackend {
    assembler: Arc<TreeAssembler>,
    mutations: Arc<MutationService>,
    user: Author,
}

#[async_trait]
impl ThreadBackend for LocalBackend {
    async fn fetch_thread(&self, root_id: NodeId) -> Result<AssembledNode, ThreadError> {
        self.assembler.assemble(root_id, Some(self.user.id)).await
    }

    async fn add_comment(&self, parent_id: NodeId, body: &str) -> Result<AssembledNode, ThreadError> {
        self.mutations.add_node(parent_id, &self.user, body).await
    }

    async fn toggle_like(&self, node_id: NodeId) -> Result<LikeSummary, ThreadError> {
        self.mutations.toggle_like(node_id, self.user.id).await
    }

    async fn delete_node(&self, node_id: NodeId) -> Result<(), ThreadError> {
        self.mutations.soft_delete(node_id, self.user.id).await
    }
}
