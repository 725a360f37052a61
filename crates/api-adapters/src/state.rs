//! Shared handler state.

use crate::metrics::Metrics;
use domains::IdentityProvider;
use services::{MutationService, TreeAssembler};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub assembler: Arc<TreeAssembler>,
    pub mutations: Arc<MutationService>,
    pub identity: Arc<dyn IdentityProvider>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        assembler: Arc<TreeAssembler>,
        mutations: Arc<MutationService>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            assembler,
            mutations,
            identity,
            metrics: Metrics::new(),
        }
    }
}
