//! # client-cache
//!
//! The presentation-side copy of an assembled thread. Mutation results are
//! spliced into the cached tree by path copying, so every subtree the change
//! did not touch keeps its `Arc` identity and a renderer can skip it.

pub mod reconcile;
pub mod session;
pub mod view;

pub use reconcile::{
    apply_like_toggle, apply_new_reply, apply_removal, find, locate, recompute_total_count, Tree,
};
pub use session::{SessionError, ThreadBackend, ThreadSession};
pub use view::{MutationResult, Pending, Reconcile, ThreadView, TransitionError, ViewState};
