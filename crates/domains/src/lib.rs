//! crates/domains/src/lib.rs
//!
//! Data contracts, error taxonomy and port traits for the discussion engine.
//! Nothing in here performs I/O; adapters implement the ports.

pub mod errors;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use errors::*;
pub use models::*;
pub use ports::*;
