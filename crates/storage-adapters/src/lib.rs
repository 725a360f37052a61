//! # storage-adapters
//!
//! Implementations of `ThreadRepository` and `LikeRepository`.
//! The in-memory store is always compiled; Postgres sits behind `db-postgres`.

pub mod memory;

#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use memory::{MemoryStore, ReadStats};

#[cfg(feature = "db-postgres")]
pub use postgres::PgStore;
