//! # api-adapters
//!
//! HTTP surface of the thread engine: JSON endpoints, a server-rendered
//! thread page, health and Prometheus metrics. The axum router sits behind
//! `web-axum`; the metrics registry, page template and iterative JSON writer
//! are framework-independent.

pub mod html;
pub mod metrics;
pub mod wire;

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod extract;
#[cfg(feature = "web-axum")]
pub mod routes;
#[cfg(feature = "web-axum")]
pub mod state;

pub use html::ThreadPage;
pub use metrics::Metrics;
pub use wire::thread_json;

#[cfg(feature = "web-axum")]
pub use error::HttpError;
#[cfg(feature = "web-axum")]
pub use routes::router;
#[cfg(feature = "web-axum")]
pub use state::AppState;
