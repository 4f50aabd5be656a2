//! HTTP API.
//!
//! Exposes the service layer as JSON endpoints under `/api/`, grouped by
//! role prefix and protected by the middleware stack Auth → Audit → Role gate.
//!
//! The router is composable: `api_router()` returns a `Router` that can be
//! mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server_on, ApiServer};
pub use types::ApiContext;
