//! HTTP API.
//!
//! Routes are nested under `/api/users` and `/api/doctors` and protected by
//! a middleware stack: Rate Limit → Auth → Role guard → Audit → Handler.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer, ServerError};
pub use types::ApiContext;
