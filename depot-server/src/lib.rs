//! depot-server: HTTP surface over the depot repository
//!
//! Serves item CRUD under `/sample` and a `/health` probe. Handlers only see
//! the [`depot_repo::Repos`] capability set, never the pool.

pub mod http;

pub use http::{build_router, run_server, serve, ApiError, AppState, ServerConfig, ServerError};
