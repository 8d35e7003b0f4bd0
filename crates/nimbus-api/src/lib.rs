//! # nimbus-api
//!
//! OCS-style HTTP API for Nimbus built on Axum.
//!
//! Every response is wrapped in the OCS envelope (`{"ocs": {"meta": ..,
//! "data": ..}}`). Callers authenticate with HTTP Basic credentials checked
//! against the account directory.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod ocs;
pub mod router;
pub mod state;

pub use app::{build_app, serve};
pub use error::ApiError;
pub use state::AppState;

#[cfg(test)]
mod tests;
