//! HTTP API layer for agora.
//!
//! This crate provides the JSON API over the engagement engine:
//!
//! - **Endpoints**: users, posts, votes, listings
//! - **Extractors**: bearer-token authentication
//! - **Middleware**: auth, tracing, CORS, body limits
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::{app, router};
pub use middleware::AppState;
