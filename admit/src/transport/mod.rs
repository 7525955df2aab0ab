//! Transport layer for the limiter.
//!
//! Currently provides HTTP transport via axum.

pub mod http;

pub use http::{ServerConfig, limit_concurrency, routes, serve};
