//! HTTP transport: admission middleware, routes and server.

mod middleware;
mod routes;
mod server;

pub use middleware::{RejectionResponse, limit_concurrency};
pub use routes::{HealthCheckResponse, LimiterHealth, routes};
pub use server::{ServerConfig, serve};
