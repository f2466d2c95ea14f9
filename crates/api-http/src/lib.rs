// REST surface over the Controller and Key-Value Store ports
//. `handler`/`server`/`state` implement the axum
// server side; `client` holds the reqwest-based `HttpController` and
// `HttpKvStore` adapters that let one daemon proxy to another over the
// same contract.

pub mod client;
mod error;
mod handler;
mod rate_limiter;
mod server;
mod state;
mod types;

pub use client::{HttpController, HttpKvStore};
pub use error::ApiError;
pub use server::{build_router, controller_router, kv_router, HttpServer, HttpServerConfig};
