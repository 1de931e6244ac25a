//! # tally-api
//!
//! HTTP composition layer for the Tally order queue.
//!
//! This crate wires the queue from `tally-queue` to a ledger store and
//! exposes it over HTTP. It holds no allocation or merge policy of its own.
//!
//! ## Endpoints
//!
//! ```text
//!   POST /submit-form   - Record an order, returns its ticket
//!   GET  /combine       - Run one merge of the two ledgers
//!   GET  /form-success  - Confirmation for the latest submission (session)
//!   GET  /health        - Liveness check
//!   GET  /ready         - Readiness check with merge statistics
//!   GET  /metrics       - Prometheus metrics
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use tally_api::config::Config;
//! use tally_api::server::Server;
//!
//! let server = Server::new(Config::from_env()?);
//! server.serve().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod session;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{ApiError, ApiResult};
    pub use crate::server::{AppState, Server};
}
