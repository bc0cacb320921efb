//! highway_server: axum boundary for the admin console: config, logging,
//! JWT authentication, the enforcement middleware, handlers and the process
//! lifecycle.

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod logging;
pub mod middleware;
pub mod monitor;
pub mod router;
