//! Sharebin HTTP API
//!
//! The axum surface over the share lifecycle: upload, fetch and health routes,
//! bearer-token identity, per-client rate limits, error rendering and process
//! setup.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod setup;
pub mod state;
pub mod telemetry;
