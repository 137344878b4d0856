//! Remedy daemon library.
//!
//! Hosts the operator surface for the recovery engine:
//! - REST API for breaker inspection/reset and playbook listing
//! - Recovery submission endpoint for upstream classifiers
//! - Server lifecycle management

pub mod api;
pub mod config;
pub mod error;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError};
pub use server::Server;
