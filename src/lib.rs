//! Community logo poll run on GitHub issues: collect and deduplicate
//! submissions, publish the gallery, then validate votes and publish ranked
//! results.

pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod services;

pub use config::PollConfig;
pub use context::RunContext;
pub use error::{PollError, Result};
