//! Shared utilities for stock-data-rs
//!
//! Logging setup shared by the binaries in this workspace.

pub mod logging;

pub use logging::{LogFormat, init_tracing, try_init_tracing};
