//! xg2g-config library
//!
//! Layered configuration resolution for the xg2g gateway, exported for the
//! `xg2g-config` binary and for integration tests.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
