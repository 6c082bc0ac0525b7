//! Command-line front end for sweeper.
//!
//! The binary in `main.rs` only parses arguments, sets up tracing and maps
//! errors to exit codes. Everything else lives here so it can be tested.

pub mod cli;
pub mod commands;
pub mod tracing;
