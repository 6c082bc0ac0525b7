//! Retention policy engines for build caches and container registries.
//!
//! The engines in [`cache`] and [`registry`] are pure functions over a
//! fetched snapshot. The runners in [`prune`] fetch that snapshot through
//! the [`gateway`] traits, evaluate it and execute the deletions.

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod gateway;
pub mod prune;
pub mod registry;
pub mod report;
pub mod verdict;

pub use error::{Error, Result};
