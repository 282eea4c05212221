//! Core types and utilities for hitch
//!
//! This is the foundation crate (Layer 0) that all other hitch crates depend on.
//! It provides:
//! - The error taxonomy shared by the loader, resolver and executor
//! - Platform detection
//!
//! This crate has no dependencies on other hitch crates.

pub mod error;
pub mod platform;

pub use error::{Error, Result};
