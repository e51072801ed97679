//! IRDP Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the IRDP workspace.
//!
//! # Overview
//!
//! This crate provides functionality used across all workspace members:
//!
//! - **Error Handling**: the workspace error enum and result alias
//! - **Fingerprinting**: streaming content digests for artifact files
//! - **Logging**: tracing subscriber setup (console/file, text/JSON)
//! - **Types**: shared domain types (documents, facts, pages, macro points)

pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{IrdpError, Result};
