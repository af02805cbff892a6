//! Common types and utilities for the givens binding resolver.
//!
//! This crate provides foundational types used across all givens crates:
//! - Resolver limits and thresholds
//! - Coded, serializable diagnostics for reporting resolution failures

// Centralized limits and thresholds
pub mod limits;

// Diagnostic types and the coded message table
pub mod diagnostics;
pub use diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticRelatedInformation};
