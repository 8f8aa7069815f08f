//! Domain Layer - Core quote and subscription types.
//!
//! This layer contains the core domain types for quote distribution with no
//! I/O. All types here are pure Rust with serialization support.

/// Symbols, quotes and cache keys.
pub mod quote;

/// Open push subscription tracking.
pub mod subscription;

/// Portfolio snapshots and advice reports.
pub mod advice;
