//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Request validation errors.
pub mod error;

/// Port interfaces for external systems (quote provider, report store, advice).
pub mod ports;

/// Application services for caching, push subscriptions and advice.
pub mod services;
