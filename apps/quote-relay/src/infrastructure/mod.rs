//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, plus the HTTP surface.

/// Simulated advice generator.
pub mod advice;

/// Configuration loading.
pub mod config;

/// Health check and metrics routes.
pub mod health;

/// HTTP router and server.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Report store adapters.
pub mod persistence;

/// Logging and OpenTelemetry tracing integration.
pub mod telemetry;

/// Quote provider adapters.
pub mod upstream;
