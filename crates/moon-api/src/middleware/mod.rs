//! # Middleware Stack
//!
//! - [`tracing_layer`]: request/response tracing with `TraceLayer`.
//! - [`metrics`]: Prometheus request metrics through the `metrics` facade.

pub mod metrics;
pub mod tracing_layer;
