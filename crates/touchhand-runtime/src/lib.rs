//! `touchhand-runtime` – process-level plumbing.
//!
//! # Modules
//!
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to forward session
//!   lifecycle spans to any OTLP-compatible collector.

pub mod telemetry;

pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
