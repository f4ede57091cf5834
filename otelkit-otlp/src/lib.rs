//! OTLP exporter for [`otelkit`].
//!
//! Serializes span and log record snapshots to the OTLP protobuf wire format
//! with a hand-written two-pass encoder and ships them to a collector over
//! HTTP (`POST {endpoint}/v1/traces` and `/v1/logs`,
//! `application/x-protobuf`).
//!
//! ```no_run
//! use otelkit::trace::SdkTracerProvider;
//! use otelkit_otlp::OtlpHttpExporterBuilder;
//!
//! # fn main() -> Result<(), otelkit_otlp::ExporterBuildError> {
//! let exporter = OtlpHttpExporterBuilder::default()
//!     .with_endpoint("http://localhost:4318")
//!     .build_span_exporter()?;
//! let provider = SdkTracerProvider::builder()
//!     .with_batch_exporter(exporter)
//!     .build();
//! let tracer = provider.tracer("app");
//! tracer.start("operation").end();
//! # Ok(())
//! # }
//! ```
//!
//! The HTTP transport is pluggable through the [`HttpClient`] trait; a
//! `reqwest`-backed implementation ships behind the `reqwest-client` feature
//! (on by default).

mod client;
mod exporter;
pub(crate) mod marshal;

pub use client::{HttpClient, HttpError};
pub use exporter::{
    ExporterBuildError, FailedResponse, HttpExportError, OtlpHttpExporterBuilder,
    OtlpHttpLogExporter, OtlpHttpSpanExporter,
};

/// Target to which the exporter sends signals, before per-signal path
/// appending.
pub const OTEL_EXPORTER_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
/// Maximum time the exporter waits for each batch export, in seconds.
pub const OTEL_EXPORTER_OTLP_TIMEOUT: &str = "OTEL_EXPORTER_OTLP_TIMEOUT";
/// Key-value pairs to be used as headers for all requests, `k1=v1,k2=v2`.
pub const OTEL_EXPORTER_OTLP_HEADERS: &str = "OTEL_EXPORTER_OTLP_HEADERS";

/// Per-signal endpoint override for traces.
pub const OTEL_EXPORTER_OTLP_TRACES_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_TRACES_ENDPOINT";
/// Per-signal timeout override for traces, in seconds.
pub const OTEL_EXPORTER_OTLP_TRACES_TIMEOUT: &str = "OTEL_EXPORTER_OTLP_TRACES_TIMEOUT";
/// Per-signal header override for traces.
pub const OTEL_EXPORTER_OTLP_TRACES_HEADERS: &str = "OTEL_EXPORTER_OTLP_TRACES_HEADERS";

/// Per-signal endpoint override for logs.
pub const OTEL_EXPORTER_OTLP_LOGS_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_LOGS_ENDPOINT";
/// Per-signal timeout override for logs, in seconds.
pub const OTEL_EXPORTER_OTLP_LOGS_TIMEOUT: &str = "OTEL_EXPORTER_OTLP_LOGS_TIMEOUT";
/// Per-signal header override for logs.
pub const OTEL_EXPORTER_OTLP_LOGS_HEADERS: &str = "OTEL_EXPORTER_OTLP_LOGS_HEADERS";

/// Default OTLP/HTTP collector endpoint.
pub const OTEL_EXPORTER_OTLP_ENDPOINT_DEFAULT: &str = "http://localhost:4318";
/// Default per-export timeout.
pub const OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT: std::time::Duration =
    std::time::Duration::from_secs(10);
