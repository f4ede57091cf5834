//! Telemetry data model and SDK.
//!
//! This crate implements the record lifecycle and export pipeline for trace
//! spans and log records: mutable records accumulate fields, freeze into
//! immutable snapshots exactly once, and flow through a chain of processors
//! to pluggable exporters.
//!
//! ## Getting started
//!
//! ```
//! use otelkit::logs::{SdkLoggerProvider, InMemoryLogExporter};
//! use otelkit::logs::Severity;
//!
//! let exporter = InMemoryLogExporter::default();
//! let provider = SdkLoggerProvider::builder()
//!     .with_simple_exporter(exporter.clone())
//!     .build();
//!
//! let logger = provider.logger("example");
//! let mut record = logger.create_log_record();
//! record.set_severity_number(Severity::Info);
//! record.set_body("something happened".into());
//! logger.emit(record);
//!
//! assert_eq!(exporter.get_emitted_logs().unwrap().len(), 1);
//! ```
//!
//! Records are never a source of errors for the instrumented application:
//! setters on a finished record are silent no-ops and export failures are
//! reported through [`CompletableResultCode`]s and internal logs, never
//! panics.
//!
//! [`CompletableResultCode`]: crate::CompletableResultCode

pub(crate) mod attributes;
mod common;
mod completion;
pub mod context;
pub mod error;
pub mod logs;
pub mod resource;
pub mod time;
pub mod trace;

#[macro_use]
mod macros;

pub use attributes::AttributesMap;
pub use common::{AnyValue, Array, InstrumentationScope, InstrumentationScopeBuilder};
pub use common::{Key, KeyValue, StringValue, Value};
pub use completion::CompletableResultCode;
pub use context::{Context, ContextGuard};
pub use resource::Resource;

#[doc(hidden)]
#[cfg(feature = "internal-logs")]
pub mod _private {
    pub use tracing::{debug, error, info, warn};
}
