//! Log record creation, processing and export.
//!
//! A [`SdkLoggerProvider`] owns the shared state (clock, resource, limits,
//! processor chain) for every [`SdkLogger`] it hands out. Loggers create
//! mutable [`SdkLogRecord`]s; [`SdkLogger::emit`] freezes a record into the
//! pipeline: timestamps are defaulted, the active span context is captured,
//! and the record is passed through the processor chain, which converts it to
//! an immutable [`LogRecordData`] snapshot for the configured exporters.

mod batch_log_processor;
mod config;
mod console_exporter;
mod export;
mod in_memory_exporter;
mod log_processor;
mod logger;
mod logger_provider;
mod record;
mod simple_log_processor;

pub use batch_log_processor::{BatchConfig, BatchConfigBuilder, BatchLogProcessor};
pub use config::{LogRecordLimits, LogRecordLimitsBuilder};
pub use console_exporter::ConsoleLogRecordExporter;
pub use export::LogExporter;
pub use in_memory_exporter::{InMemoryLogExporter, InMemoryLogExporterBuilder};
pub use log_processor::{LogProcessor, MultiLogProcessor, NoopLogProcessor};
pub use logger::SdkLogger;
pub use logger_provider::{LoggerProviderBuilder, SdkLoggerProvider};
pub use record::{LogRecordData, SdkLogRecord, Severity, TraceContext};
pub use simple_log_processor::SimpleLogProcessor;
