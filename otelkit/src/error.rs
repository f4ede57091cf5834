//! Errors returned by SDK flush, shutdown and export operations.

use std::time::Duration;
use thiserror::Error;

/// Result type for SDK operations.
pub type SdkResult = Result<(), SdkError>;

/// Errors surfaced by exporters and by provider flush/shutdown paths.
///
/// Telemetry emission itself never returns errors to the instrumented
/// application; invalid hot-path inputs are silently ignored and failures are
/// reported through internal logs and [`CompletableResultCode`]s. Only
/// lifecycle operations (`force_flush`, `shutdown`, `export`) produce values
/// of this type.
///
/// [`CompletableResultCode`]: crate::CompletableResultCode
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SdkError {
    /// The operation was called on a component that is already shut down.
    #[error("already shutdown")]
    AlreadyShutdown,

    /// The operation did not complete within the given duration.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Any other failure, described as a string.
    #[error("operation failed: {0}")]
    InternalFailure(String),
}
