//! OTLP/HTTP exporter configuration and transport plumbing.

mod logs;
mod trace;

pub use logs::OtlpHttpLogExporter;
pub use trace::OtlpHttpSpanExporter;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderName, HeaderValue, Method, Request, Uri};
use otelkit::error::SdkError;
use otelkit::{otel_debug, otel_warn};
use thiserror::Error;

use crate::client::HttpClient;
use crate::{
    OTEL_EXPORTER_OTLP_ENDPOINT, OTEL_EXPORTER_OTLP_ENDPOINT_DEFAULT, OTEL_EXPORTER_OTLP_HEADERS,
    OTEL_EXPORTER_OTLP_LOGS_ENDPOINT, OTEL_EXPORTER_OTLP_LOGS_HEADERS,
    OTEL_EXPORTER_OTLP_LOGS_TIMEOUT, OTEL_EXPORTER_OTLP_TIMEOUT,
    OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT, OTEL_EXPORTER_OTLP_TRACES_ENDPOINT,
    OTEL_EXPORTER_OTLP_TRACES_HEADERS, OTEL_EXPORTER_OTLP_TRACES_TIMEOUT,
};

const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

/// Supplies request headers, re-invoked for every export request so callers
/// can rotate credentials without rebuilding the exporter.
pub(crate) type HeaderSupplier = Arc<dyn Fn() -> HashMap<String, String> + Send + Sync>;

/// Errors raised while building an exporter.
///
/// Configuration mistakes fail loudly here; nothing in the export hot path
/// ever throws.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ExporterBuildError {
    /// The configured endpoint did not parse as a URI.
    #[error("invalid OTLP endpoint: {0}")]
    InvalidEndpoint(String),

    /// No HTTP client implementation is available.
    ///
    /// Either enable the `reqwest-client` feature or supply a client with
    /// [`OtlpHttpExporterBuilder::with_http_client`].
    #[error("no HTTP client configured")]
    NoHttpClient,
}

/// The failure of one OTLP/HTTP export call.
///
/// Carries either the captured HTTP response (non-2xx status plus body) or
/// the underlying transport error, never both. [`failed_with_response`]
/// discriminates the two.
///
/// [`failed_with_response`]: HttpExportError::failed_with_response
#[derive(Debug)]
pub struct HttpExportError {
    response: Option<FailedResponse>,
    cause: Option<crate::client::HttpError>,
}

/// The server response that failed an export.
#[derive(Debug, Clone)]
pub struct FailedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, typically a serialized collector status message.
    pub body: Bytes,
}

impl HttpExportError {
    pub(crate) fn with_response(status: u16, body: Bytes) -> Self {
        HttpExportError {
            response: Some(FailedResponse { status, body }),
            cause: None,
        }
    }

    pub(crate) fn with_cause(cause: crate::client::HttpError) -> Self {
        HttpExportError {
            response: None,
            cause: Some(cause),
        }
    }

    /// `true` if the export failed with a response from the server, `false`
    /// if it failed exceptionally without reaching it.
    pub fn failed_with_response(&self) -> bool {
        self.response.is_some()
    }

    /// The server response, if [`failed_with_response`] is `true`.
    ///
    /// [`failed_with_response`]: HttpExportError::failed_with_response
    pub fn response(&self) -> Option<&FailedResponse> {
        self.response.as_ref()
    }

    /// The transport cause, if the export never got a response.
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync)> {
        self.cause.as_deref()
    }
}

impl fmt::Display for HttpExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.response, &self.cause) {
            (Some(response), _) => write!(
                f,
                "export failed with HTTP status {}: {:?}",
                response.status, response.body
            ),
            (None, Some(cause)) => write!(f, "export failed without response: {cause}"),
            (None, None) => f.write_str("export failed"),
        }
    }
}

impl std::error::Error for HttpExportError {}

impl From<HttpExportError> for SdkError {
    fn from(err: HttpExportError) -> Self {
        SdkError::InternalFailure(err.to_string())
    }
}

/// Builder shared by the OTLP/HTTP span and log exporters.
///
/// Explicit builder values take precedence over the `OTEL_EXPORTER_OTLP_*`
/// environment variables; per-signal variables take precedence over the
/// generic ones.
#[derive(Clone)]
pub struct OtlpHttpExporterBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
    headers: HashMap<String, String>,
    header_supplier: Option<HeaderSupplier>,
    client: Option<Arc<dyn HttpClient>>,
}

impl fmt::Debug for OtlpHttpExporterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtlpHttpExporterBuilder")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("headers", &self.headers.len())
            .finish()
    }
}

impl Default for OtlpHttpExporterBuilder {
    fn default() -> Self {
        OtlpHttpExporterBuilder {
            endpoint: None,
            timeout: None,
            headers: HashMap::new(),
            header_supplier: None,
            #[cfg(feature = "reqwest-client")]
            client: Some(Arc::new(reqwest::Client::new())),
            #[cfg(not(feature = "reqwest-client"))]
            client: None,
        }
    }
}

impl OtlpHttpExporterBuilder {
    /// Sets the collector base endpoint; the per-signal path (`/v1/traces`,
    /// `/v1/logs`) is appended on build.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the per-request timeout hint passed to the HTTP client.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Adds a fixed header sent with every request.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets a header supplier invoked per request, e.g. for rotating
    /// authorization tokens. Supplied headers override fixed ones.
    pub fn with_header_supplier(
        mut self,
        supplier: impl Fn() -> HashMap<String, String> + Send + Sync + 'static,
    ) -> Self {
        self.header_supplier = Some(Arc::new(supplier));
        self
    }

    /// Replaces the HTTP client implementation.
    pub fn with_http_client<T: HttpClient + 'static>(mut self, client: T) -> Self {
        self.client = Some(Arc::new(client));
        self
    }

    /// Builds a span exporter POSTing to `{endpoint}/v1/traces`.
    pub fn build_span_exporter(self) -> Result<OtlpHttpSpanExporter, ExporterBuildError> {
        let client = self.build_client(
            OTEL_EXPORTER_OTLP_TRACES_ENDPOINT,
            "/v1/traces",
            OTEL_EXPORTER_OTLP_TRACES_TIMEOUT,
            OTEL_EXPORTER_OTLP_TRACES_HEADERS,
        )?;
        Ok(OtlpHttpSpanExporter::new(client))
    }

    /// Builds a log exporter POSTing to `{endpoint}/v1/logs`.
    pub fn build_log_exporter(self) -> Result<OtlpHttpLogExporter, ExporterBuildError> {
        let client = self.build_client(
            OTEL_EXPORTER_OTLP_LOGS_ENDPOINT,
            "/v1/logs",
            OTEL_EXPORTER_OTLP_LOGS_TIMEOUT,
            OTEL_EXPORTER_OTLP_LOGS_HEADERS,
        )?;
        Ok(OtlpHttpLogExporter::new(client))
    }

    fn build_client(
        self,
        signal_endpoint_var: &str,
        signal_path: &str,
        signal_timeout_var: &str,
        signal_headers_var: &str,
    ) -> Result<OtlpHttpClient, ExporterBuildError> {
        let endpoint = resolve_endpoint(signal_endpoint_var, signal_path, self.endpoint.as_deref())?;

        let timeout = self
            .timeout
            .or_else(|| env_timeout(signal_timeout_var))
            .or_else(|| env_timeout(OTEL_EXPORTER_OTLP_TIMEOUT))
            .unwrap_or(OTEL_EXPORTER_OTLP_TIMEOUT_DEFAULT);

        let client = self.client.ok_or(ExporterBuildError::NoHttpClient)?;

        let mut headers = self.headers;
        // Env-provided headers extend but do not override explicit ones.
        if let Ok(input) =
            std::env::var(signal_headers_var).or_else(|_| std::env::var(OTEL_EXPORTER_OTLP_HEADERS))
        {
            for (key, value) in parse_header_string(&input) {
                headers.entry(key.to_string()).or_insert(value.to_string());
            }
        }
        let headers = headers
            .into_iter()
            .filter_map(|(key, value)| {
                match (
                    HeaderName::from_str(&key),
                    HeaderValue::from_str(&value),
                ) {
                    (Ok(key), Ok(value)) => Some((key, value)),
                    _ => {
                        otel_warn!(name: "OtlpHttp.InvalidHeaderDropped", header = key);
                        None
                    }
                }
            })
            .collect();

        Ok(OtlpHttpClient {
            client: Mutex::new(Some(client)),
            endpoint,
            headers,
            header_supplier: self.header_supplier,
            timeout,
        })
    }
}

fn env_timeout(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
}

fn resolve_endpoint(
    signal_endpoint_var: &str,
    signal_path: &str,
    configured: Option<&str>,
) -> Result<Uri, ExporterBuildError> {
    // Explicit configuration wins, then the per-signal env var is used as-is
    // (no path appending), then the generic env var plus path, then the
    // default.
    if let Some(endpoint) = configured {
        return build_endpoint_uri(endpoint, signal_path);
    }
    if let Ok(endpoint) = std::env::var(signal_endpoint_var) {
        return endpoint
            .parse()
            .map_err(|_| ExporterBuildError::InvalidEndpoint(endpoint));
    }
    if let Ok(endpoint) = std::env::var(OTEL_EXPORTER_OTLP_ENDPOINT) {
        return build_endpoint_uri(&endpoint, signal_path);
    }
    build_endpoint_uri(OTEL_EXPORTER_OTLP_ENDPOINT_DEFAULT, signal_path)
}

fn build_endpoint_uri(endpoint: &str, path: &str) -> Result<Uri, ExporterBuildError> {
    let path = if endpoint.ends_with('/') {
        path.trim_start_matches('/')
    } else {
        path
    };
    format!("{endpoint}{path}")
        .parse()
        .map_err(|_| ExporterBuildError::InvalidEndpoint(endpoint.to_string()))
}

fn parse_header_string(input: &str) -> impl Iterator<Item = (&str, &str)> {
    input
        .split(',')
        .map(str::trim)
        .filter_map(|entry| entry.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
}

/// Shared state of the OTLP/HTTP exporters: endpoint, headers and the
/// pluggable client. Shutdown drops the client, failing later exports fast.
pub(crate) struct OtlpHttpClient {
    client: Mutex<Option<Arc<dyn HttpClient>>>,
    endpoint: Uri,
    headers: Vec<(HeaderName, HeaderValue)>,
    header_supplier: Option<HeaderSupplier>,
    // Surfaced to clients that support per-request deadlines.
    timeout: Duration,
}

impl fmt::Debug for OtlpHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtlpHttpClient")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OtlpHttpClient {
    /// Sends one serialized request body, mapping non-2xx statuses and
    /// transport failures to [`HttpExportError`].
    pub(crate) async fn send(&self, body: Vec<u8>) -> Result<(), SdkError> {
        let client = self
            .client
            .lock()
            .map_err(|e| SdkError::InternalFailure(format!("lock poisoned: {e}")))?
            .as_ref()
            .cloned()
            .ok_or(SdkError::AlreadyShutdown)?;

        let mut request = Request::builder()
            .method(Method::POST)
            .uri(&self.endpoint)
            .header(CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)
            .body(Bytes::from(body))
            .map_err(|e| SdkError::InternalFailure(format!("invalid request: {e}")))?;

        for (key, value) in &self.headers {
            request.headers_mut().insert(key.clone(), value.clone());
        }
        if let Some(supplier) = &self.header_supplier {
            for (key, value) in supplier() {
                if let (Ok(key), Ok(value)) =
                    (HeaderName::from_str(&key), HeaderValue::from_str(&value))
                {
                    request.headers_mut().insert(key, value);
                }
            }
        }

        otel_debug!(name: "OtlpHttp.Export", endpoint = self.endpoint.to_string());
        let response = client
            .send_bytes(request)
            .await
            .map_err(|cause| SdkError::from(HttpExportError::with_cause(cause)))?;

        if !response.status().is_success() {
            let error =
                HttpExportError::with_response(response.status().as_u16(), response.into_body());
            otel_warn!(name: "OtlpHttp.ExportFailed", error = error.to_string());
            return Err(error.into());
        }
        Ok(())
    }

    /// Drops the client; later exports fail with `AlreadyShutdown`.
    pub(crate) fn shutdown(&self) -> Result<(), SdkError> {
        let mut client = self
            .client
            .lock()
            .map_err(|e| SdkError::InternalFailure(format!("lock poisoned: {e}")))?;
        if client.take().is_none() {
            return Err(SdkError::AlreadyShutdown);
        }
        Ok(())
    }
}
