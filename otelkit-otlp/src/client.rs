use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};

/// Errors produced below the HTTP status layer: connection failures,
/// timeouts, malformed requests.
pub type HttpError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A minimal interface for sending telemetry export requests over HTTP.
///
/// Users sometimes choose HTTP clients tied to a particular async runtime;
/// this trait lets them bring their own. The exporter only needs a single
/// request/response round trip per export call.
#[async_trait]
pub trait HttpClient: Debug + Send + Sync {
    /// Sends the request and returns the response, including status code and
    /// body.
    ///
    /// Returns an error only for transport-level failures; non-success HTTP
    /// statuses are returned as regular responses.
    async fn send_bytes(&self, request: Request<Bytes>) -> Result<Response<Bytes>, HttpError>;
}

#[cfg(feature = "reqwest-client")]
mod reqwest_client {
    use super::{async_trait, Bytes, HttpClient, HttpError, Request, Response};
    use otelkit::otel_debug;

    #[async_trait]
    impl HttpClient for reqwest::Client {
        async fn send_bytes(&self, request: Request<Bytes>) -> Result<Response<Bytes>, HttpError> {
            otel_debug!(name: "OtlpHttp.ReqwestClient.Send");
            let request = request.try_into()?;
            let mut response = self.execute(request).await?;
            let headers = std::mem::take(response.headers_mut());
            let mut http_response = Response::builder()
                .status(response.status())
                .body(response.bytes().await?)?;
            *http_response.headers_mut() = headers;
            Ok(http_response)
        }
    }
}
