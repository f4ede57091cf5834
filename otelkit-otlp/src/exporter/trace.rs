use otelkit::error::SdkResult;
use otelkit::trace::{SpanData, SpanExporter};

use super::OtlpHttpClient;
use crate::marshal::trace::encode_trace_request;

/// Exports span batches to an OTLP collector over HTTP.
///
/// Each export serializes the batch into one `ExportTraceServiceRequest` and
/// POSTs it as `application/x-protobuf`; any 2xx response is success.
#[derive(Debug)]
pub struct OtlpHttpSpanExporter {
    client: OtlpHttpClient,
}

impl OtlpHttpSpanExporter {
    pub(crate) fn new(client: OtlpHttpClient) -> Self {
        OtlpHttpSpanExporter { client }
    }
}

impl SpanExporter for OtlpHttpSpanExporter {
    async fn export(&self, batch: Vec<SpanData>) -> SdkResult {
        let body = encode_trace_request(&batch);
        self.client.send(body).await
    }

    fn shutdown(&self) -> SdkResult {
        self.client.shutdown()
    }
}
