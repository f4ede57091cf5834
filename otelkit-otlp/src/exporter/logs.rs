use otelkit::error::SdkResult;
use otelkit::logs::{LogExporter, LogRecordData};

use super::OtlpHttpClient;
use crate::marshal::logs::encode_logs_request;

/// Exports log record batches to an OTLP collector over HTTP.
///
/// Each export serializes the batch into one `ExportLogsServiceRequest` and
/// POSTs it as `application/x-protobuf`; any 2xx response is success.
#[derive(Debug)]
pub struct OtlpHttpLogExporter {
    client: OtlpHttpClient,
}

impl OtlpHttpLogExporter {
    pub(crate) fn new(client: OtlpHttpClient) -> Self {
        OtlpHttpLogExporter { client }
    }
}

impl LogExporter for OtlpHttpLogExporter {
    async fn export(&self, batch: Vec<LogRecordData>) -> SdkResult {
        let body = encode_logs_request(&batch);
        self.client.send(body).await
    }

    fn shutdown(&self) -> SdkResult {
        self.client.shutdown()
    }
}
