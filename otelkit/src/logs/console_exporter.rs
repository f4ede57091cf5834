use std::io::Write;

use crate::error::{SdkError, SdkResult};
use crate::logs::{LogExporter, LogRecordData};

/// Writes log records to stdout in a human-readable form.
///
/// Intended for debugging with a [`SimpleLogProcessor`]; the output format is
/// not stable.
///
/// [`SimpleLogProcessor`]: crate::logs::SimpleLogProcessor
#[derive(Debug, Default)]
pub struct ConsoleLogRecordExporter;

impl LogExporter for ConsoleLogRecordExporter {
    async fn export(&self, batch: Vec<LogRecordData>) -> SdkResult {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for record in &batch {
            write_record(&mut out, record)
                .map_err(|e| SdkError::InternalFailure(format!("stdout write failed: {e}")))?;
        }
        Ok(())
    }
}

fn write_record(out: &mut impl Write, record: &LogRecordData) -> std::io::Result<()> {
    write!(out, "[{}]", record.timestamp)?;
    if let Some(severity) = record.severity_number {
        write!(out, " {}", severity.name())?;
    }
    write!(out, " {}", record.scope.name())?;
    if let Some(body) = &record.body {
        write!(out, " body={body:?}")?;
    }
    if let Some(trace_context) = &record.trace_context {
        write!(
            out,
            " trace_id={} span_id={}",
            trace_context.trace_id, trace_context.span_id
        )?;
    }
    for (key, value) in record.attributes.iter() {
        write!(out, " {key}={value:?}")?;
    }
    writeln!(out)
}
