use std::io::Write;

use crate::error::{SdkError, SdkResult};
use crate::trace::{SpanData, SpanExporter};

/// Writes finished spans to stdout in a human-readable form.
///
/// Intended for debugging with a [`SimpleSpanProcessor`]; the output format
/// is not stable.
///
/// [`SimpleSpanProcessor`]: crate::trace::SimpleSpanProcessor
#[derive(Debug, Default)]
pub struct ConsoleSpanExporter;

impl SpanExporter for ConsoleSpanExporter {
    async fn export(&self, batch: Vec<SpanData>) -> SdkResult {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for span in &batch {
            write_span(&mut out, span)
                .map_err(|e| SdkError::InternalFailure(format!("stdout write failed: {e}")))?;
        }
        Ok(())
    }
}

fn write_span(out: &mut impl Write, span: &SpanData) -> std::io::Result<()> {
    write!(
        out,
        "{} {:?} trace_id={} span_id={} {}ns",
        span.name,
        span.span_kind,
        span.span_context.trace_id(),
        span.span_context.span_id(),
        span.end_time.saturating_sub(span.start_time),
    )?;
    for (key, value) in span.attributes.iter() {
        write!(out, " {key}={value:?}")?;
    }
    writeln!(out)
}
