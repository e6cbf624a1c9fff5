use std::path::Path;
use std::time::Duration;

use netrace_schemas::trace_models::TraceReport;

use crate::analysis::{run_conversation_summary, run_http_field_extract, run_io_summary};
use crate::events::derive_events;
use crate::stabilize::await_stable;
use crate::tools::ResolvedTools;
use crate::CaptureError;

/// How long a report request waits for the capture file to stop growing before giving up.
pub const DEFAULT_STABILIZE_TIMEOUT: Duration = Duration::from_secs(6);

/// Produce the full report for one capture file: wait for the file to stabilise, run the three
/// analysis invocations, derive the HTTP event timeline and bundle everything up.
///
/// Stabilisation failure aborts the whole report with `FileNotReady` before any analysis runs.
/// After that the report always comes back - a failed summary invocation is embedded as an
/// `ERROR: ...` string in its slot and a failed field extraction just means no events, so one
/// broken invocation cannot take down the other two.
pub async fn summarize_capture(
    tools: &ResolvedTools,
    pcap: &Path,
    stabilize_timeout: Duration,
) -> Result<TraceReport, CaptureError> {
    let real = await_stable(pcap, stabilize_timeout).await?;

    // the three invocations are independent, run them concurrently
    let (conv, io, extract) = tokio::join!(
        run_conversation_summary(tools, &real),
        run_io_summary(tools, &real),
        run_http_field_extract(tools, &real),
    );

    let conversation_summary = conv.unwrap_or_else(|err| format!("ERROR: {err}"));
    let io_summary = io.unwrap_or_else(|err| format!("ERROR: {err}"));
    let events = match extract {
        Ok(text) => derive_events(&text),
        Err(err) => {
            tracing::warn!("http field extraction failed, report will have no events: {err}");
            Vec::new()
        }
    };

    Ok(TraceReport {
        pcap_path: real.display().to_string(),
        conversation_summary,
        io_summary,
        events,
    })
}
