use serde::{Deserialize, Serialize};

/// Metadata returned as soon as a capture child process has been launched. The capture itself
/// runs for `seconds` in the background, writing to `pcap_path` - this struct does not track the
/// child process, it only describes what was started so the caller can ask for a report later.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub struct CaptureHandle {
    /// absolute and unique path to the capture file being written
    pub pcap_path: String,
    /// capture duration after clamping, in seconds
    pub seconds: u64,
    /// capture filter expression, passed verbatim to the capture tool
    pub filter: String,
    /// network interface the capture listens on
    pub iface: String,
    /// full command line of the child process, for diagnostics
    pub cmd: String,
}

/// The two transaction boundaries we derive from the analysis tool's HTTP field extraction.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    HttpRequest,
    HttpResponse,
}

/// One HTTP transaction boundary observed in the capture. Request events carry `method`/`uri`,
/// response events carry `status_code` and, when a request was previously seen on the same TCP
/// stream, a round trip time in milliseconds.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct TraceEvent {
    pub kind: EventKind,
    /// epoch time in seconds, from the frame timestamp
    pub timestamp: f64,
    /// tool assigned TCP stream identifier grouping packets of one connection
    pub stream: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt_ms: Option<i64>,
}

impl TraceEvent {
    pub fn request(timestamp: f64, stream: String, method: String, uri: String) -> Self {
        Self {
            kind: EventKind::HttpRequest,
            timestamp,
            stream,
            method: Some(method),
            uri: Some(uri),
            status_code: None,
            rtt_ms: None,
        }
    }

    pub fn response(timestamp: f64, stream: String, status_code: String) -> Self {
        Self {
            kind: EventKind::HttpResponse,
            timestamp,
            stream,
            method: None,
            uri: None,
            status_code: Some(status_code),
            rtt_ms: None,
        }
    }
}

/// The assembled report for one capture file. The two summaries are opaque text tables straight
/// from the analysis tool, kept unparsed - if an analysis invocation failed its slot holds an
/// `ERROR: ...` string instead so the rest of the report is still usable.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub struct TraceReport {
    /// symlink resolved path the analysis actually ran against
    pub pcap_path: String,
    /// TCP conversation table
    pub conversation_summary: String,
    /// per second I/O statistics table
    pub io_summary: String,
    /// HTTP request/response events in chronological order
    pub events: Vec<TraceEvent>,
}
