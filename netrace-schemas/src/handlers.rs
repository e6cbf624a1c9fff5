use serde::{Deserialize, Serialize};

use crate::trace_models::{CaptureHandle, TraceReport};

/// Body for the start capture endpoint, both fields optional so an empty body is valid.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct StartCaptureRequest {
    /// requested capture duration, clamped server side to [3, 120]
    pub seconds: Option<i64>,
    /// capture filter expression, defaults to local web traffic
    pub filter: Option<String>,
    /// interface override, defaults to the configured interface
    pub iface: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StartCaptureResponse {
    pub ok: bool,
    pub capture: CaptureHandle,
}

/// Query string for the report endpoint.
#[derive(Serialize, Deserialize)]
pub struct ReportQueryParams {
    /// path to the capture file, as returned by the start endpoint
    pub pcap: Option<String>,
    /// return the report as pretty JSON when present and true
    pub pretty: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ReportResponse {
    pub ok: bool,
    pub report: TraceReport,
}
