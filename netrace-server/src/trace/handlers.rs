use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::response::ErasedJson;
use netrace_core_lib::capture;
use netrace_core_lib::report::{summarize_capture, DEFAULT_STABILIZE_TIMEOUT};
use netrace_schemas::handlers::{ReportQueryParams, StartCaptureRequest, StartCaptureResponse};

use crate::{AppError, AppState, PROJECT_VERSION};

/// Give the capture child a moment to open the interface and create the output file before the
/// caller is allowed to start asking for reports.
const ARM_DELAY: Duration = Duration::from_millis(400);

/// Start a bounded duration capture and return its metadata straight away - the capture itself
/// runs in the background for the clamped duration.
pub async fn start_capture(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartCaptureRequest>,
) -> Result<impl IntoResponse, AppError> {
    // clamp at the boundary, the core clamps again defensively
    let seconds = capture::clamp_capture_seconds(request.seconds.unwrap_or(6));
    let filter = request.filter.unwrap_or_else(|| "tcp port 3000".to_string());

    let handle = capture::start_capture(
        &state.tools,
        &state.settings,
        seconds as i64,
        &filter,
        request.iface.as_deref(),
    )?;

    // arm delay so an immediate report request does not race the child creating the file
    tokio::time::sleep(ARM_DELAY).await;

    Ok(Json(StartCaptureResponse {
        ok: true,
        capture: handle,
    }))
}

/// Summarise a finished (or finishing) capture file. A missing or empty `pcap` query parameter
/// is a client error before the pipeline is ever touched.
pub async fn report_capture(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportQueryParams>,
) -> Result<Response, AppError> {
    let pcap = match params.pcap.as_deref() {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => {
            let body = serde_json::json!({ "ok": false, "error": "Missing ?pcap=" });
            return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
        }
    };

    let report = summarize_capture(&state.tools, Path::new(&pcap), DEFAULT_STABILIZE_TIMEOUT).await?;

    let body = serde_json::json!({ "ok": true, "report": report });
    // format json with pretty formatting if query parameter present and true
    if let Some(true) = params.pretty {
        return Ok(ErasedJson::pretty(body).into_response());
    }
    Ok(ErasedJson::new(body).into_response())
}

/// Report the resolved tool paths and capture directory so an operator can check the
/// environment without starting a capture.
pub async fn tool_status(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let body = serde_json::json!({
        "version": PROJECT_VERSION,
        "dumpcap": state.tools.dumpcap.as_ref().map(|p| p.display().to_string()),
        "tshark": state.tools.tshark.as_ref().map(|p| p.display().to_string()),
        "capture_dir": state.settings.capture_dir.display().to_string(),
        "default_iface": state.settings.default_iface,
    });
    Ok(Json(body))
}
