use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

pub mod handlers;

use handlers::{report_capture, start_capture, tool_status};

pub fn add_trace_handlers() -> Router<Arc<AppState>> {
    Router::new()
        .route("/start", post(start_capture))
        .route("/report", get(report_capture))
        .route("/status", get(tool_status))
}
