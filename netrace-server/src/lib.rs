use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use http::{HeaderValue, Method};
use netrace_core_lib::tools::ResolvedTools;
use netrace_core_lib::CaptureError;
use netrace_schemas::settings::CaptureSettings;
use tower_http::cors::CorsLayer;

pub mod logging;
pub mod trace;

/// Store a version of the server when compiled, useful for the status endpoint.
pub const PROJECT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Store some state for the handlers. The tool paths are resolved once at startup - install
/// locations do not change at runtime so there is no cache invalidation to worry about, and
/// unavailability is carried as None until a handler actually needs the tool.
#[derive(Clone)]
pub struct AppState {
    pub settings: CaptureSettings,
    pub tools: ResolvedTools,
}

impl AppState {
    pub fn new(settings: CaptureSettings, tools: ResolvedTools) -> Arc<Self> {
        Arc::new(Self { settings, tools })
    }
}

/// This is a generic error handling struct to be used by the handlers. Pipeline errors that have
/// a meaningful http status are mapped through, anything else is a 500.
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<CaptureError>() {
            Some(CaptureError::ToolUnavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            // retryable by the caller after a longer delay, so signal a timeout not a crash
            Some(CaptureError::FileNotReady { .. }) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "ok": false,
            "error": format!("{}", self.0),
        });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Produce the app in a separate function to allow for testing without creating an http server.
pub fn app(app_state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/trace", trace::add_trace_handlers())
        .layer(
            CorsLayer::new()
                // the front end dev server
                .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
                .allow_methods([Method::GET, Method::POST]),
        )
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        AppState::new(CaptureSettings::default(), ResolvedTools::default())
    }

    #[tokio::test]
    async fn test_report_without_pcap_param_is_bad_request() {
        let app = app(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/trace/report")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_report_with_empty_pcap_param_is_bad_request() {
        let app = app(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/trace/report?pcap=")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_report_for_missing_file_is_gateway_timeout() {
        let app = app(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/trace/report?pcap=/tmp/netrace-test-no-such-file.pcapng")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_start_without_dumpcap_is_service_unavailable() {
        // default ResolvedTools carries no dumpcap at all
        let app = app(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/trace/start")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_clamps_seconds_at_the_boundary() {
        // a harmless binary stands in for dumpcap, the clamped duration in the returned
        // handle is what is under test
        let tools = ResolvedTools {
            dumpcap: Some("/bin/echo".into()),
            tshark: None,
        };
        let state = AppState::new(CaptureSettings::default(), tools);
        let app = app(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/trace/start")
                    .header("content-type", "application/json")
                    .body(Body::from("{\"seconds\": 1000}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["capture"]["seconds"], 120);
    }

    #[tokio::test]
    async fn test_status_endpoint_reports_environment() {
        let app = app(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/trace/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
