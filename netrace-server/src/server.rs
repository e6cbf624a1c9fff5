use std::net::SocketAddr;
use std::process::exit;

use axum::extract::Request;
use axum::ServiceExt;
use clap::Parser;
use netrace_core_lib::tools::ResolvedTools;
use netrace_schemas::settings::CaptureSettings;
use netrace_server_lib::{app, logging, AppState};
use tokio::net::TcpListener;
use tower_http::normalize_path::NormalizePathLayer;
use tower_layer::Layer;

#[derive(Parser, Debug)]
#[command(about = "Network trace capture and analysis server")]
struct ServerArgs {
    /// port to listen on
    #[arg(long, default_value_t = 3377)]
    port: u16,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() {
    let args = ServerArgs::parse();

    // settings come from the environment once at startup, everything downstream gets them
    // passed explicitly
    let settings = CaptureSettings::from_env();

    let _logging_guard = logging::configure_logging(&settings.capture_dir).await;

    // make sure the capture directory exists before any capture child tries to write into it
    match tokio::fs::create_dir_all(&settings.capture_dir).await {
        Ok(_) => {}
        Err(err) => {
            tracing::error!(
                "could not create capture directory {:?}, error: {err:#}",
                settings.capture_dir
            );
            exit(1);
        }
    }

    // resolve the external tools once - missing tools are not fatal here, handlers surface the
    // failure to the caller when a capture or report is actually requested
    let tools = ResolvedTools::from_environment();
    match &tools.dumpcap {
        Some(path) => tracing::info!("capture tool: {:?}", path),
        None => tracing::warn!("dumpcap not resolved, capture requests will fail"),
    }
    match &tools.tshark {
        Some(path) => tracing::info!("analysis tool: {:?}", path),
        None => tracing::warn!("tshark not resolved, report summaries will carry errors"),
    }

    let app_state = AppState::new(settings, tools);

    // listen on all addresses, the front end and CLI callers may come from different hosts
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    // add trim slash middleware
    let app = NormalizePathLayer::trim_trailing_slash().layer(app(app_state));

    tracing::info!("listening on {}", addr);
    let listener = match TcpListener::bind(&addr).await {
        Ok(ok) => ok,
        Err(err) => {
            tracing::error!("could not bind {}, error: {err:#}", addr);
            exit(1);
        }
    };
    if let Err(err) =
        axum::serve(listener, ServiceExt::<Request>::into_make_service(app)).await
    {
        tracing::error!("server error: {err:#}");
        exit(1);
    }
}
