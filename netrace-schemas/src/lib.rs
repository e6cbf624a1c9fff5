pub mod handlers;
pub mod settings;
pub mod trace_models;

/// Default directory for capture files when `CAP_DIR` is not set.
pub const DEFAULT_CAPTURE_FOLDER: &str = "/tmp";
