use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::DEFAULT_CAPTURE_FOLDER;

/// Environment variable naming an explicit path to the capture binary.
pub const DUMPCAP_ENV_VAR: &str = "DUMPCAP";
/// Environment variable naming an explicit path to the analysis binary.
pub const TSHARK_ENV_VAR: &str = "TSHARK";
/// Environment variable overriding the capture output directory.
pub const CAP_DIR_ENV_VAR: &str = "CAP_DIR";
/// Environment variable overriding the default capture interface.
pub const CAP_IFACE_ENV_VAR: &str = "CAP_IFACE";

/// Runtime configuration for the capture pipeline, read from the environment once at startup and
/// then passed explicitly to anything that needs it. There is deliberately no global state for
/// this - install locations and the capture directory do not change while the server runs.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub struct CaptureSettings {
    /// directory capture files are written into, created at startup if missing
    pub capture_dir: PathBuf,
    /// interface used when a capture request does not name one
    pub default_iface: String,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            capture_dir: PathBuf::from(DEFAULT_CAPTURE_FOLDER),
            default_iface: default_iface_for_platform().to_string(),
        }
    }
}

impl CaptureSettings {
    /// Build settings from the process environment, falling back to the per platform defaults
    /// documented on the constants above.
    pub fn from_env() -> Self {
        let capture_dir = std::env::var(CAP_DIR_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CAPTURE_FOLDER));
        let default_iface = std::env::var(CAP_IFACE_ENV_VAR)
            .unwrap_or_else(|_| default_iface_for_platform().to_string());
        tracing::debug!(
            "capture settings: dir {:?}, default iface {}",
            capture_dir,
            default_iface
        );
        Self {
            capture_dir,
            default_iface,
        }
    }
}

/// The loopback name differs between macOS and Linux, everything else gets the pseudo interface.
fn default_iface_for_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "lo0"
    } else {
        "any"
    }
}
