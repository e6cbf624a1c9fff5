use std::path::Path;

use thiserror::Error;

pub mod analysis;
pub mod capture;
pub mod events;
pub mod report;
pub mod stabilize;
pub mod tools;

/// The errors the capture pipeline can surface to the boundary. Anything recoverable inside the
/// pipeline (a malformed CSV row, one failed summary out of three) is absorbed where it happens
/// and never becomes one of these.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// A required external binary could not be resolved. Not retryable until the environment is
    /// fixed, so the message names the tool and the override variable to set.
    #[error("{tool} not found. Set {env_var} or install the Wireshark CLI tools")]
    ToolUnavailable { tool: String, env_var: String },
    /// The capture file never reached a stable non trivial size within the timeout. The caller
    /// can retry after a longer delay.
    #[error("pcap not found or still empty: {path}")]
    FileNotReady { path: String },
    /// One analysis invocation failed, with the tool's stderr verbatim. Isolated per summary by
    /// the report assembler, does not fail the whole report.
    #[error("{detail}")]
    AnalysisToolError { detail: String },
}

impl CaptureError {
    pub fn tool_unavailable(tool: &str, env_var: &str) -> Self {
        Self::ToolUnavailable {
            tool: tool.to_string(),
            env_var: env_var.to_string(),
        }
    }

    pub fn file_not_ready(path: &Path) -> Self {
        Self::FileNotReady {
            path: path.display().to_string(),
        }
    }
}
