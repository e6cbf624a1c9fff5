use std::process::Stdio;

use chrono::Utc;
use netrace_schemas::settings::{CaptureSettings, DUMPCAP_ENV_VAR};
use netrace_schemas::trace_models::CaptureHandle;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::tools::ResolvedTools;
use crate::CaptureError;

/// Bounds on the capture duration, defends against pathological caller input. Anything outside
/// is clamped rather than rejected.
const MIN_CAPTURE_SECONDS: i64 = 3;
const MAX_CAPTURE_SECONDS: i64 = 120;

pub fn clamp_capture_seconds(seconds: i64) -> u64 {
    seconds.clamp(MIN_CAPTURE_SECONDS, MAX_CAPTURE_SECONDS) as u64
}

/// Launch a bounded duration packet capture as a detached child process and return immediately
/// with the metadata needed to ask for a report later. The child writes to a unique file under
/// the configured capture directory and stops itself via the duration autostop condition - this
/// function never waits for it.
pub fn start_capture(
    tools: &ResolvedTools,
    settings: &CaptureSettings,
    seconds: i64,
    filter: &str,
    iface: Option<&str>,
) -> Result<CaptureHandle, CaptureError> {
    let dumpcap = tools
        .dumpcap
        .as_ref()
        .ok_or_else(|| CaptureError::tool_unavailable("dumpcap", DUMPCAP_ENV_VAR))?;

    let seconds = clamp_capture_seconds(seconds);
    let iface = iface.unwrap_or(&settings.default_iface);

    // timestamp plus a random suffix, timestamps alone can collide between concurrent captures
    let suffix: u16 = rand::random();
    let pcap_path = settings.capture_dir.join(format!(
        "trace-{}-{:04x}.pcapng",
        Utc::now().timestamp_millis(),
        suffix
    ));
    let pcap_string = pcap_path.display().to_string();

    let duration_stop = format!("duration:{seconds}");
    let args = vec![
        "-i", iface,
        "-f", filter,
        "-a", &duration_stop,
        "-w", &pcap_string,
    ];
    let cmd_string = format!("{} {}", dumpcap.display(), args.join(" "));
    tracing::info!("starting capture: {}", &cmd_string);

    let mut child = Command::new(dumpcap)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| CaptureError::AnalysisToolError {
            detail: format!("could not spawn dumpcap: {err:#}"),
        })?;

    // drain both pipes on their own tasks so the child can never block on a full pipe buffer,
    // and log each line for diagnostics - dumpcap writes its progress to stderr
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::info!("[dumpcap] {}", line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::info!("[dumpcap] {}", line);
            }
        });
    }
    // observe the exit code but don't treat a failure as fatal here, the file stabilisation
    // step will surface any resulting problem to the report request
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => tracing::info!("[dumpcap] exit {:?}", status.code()),
            Err(err) => tracing::error!("[dumpcap] wait error: {err:#}"),
        }
    });

    Ok(CaptureHandle {
        pcap_path: pcap_string,
        seconds,
        filter: filter.to_string(),
        iface: iface.to_string(),
        cmd: cmd_string,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_clamped_to_lower_bound() {
        assert_eq!(clamp_capture_seconds(1), 3);
        assert_eq!(clamp_capture_seconds(-50), 3);
    }

    #[test]
    fn test_seconds_clamped_to_upper_bound() {
        assert_eq!(clamp_capture_seconds(1000), 120);
    }

    #[test]
    fn test_seconds_in_range_passed_through() {
        assert_eq!(clamp_capture_seconds(6), 6);
        assert_eq!(clamp_capture_seconds(3), 3);
        assert_eq!(clamp_capture_seconds(120), 120);
    }

    #[tokio::test]
    async fn test_start_capture_without_dumpcap_is_tool_unavailable() {
        let tools = ResolvedTools::default();
        let settings = CaptureSettings::default();
        let result = start_capture(&tools, &settings, 6, "tcp port 3000", None);
        match result {
            Err(CaptureError::ToolUnavailable { tool, env_var }) => {
                assert_eq!(tool, "dumpcap");
                assert_eq!(env_var, "DUMPCAP");
            }
            other => panic!("expected ToolUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_capture_handle_metadata() {
        // use a harmless binary as a stand in for dumpcap, it will exit straight away with the
        // unknown arguments which is fine - the handle metadata is what is under test
        let tools = ResolvedTools {
            dumpcap: Some("/bin/echo".into()),
            tshark: None,
        };
        let dir = tempfile::tempdir().unwrap();
        let settings = CaptureSettings {
            capture_dir: dir.path().to_path_buf(),
            default_iface: "any".to_string(),
        };
        let handle = start_capture(&tools, &settings, 500, "tcp port 8080", Some("eth0")).unwrap();
        assert_eq!(handle.seconds, 120);
        assert_eq!(handle.filter, "tcp port 8080");
        assert_eq!(handle.iface, "eth0");
        assert!(handle.pcap_path.starts_with(dir.path().to_str().unwrap()));
        assert!(handle.pcap_path.ends_with(".pcapng"));
        assert!(handle.cmd.contains("duration:120"));
    }

    #[tokio::test]
    async fn test_concurrent_captures_get_distinct_paths() {
        let tools = ResolvedTools {
            dumpcap: Some("/bin/echo".into()),
            tshark: None,
        };
        let dir = tempfile::tempdir().unwrap();
        let settings = CaptureSettings {
            capture_dir: dir.path().to_path_buf(),
            default_iface: "any".to_string(),
        };
        let a = start_capture(&tools, &settings, 6, "tcp", None).unwrap();
        let b = start_capture(&tools, &settings, 6, "tcp", None).unwrap();
        assert_ne!(a.pcap_path, b.pcap_path);
    }
}
