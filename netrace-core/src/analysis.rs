use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use netrace_schemas::settings::TSHARK_ENV_VAR;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::tools::ResolvedTools;
use crate::CaptureError;

/// Cap on captured stdout, a pathological capture file can otherwise make the analysis tool
/// produce an unbounded amount of output.
const MAX_OUTPUT_BYTES: u64 = 20 * 1024 * 1024;
/// Wall clock bound on one analysis invocation, the child is killed on overrun.
const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(30);

/// TCP conversation summary table for the capture file.
pub async fn run_conversation_summary(
    tools: &ResolvedTools,
    pcap: &Path,
) -> Result<String, CaptureError> {
    run_analysis_tool(tools, vec_path_args(pcap, &["-q", "-z", "conv,tcp"])).await
}

/// Per second I/O statistics table for the capture file.
pub async fn run_io_summary(tools: &ResolvedTools, pcap: &Path) -> Result<String, CaptureError> {
    run_analysis_tool(tools, vec_path_args(pcap, &["-q", "-z", "io,stat,1"])).await
}

/// Field extraction limited to HTTP traffic, emitted as header led, comma separated, double
/// quoted text. The field order here is what the event deriver expects.
pub async fn run_http_field_extract(
    tools: &ResolvedTools,
    pcap: &Path,
) -> Result<String, CaptureError> {
    run_analysis_tool(
        tools,
        vec_path_args(
            pcap,
            &[
                "-Y", "http",
                "-T", "fields",
                "-E", "header=y",
                "-E", "separator=,",
                "-E", "quote=d",
                "-e", "frame.time_epoch",
                "-e", "ip.src",
                "-e", "ip.dst",
                "-e", "tcp.stream",
                "-e", "http.request.method",
                "-e", "http.request.uri",
                "-e", "http.response.code",
            ],
        ),
    )
    .await
}

fn vec_path_args(pcap: &Path, rest: &[&str]) -> Vec<String> {
    let mut args = vec!["-r".to_string(), pcap.display().to_string()];
    args.extend(rest.iter().map(|s| s.to_string()));
    args
}

/// Run the analysis tool once as a short lived child process and return its stdout. Output is
/// capped and the whole invocation is bounded by a timeout so one bad capture file cannot pin
/// the server. A non zero exit surfaces the tool's stderr verbatim as the error detail.
async fn run_analysis_tool(
    tools: &ResolvedTools,
    args: Vec<String>,
) -> Result<String, CaptureError> {
    run_analysis_tool_with_cap(tools, args, MAX_OUTPUT_BYTES).await
}

async fn run_analysis_tool_with_cap(
    tools: &ResolvedTools,
    args: Vec<String>,
    output_cap: u64,
) -> Result<String, CaptureError> {
    let tshark = tools
        .tshark
        .as_ref()
        .ok_or_else(|| CaptureError::tool_unavailable("tshark", TSHARK_ENV_VAR))?;

    tracing::debug!("running analysis: {} {}", tshark.display(), args.join(" "));
    let mut child = Command::new(tshark)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| CaptureError::AnalysisToolError {
            detail: format!("could not spawn tshark: {err:#}"),
        })?;

    let stdout_pipe = child.stdout.take().ok_or_else(|| CaptureError::AnalysisToolError {
        detail: "could not get stdout pipe from tshark".to_string(),
    })?;
    let mut stderr_pipe = child.stderr.take().ok_or_else(|| CaptureError::AnalysisToolError {
        detail: "could not get stderr pipe from tshark".to_string(),
    })?;
    let mut limited_stdout = stdout_pipe.take(output_cap);

    // stderr drained on its own task so the child can never deadlock on a full pipe buffer,
    // its content is only collected when the exit status calls for it
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf).await;
        buf
    });

    let mut stdout_buf = Vec::new();
    let bounded = tokio::time::timeout(ANALYSIS_TIMEOUT, async {
        limited_stdout
            .read_to_end(&mut stdout_buf)
            .await
            .map_err(anyhow::Error::from)?;
        // the limited reader returns early once the cap is hit - the child is still writing at
        // that point, so kill it now rather than sit behind its blocked pipe until the timeout
        if stdout_buf.len() as u64 >= output_cap {
            let _ = child.kill().await;
            anyhow::bail!("tshark output exceeded the {output_cap} byte cap, child killed");
        }
        child.wait().await.map_err(anyhow::Error::from)
    })
    .await;

    let status = match bounded {
        Ok(Ok(status)) => status,
        Ok(Err(err)) => {
            return Err(CaptureError::AnalysisToolError {
                detail: format!("tshark io error: {err:#}"),
            });
        }
        Err(_elapsed) => {
            tracing::warn!("analysis invocation exceeded {:?}, killing child", ANALYSIS_TIMEOUT);
            let _ = child.kill().await;
            return Err(CaptureError::AnalysisToolError {
                detail: format!("tshark timed out after {}s", ANALYSIS_TIMEOUT.as_secs()),
            });
        }
    };

    if !status.success() {
        let stderr_buf = stderr_task.await.unwrap_or_default();
        let std_err = String::from_utf8_lossy(&stderr_buf).to_string();
        let detail = if std_err.trim().is_empty() {
            format!("tshark exited with {:?}", status.code())
        } else {
            std_err
        };
        return Err(CaptureError::AnalysisToolError { detail });
    }
    Ok(String::from_utf8_lossy(&stdout_buf).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unresolved_tshark_is_tool_unavailable() {
        let tools = ResolvedTools::default();
        let result = run_conversation_summary(&tools, Path::new("/tmp/none.pcapng")).await;
        match result {
            Err(CaptureError::ToolUnavailable { tool, env_var }) => {
                assert_eq!(tool, "tshark");
                assert_eq!(env_var, "TSHARK");
            }
            other => panic!("expected ToolUnavailable, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_surfaces_stderr() {
        // stand in tool that always fails with a diagnostic on stderr
        let tools = ResolvedTools {
            dumpcap: None,
            tshark: Some("/bin/sh".into()),
        };
        // /bin/sh -r <path> ... is nonsense, it exits non zero with a message
        let result = run_analysis_tool(
            &tools,
            vec!["-c".to_string(), "echo boom >&2; exit 2".to_string()],
        )
        .await;
        match result {
            Err(CaptureError::AnalysisToolError { detail }) => {
                assert!(detail.contains("boom"), "detail was: {detail}");
            }
            other => panic!("expected AnalysisToolError, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_invocation_returns_stdout() {
        let tools = ResolvedTools {
            dumpcap: None,
            tshark: Some("/bin/sh".into()),
        };
        let result = run_analysis_tool(
            &tools,
            vec!["-c".to_string(), "echo summary table".to_string()],
        )
        .await
        .unwrap();
        assert_eq!(result.trim(), "summary table");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_over_cap_kills_child_promptly() {
        // endless output hits the cap almost immediately, the child must be killed then rather
        // than left to stall the invocation until the wall clock timeout
        let tools = ResolvedTools {
            dumpcap: None,
            tshark: Some("/bin/sh".into()),
        };
        let started = std::time::Instant::now();
        let result = run_analysis_tool_with_cap(
            &tools,
            vec!["-c".to_string(), "while :; do echo xxxxxxxxxxxxxxxx; done".to_string()],
            1024,
        )
        .await;
        match result {
            Err(CaptureError::AnalysisToolError { detail }) => {
                assert!(detail.contains("cap"), "detail was: {detail}");
            }
            other => panic!("expected AnalysisToolError, got {other:?}"),
        }
        assert!(started.elapsed() < ANALYSIS_TIMEOUT);
    }

    #[test]
    fn test_http_field_extract_arg_order() {
        let args = vec_path_args(Path::new("/tmp/t.pcapng"), &["-Y", "http"]);
        assert_eq!(args[0], "-r");
        assert_eq!(args[1], "/tmp/t.pcapng");
        assert_eq!(args[2], "-Y");
    }
}
