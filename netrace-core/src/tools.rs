use std::path::{Path, PathBuf};

use netrace_schemas::settings::{DUMPCAP_ENV_VAR, TSHARK_ENV_VAR};

/// Well known install locations for the Wireshark CLI tools, checked in order after the env
/// override. Covers Homebrew on both architectures, the app bundle on macOS and the usual
/// package manager location on Linux.
fn known_paths(name: &str) -> Vec<PathBuf> {
    vec![
        PathBuf::from(format!("/opt/homebrew/bin/{name}")),
        PathBuf::from(format!("/usr/local/bin/{name}")),
        PathBuf::from(format!("/Applications/Wireshark.app/Contents/MacOS/{name}")),
        PathBuf::from(format!("/usr/bin/{name}")),
    ]
}

/// Resolve one external tool: env override first, then the known install locations, then a scan
/// of the process search path. Returns None when nothing is found - in the server this must not
/// crash the process, unavailability is surfaced to callers when they actually try to use the
/// tool.
pub fn resolve_tool(canonical_name: &str, env_var: &str, candidates: &[PathBuf]) -> Option<PathBuf> {
    if let Ok(from_env) = std::env::var(env_var) {
        let p = PathBuf::from(&from_env);
        if p.exists() {
            tracing::debug!("resolved {} from {} override: {:?}", canonical_name, env_var, p);
            return Some(p);
        }
        tracing::warn!("{} is set but {:?} does not exist, ignoring override", env_var, p);
    }
    for candidate in candidates {
        if candidate.exists() {
            tracing::debug!("resolved {} from known path: {:?}", canonical_name, candidate);
            return Some(candidate.clone());
        }
    }
    let path_value = std::env::var("PATH").unwrap_or_default();
    if let Some(found) = search_path(&path_value, canonical_name) {
        tracing::debug!("resolved {} from PATH: {:?}", canonical_name, found);
        return Some(found);
    }
    tracing::warn!(
        "{} not found, set {} or install the Wireshark CLI tools",
        canonical_name,
        env_var
    );
    None
}

/// Scan each directory of a PATH style value for the named executable, first hit wins.
fn search_path(path_value: &str, canonical_name: &str) -> Option<PathBuf> {
    let separator = if cfg!(windows) { ';' } else { ':' };
    for dir in path_value.split(separator) {
        if dir.is_empty() {
            continue;
        }
        let candidate = Path::new(dir).join(canonical_name);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

/// The capture and analysis binaries, resolved once at startup and passed around explicitly.
/// Either may be absent - the pipeline reports `ToolUnavailable` at invocation time rather than
/// refusing to start, so the server still comes up on a host without Wireshark installed.
#[derive(Debug, Clone, Default)]
pub struct ResolvedTools {
    pub dumpcap: Option<PathBuf>,
    pub tshark: Option<PathBuf>,
}

impl ResolvedTools {
    pub fn from_environment() -> Self {
        let dumpcap = resolve_tool("dumpcap", DUMPCAP_ENV_VAR, &known_paths("dumpcap"));
        let tshark = resolve_tool("tshark", TSHARK_ENV_VAR, &known_paths("tshark"));
        Self { dumpcap, tshark }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_env_override_used_when_it_exists() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("faketool");
        File::create(&tool).unwrap();
        std::env::set_var("NETRACE_TEST_FAKETOOL", &tool);
        let resolved = resolve_tool("faketool", "NETRACE_TEST_FAKETOOL", &[]);
        assert_eq!(resolved, Some(tool));
        std::env::remove_var("NETRACE_TEST_FAKETOOL");
    }

    #[test]
    fn test_nonexistent_env_override_falls_through_to_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("othertool");
        File::create(&tool).unwrap();
        std::env::set_var("NETRACE_TEST_MISSING", dir.path().join("not-there"));
        let resolved = resolve_tool("othertool", "NETRACE_TEST_MISSING", &[tool.clone()]);
        assert_eq!(resolved, Some(tool));
        std::env::remove_var("NETRACE_TEST_MISSING");
    }

    #[test]
    fn test_search_path_finds_first_hit() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        File::create(dir_b.path().join("scantool")).unwrap();
        let path_value = format!(
            "{}:{}",
            dir_a.path().display(),
            dir_b.path().display()
        );
        let found = search_path(&path_value, "scantool");
        assert_eq!(found, Some(dir_b.path().join("scantool")));
    }

    #[test]
    fn test_search_path_empty_value() {
        assert_eq!(search_path("", "anything"), None);
    }

    #[test]
    fn test_unresolvable_tool_is_none_not_panic() {
        let resolved = resolve_tool("definitely-not-a-real-tool", "NETRACE_TEST_UNSET", &[]);
        assert!(resolved.is_none());
    }
}
