use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::Instant;

use crate::CaptureError;

/// How long to sit between size polls.
const POLL_INTERVAL: Duration = Duration::from_millis(150);
/// A pcapng section header alone is around this size, anything at or below it is treated as not
/// yet written rather than a finished capture.
const MIN_STABLE_SIZE: u64 = 32;
/// Consecutive identical size readings required before the file counts as stable.
const STABLE_POLLS: u32 = 2;

/// Wait for a file being written by another process to stop growing. The file may not exist yet
/// when polling starts - the capture child launches asynchronously - and a bare existence check
/// would race with partial writes, so stability is inferred from the size staying identical
/// across consecutive polls once past the header threshold. On success the path is canonicalised
/// so the analysis tool runs against the real file, not a symlink.
pub async fn await_stable(path: &Path, timeout: Duration) -> Result<PathBuf, CaptureError> {
    let deadline = Instant::now() + timeout;
    let mut last_size: Option<u64> = None;
    let mut stable_count = 0;
    loop {
        if let Ok(metadata) = tokio::fs::metadata(path).await {
            let size = metadata.len();
            if size > MIN_STABLE_SIZE {
                if Some(size) == last_size {
                    stable_count += 1;
                    if stable_count >= STABLE_POLLS {
                        let real = tokio::fs::canonicalize(path)
                            .await
                            .map_err(|_| CaptureError::file_not_ready(path))?;
                        tracing::debug!("capture file stable at {} bytes: {:?}", size, real);
                        return Ok(real);
                    }
                } else {
                    last_size = Some(size);
                    stable_count = 0;
                }
            }
        }
        if Instant::now() > deadline {
            tracing::warn!("capture file did not stabilise in time: {:?}", path);
            return Err(CaptureError::file_not_ready(path));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
