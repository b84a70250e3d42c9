use crate::foundation::core::display_path;
use crate::foundation::error::{OverlordError, OverlordResult};
use std::io;
use std::path::Path;
use std::time::Duration;

/// Bounded retry budget for removing a directory other processes may still hold open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }
}

/// Remove `path` with `remove`, retrying up to `policy.attempts` times with a fixed backoff.
///
/// Returns the number of attempts used. A directory that is already gone counts as removed.
pub fn remove_dir_with_retry<F>(path: &Path, policy: RetryPolicy, mut remove: F) -> OverlordResult<u32>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let attempts = policy.attempts.max(1);
    let mut last_err: Option<io::Error> = None;
    for attempt in 1..=attempts {
        match remove(path) {
            Ok(()) => {
                tracing::info!(path = %display_path(path), attempt, "directory removed");
                return Ok(attempt);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %display_path(path), "directory already absent");
                return Ok(attempt);
            }
            Err(e) => {
                tracing::warn!(
                    path = %display_path(path),
                    attempt,
                    attempts,
                    "directory removal failed: {e}"
                );
                last_err = Some(e);
                if attempt < attempts {
                    std::thread::sleep(policy.backoff);
                }
            }
        }
    }
    let reason = last_err.map(|e| e.to_string()).unwrap_or_default();
    Err(OverlordError::directory_cleanup(format!(
        "'{}' still present after {attempts} attempts: {reason}",
        display_path(path)
    )))
}
