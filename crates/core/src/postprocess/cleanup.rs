//! Removal of intermediate files.

use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::extractor::is_lock_error;

/// Attempts made for a locked file.
pub const REMOVE_ATTEMPTS: u32 = 3;

/// Delay between attempts on a locked file.
pub const REMOVE_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Delete `path`, retrying while it is locked.
///
/// Returns `Ok(false)` when the file did not exist.
pub async fn remove_with_retry(path: &Path) -> io::Result<bool> {
    remove_with_retry_using(path, REMOVE_ATTEMPTS, REMOVE_RETRY_DELAY).await
}

pub async fn remove_with_retry_using(
    path: &Path,
    attempts: u32,
    delay: Duration,
) -> io::Result<bool> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed intermediate file");
                return Ok(true);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) if is_lock_error(&e) && attempt < attempts => {
                warn!(
                    path = %path.display(),
                    attempt,
                    "File locked, retrying removal"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
