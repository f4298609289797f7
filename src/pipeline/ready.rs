//! Readiness probe: wait until a freshly-announced file has settled.
//!
//! A create/rename notification can arrive while the writer is still
//! flushing. The probe polls the file's size on a fixed interval and accepts
//! it once two consecutive polls see the same non-zero size. The number of
//! polls is capped so a file that never settles turns into a defined
//! [`ReadinessError::FileNotReady`] instead of blocking the worker.

use crate::error::ReadinessError;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Poll `path` until its size is stable. Returns the settled size in bytes.
///
/// # Errors
/// * [`ReadinessError::Vanished`]: the file no longer exists; callers drop
///   the event silently.
/// * [`ReadinessError::FileNotReady`]: `max_attempts` polls elapsed without
///   two equal non-zero sizes.
/// * [`ReadinessError::Io`]: `stat` failed for another reason.
pub async fn wait_until_ready(
    path: &Path,
    interval: Duration,
    max_attempts: u32,
) -> Result<u64, ReadinessError> {
    let mut last_len: Option<u64> = None;

    for attempt in 1..=max_attempts {
        sleep(interval).await;

        let len = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ReadinessError::Vanished {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => {
                return Err(ReadinessError::Io {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };

        debug!("{}: poll {}/{} → {} bytes", path.display(), attempt, max_attempts, len);

        if len > 0 && last_len == Some(len) {
            return Ok(len);
        }
        last_len = Some(len);
    }

    Err(ReadinessError::FileNotReady {
        path: path.to_path_buf(),
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TICK: Duration = Duration::from_millis(10);

    #[tokio::test]
    async fn stable_file_is_ready_after_two_polls() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"%PDF-1.7 body").unwrap();

        let len = wait_until_ready(&path, TICK, 5).await.unwrap();
        assert_eq!(len, 13);
    }

    #[tokio::test]
    async fn growing_file_is_ready_once_it_settles() {
        use std::io::Write;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("download.pdf");
        std::fs::write(&path, b"%PDF").unwrap();

        // appends every 15ms, so any two polls 40ms apart see different sizes
        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            for _ in 0..6 {
                sleep(Duration::from_millis(15)).await;
                let mut f = std::fs::OpenOptions::new()
                    .append(true)
                    .open(&writer_path)
                    .unwrap();
                f.write_all(b"0123456789").unwrap();
            }
        });

        let len = wait_until_ready(&path, Duration::from_millis(40), 20)
            .await
            .unwrap();
        writer.await.unwrap();

        assert_eq!(len, 64);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 64);
    }

    #[tokio::test]
    async fn missing_file_is_vanished() {
        let dir = TempDir::new().unwrap();
        let err = wait_until_ready(&dir.path().join("gone.pdf"), TICK, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ReadinessError::Vanished { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn empty_file_exhausts_attempts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.pdf");
        std::fs::write(&path, b"").unwrap();

        let err = wait_until_ready(&path, TICK, 3).await.unwrap_err();
        match err {
            ReadinessError::FileNotReady { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn single_attempt_never_sees_two_equal_sizes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"%PDF").unwrap();

        let err = wait_until_ready(&path, TICK, 1).await.unwrap_err();
        assert!(matches!(err, ReadinessError::FileNotReady { .. }));
    }
}
