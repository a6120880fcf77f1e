use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::trace;

#[derive(Debug, PartialEq, Eq)]
struct Snapshot {
    modified: Option<SystemTime>,
    len: u64,
}

async fn snapshot(path: &Path) -> io::Result<Option<Snapshot>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(Snapshot {
            modified: meta.modified().ok(),
            len: meta.len(),
        })),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Polls `path` every `interval` until two consecutive polls observe the same
/// modification time and length.
///
/// Returns `Ok(false)` if the file disappears while being polled. There is no
/// overall timeout: a file that keeps changing keeps this future pending.
pub async fn wait_for_write_complete(path: &Path, interval: Duration) -> io::Result<bool> {
    let Some(mut previous) = snapshot(path).await? else {
        return Ok(false);
    };

    loop {
        tokio::time::sleep(interval).await;
        let Some(current) = snapshot(path).await? else {
            return Ok(false);
        };
        if current == previous {
            return Ok(true);
        }
        trace!(path = %path.display(), "file still changing");
        previous = current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn settled_file_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("done.mkv");
        std::fs::write(&path, b"frames").unwrap();

        let stable = wait_for_write_complete(&path, Duration::from_millis(10))
            .await
            .unwrap();

        assert!(stable);
    }

    #[tokio::test]
    async fn missing_file_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let stable = wait_for_write_complete(&dir.path().join("gone.mkv"), Duration::from_millis(10))
            .await
            .unwrap();
        assert!(!stable);
    }

    #[tokio::test]
    async fn waits_while_file_grows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("growing.mkv");
        std::fs::write(&path, b"").unwrap();

        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            for _ in 0..5 {
                tokio::time::sleep(Duration::from_millis(30)).await;
                let mut file = std::fs::OpenOptions::new()
                    .append(true)
                    .open(&writer_path)
                    .unwrap();
                file.write_all(b"chunk").unwrap();
            }
        });

        let started = std::time::Instant::now();
        let stable = wait_for_write_complete(&path, Duration::from_millis(50))
            .await
            .unwrap();
        writer.await.unwrap();

        assert!(stable);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 25);
    }
}
