use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Write `body` to `path` on a detached task, then read it back and log the
/// result. The caller gets no result and no error: failures are logged here
/// and go no further.
pub fn dispatch_snapshot(path: PathBuf, body: String) -> JoinHandle<()> {
    info!("Snapshot of {} bytes dispatched to {}", body.len(), path.display());
    tokio::spawn(async move {
        if let Err(e) = write_and_verify(&path, &body).await {
            error!("Background snapshot to {} failed: {}", path.display(), e);
        }
    })
}

async fn write_and_verify(path: &Path, body: &str) -> std::io::Result<()> {
    tokio::fs::write(path, body).await?;
    info!("Snapshot written: {}", path.display());
    let read_back = tokio::fs::read_to_string(path).await?;
    info!("Snapshot read back: {} bytes", read_back.len());
    Ok(())
}

/// Give outstanding background tasks up to `grace` to finish before the
/// runtime shuts down. Whatever is still running afterwards is abandoned.
pub async fn drain(handles: Vec<JoinHandle<()>>, grace: Duration) {
    if handles.is_empty() {
        return;
    }
    let pending = handles.len();
    let all = futures::future::join_all(handles);
    if tokio::time::timeout(grace, all).await.is_err() {
        warn!(
            "{} background task(s) still running after {}ms, abandoning",
            pending,
            grace.as_millis()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_lands_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let handle = dispatch_snapshot(path.clone(), r#"{"success":true}"#.into());
        handle.await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"{"success":true}"#);
    }

    #[tokio::test]
    async fn failure_stays_inside_the_task() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("report.json");
        let handle = dispatch_snapshot(path.clone(), "{}".into());
        // The task completes normally; the write error is only logged.
        assert!(handle.await.is_ok());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn drain_waits_for_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        let handles = vec![dispatch_snapshot(path.clone(), "[]".into())];
        drain(handles, Duration::from_secs(5)).await;
        assert!(path.exists());
    }

    #[tokio::test]
    async fn drain_gives_up_after_grace() {
        let slow = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        let started = std::time::Instant::now();
        drain(vec![slow], Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
