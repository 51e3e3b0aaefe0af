#![cfg(unix)]

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use geocolor::lock::{LockState, PidFileLock, RunLock};
use geocolor::supervisor::Supervisor;
use test_utils::OutputTree;
use tokio::sync::broadcast;

fn shell(script: String) -> Vec<OsString> {
    vec!["-c".into(), script.into()]
}

#[tokio::test]
async fn test_lock_left_by_worker_is_released() {
    let tree = OutputTree::new();
    let lock = Arc::new(PidFileLock::new(tree.lock_path()));
    // The child records its own pid and exits without unlocking
    let script = format!("printf '%s' $$ > '{}'; exit 1", tree.lock_path().display());
    let supervisor = Supervisor::new("sh", shell(script), lock.clone(), Duration::from_millis(10));

    let status = supervisor.run_worker().await.unwrap();

    assert_eq!(status.code(), Some(1));
    assert_eq!(lock.holder().unwrap(), LockState::Free);
}

#[tokio::test]
async fn test_foreign_lock_is_kept() {
    let tree = OutputTree::new();
    tree.write_lock("1");
    let lock = Arc::new(PidFileLock::new(tree.lock_path()));
    let supervisor = Supervisor::new(
        "sh",
        shell("exit 0".to_string()),
        lock.clone(),
        Duration::from_millis(10),
    );

    let status = supervisor.run_worker().await.unwrap();

    assert!(status.success());
    assert_eq!(lock.holder().unwrap(), LockState::Held(1));
}

#[tokio::test]
async fn test_shutdown_stops_loop() {
    let tree = OutputTree::new();
    let counter = tree.base().join("runs");
    let script = format!("echo run >> '{}'", counter.display());
    let lock = Arc::new(PidFileLock::new(tree.lock_path()));
    let supervisor = Supervisor::new("sh", shell(script), lock, Duration::from_millis(50));

    let (tx, rx) = broadcast::channel::<()>(1);
    let handle = tokio::spawn(async move { supervisor.run_forever(rx).await });

    // Let a few workers run, then stop
    tokio::time::sleep(Duration::from_millis(300)).await;
    tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("supervisor did not stop")
        .unwrap();

    let runs = std::fs::read_to_string(&counter).unwrap().lines().count();
    assert!(runs >= 2, "runs = {}", runs);
}
