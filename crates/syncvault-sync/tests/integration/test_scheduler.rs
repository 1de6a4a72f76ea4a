//! Scheduler driven by real filesystem changes

use std::sync::Arc;
use std::time::Duration;

use syncvault_core::domain::SyncProfile;
use syncvault_core::ports::MemoryLogSink;
use syncvault_sync::engine::SyncEngine;
use syncvault_sync::scheduler::{SyncScheduler, Trigger};
use tempfile::TempDir;

use crate::common;

#[tokio::test]
async fn test_source_change_runs_sync() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source");
    std::fs::create_dir_all(&source).unwrap();
    let profile = SyncProfile::new("docs", &source, dir.path().join("dest"))
        .unwrap()
        .with_backup_root(dir.path().join("backups"))
        .with_auto_sync(true);

    let engine = Arc::new(SyncEngine::new(Arc::new(MemoryLogSink::new())));
    let (mut scheduler, handle) =
        SyncScheduler::new(vec![profile], engine, Duration::from_millis(300), None);
    let mut reports = scheduler.reports();
    let task = tokio::spawn(scheduler.run());

    tokio::time::sleep(Duration::from_millis(100)).await;
    common::write(&source.join("report.txt"), "quarterly");

    let report = tokio::time::timeout(Duration::from_secs(5), reports.recv())
        .await
        .expect("no run after source change")
        .unwrap();
    assert_eq!(report.trigger, Trigger::Change);
    assert!(report.result.success);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("dest/report.txt")).unwrap(),
        "quarterly"
    );

    handle.shutdown();
    let profiles = task.await.unwrap();
    assert_eq!(profiles.len(), 1);
}
