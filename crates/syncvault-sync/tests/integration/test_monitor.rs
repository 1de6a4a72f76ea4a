//! Change monitor against a real watched directory

use std::time::{Duration, Instant};

use syncvault_core::domain::SyncProfile;
use syncvault_sync::watcher::{ChangeMonitor, SyncRequested};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::common;

const QUIET: Duration = Duration::from_millis(500);
const SLACK: Duration = Duration::from_millis(20);

fn watched_profile(dir: &TempDir) -> SyncProfile {
    let source = dir.path().join("source");
    std::fs::create_dir_all(&source).unwrap();
    SyncProfile::new("docs", source, dir.path().join("dest")).unwrap()
}

/// Lets the OS watch settle before files are touched
async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

async fn expect_none(rx: &mut UnboundedReceiver<SyncRequested>, wait: Duration) {
    let got = tokio::time::timeout(wait, rx.recv()).await;
    assert!(got.is_err(), "unexpected request: {got:?}");
}

#[tokio::test]
async fn test_burst_of_writes_triggers_once() {
    let dir = TempDir::new().unwrap();
    let profile = watched_profile(&dir);
    let (monitor, mut rx) = ChangeMonitor::new(QUIET);
    monitor.start_watching(&profile).unwrap();
    settle().await;

    let mut last_write = Instant::now();
    for i in 0..10 {
        common::write(&profile.source().join(format!("f{i}.txt")), "x");
        last_write = Instant::now();
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let request = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no sync requested")
        .unwrap();
    assert_eq!(request.profile, "docs");
    // Timer and clock granularity differ slightly between platforms.
    assert!(last_write.elapsed() + SLACK >= QUIET);
    assert!(monitor.last_event("docs").is_some());

    expect_none(&mut rx, QUIET * 2).await;
}

#[tokio::test]
async fn test_temporary_files_do_not_trigger() {
    let dir = TempDir::new().unwrap();
    let profile = watched_profile(&dir);
    let (monitor, mut rx) = ChangeMonitor::new(QUIET);
    monitor.start_watching(&profile).unwrap();
    settle().await;

    common::write(&profile.source().join("movie.part"), "x");
    common::write(&profile.source().join("~$report.docx"), "x");
    common::write(&profile.source().join("notes.swp"), "x");

    expect_none(&mut rx, QUIET * 2).await;
    assert!(monitor.last_event("docs").is_none());
}

#[tokio::test]
async fn test_snapshots_under_watched_source_do_not_trigger() {
    let dir = TempDir::new().unwrap();
    let profile = watched_profile(&dir);
    let versions = profile.source().join("versions");
    std::fs::create_dir_all(&versions).unwrap();
    let profile = profile.with_backup_root(versions.clone());
    let (monitor, mut rx) = ChangeMonitor::new(QUIET);
    monitor.start_watching(&profile).unwrap();
    settle().await;

    common::write(&versions.join("a.txt/a_20240101_000000.txt"), "old");

    expect_none(&mut rx, QUIET * 2).await;
    assert!(monitor.last_event("docs").is_none());
}

#[tokio::test]
async fn test_stop_watching_cancels_pending_request() {
    let dir = TempDir::new().unwrap();
    let profile = watched_profile(&dir);
    let (monitor, mut rx) = ChangeMonitor::new(QUIET);
    monitor.start_watching(&profile).unwrap();
    settle().await;

    common::write(&profile.source().join("a.txt"), "x");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(monitor.stop_watching("docs"));

    expect_none(&mut rx, QUIET * 2).await;
}
