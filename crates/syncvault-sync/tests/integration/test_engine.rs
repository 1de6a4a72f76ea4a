//! End-to-end sync runs against temporary directory trees

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use syncvault_core::domain::{CancellationHandle, ProfileStatus};
use syncvault_core::ports::LogLevel;

use crate::common::{self, Workspace};

// ============================================================================
// Basic runs
// ============================================================================

#[tokio::test]
async fn test_first_run_mirrors_source() {
    let mut ws = Workspace::new();
    ws.write_source("a.txt", "alpha");
    ws.write_source("nested/deep/b.txt", "beta");

    let result = ws.sync().await;

    assert!(result.success);
    assert_eq!(result.files_processed, 2);
    assert_eq!(result.files_backed_up, 0);
    assert_eq!(result.files_failed, 0);
    assert_eq!(ws.read_dest("a.txt"), "alpha");
    assert_eq!(ws.read_dest("nested/deep/b.txt"), "beta");
    assert!(ws.backups().is_dir());
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let mut ws = Workspace::new();
    ws.write_source("a.txt", "alpha");
    ws.write_source("b.txt", "beta");
    ws.write_source("sub/c.txt", "gamma");
    ws.sync().await;

    let result = ws.sync().await;

    assert!(result.success);
    assert_eq!(result.files_processed, 0);
    assert_eq!(result.files_skipped, 3);
    assert!(common::tree(&ws.backups()).is_empty());
}

#[tokio::test]
async fn test_empty_source_succeeds() {
    let mut ws = Workspace::new();

    let result = ws.sync().await;

    assert!(result.success);
    assert_eq!(result.files_seen(), 0);
    assert!(ws.dest().is_dir());
}

#[tokio::test]
async fn test_missing_source_touches_nothing() {
    let mut ws = Workspace::new();
    std::fs::remove_dir(ws.source()).unwrap();

    let result = ws.sync().await;

    assert!(!result.success);
    assert!(result.error.is_some());
    assert!(!ws.dest().exists());
    assert!(!ws.backups().exists());
    assert!(matches!(ws.profile.status(), ProfileStatus::Failed(_)));
}

#[tokio::test]
async fn test_destination_blocked_by_file_is_fatal() {
    let mut ws = Workspace::new();
    ws.write_source("a.txt", "alpha");
    common::write(&ws.dest(), "not a directory");

    let result = ws.sync().await;

    assert!(!result.success);
    assert!(result.error.as_deref().is_some_and(|e| e.contains("Cannot create destination")));
    assert_eq!(result.files_processed, 0);
    assert_eq!(std::fs::read_to_string(ws.dest()).unwrap(), "not a directory");
    assert!(!ws.backups().exists());
    assert!(matches!(ws.profile.status(), ProfileStatus::Failed(_)));
}

// ============================================================================
// Backups and rotation
// ============================================================================

#[tokio::test]
async fn test_overwrite_snapshots_previous_content() {
    let mut ws = Workspace::new().with_retention(2);
    ws.write_source("a.txt", "X");
    ws.write_dest("a.txt", "Y");

    let result = ws.sync().await;

    assert!(result.success);
    assert_eq!(result.files_processed, 1);
    assert_eq!(result.files_backed_up, 1);
    assert_eq!(ws.read_dest("a.txt"), "X");

    let snapshots = ws.snapshots("a.txt").await;
    assert_eq!(snapshots.len(), 1);
    assert_eq!(std::fs::read_to_string(&snapshots[0].path).unwrap(), "Y");
    let name = snapshots[0].path.file_name().unwrap().to_string_lossy();
    assert!(name.starts_with("a_") && name.ends_with(".txt"));

    // Nothing changed, so no new snapshot.
    let result = ws.sync().await;
    assert_eq!(result.files_processed, 0);
    assert_eq!(ws.snapshots("a.txt").await.len(), 1);
}

#[tokio::test]
async fn test_retention_keeps_newest_snapshots() {
    let mut ws = Workspace::new().with_retention(2);
    ws.write_dest("a.txt", "v0");

    for version in 1..=3 {
        ws.write_source("a.txt", &format!("v{version}"));
        let result = ws.sync().await;
        assert_eq!(result.files_backed_up, 1);
        // Snapshot names have one-second resolution.
        tokio::time::sleep(Duration::from_millis(1100)).await;
    }

    let snapshots = ws.snapshots("a.txt").await;
    assert_eq!(snapshots.len(), 2);
    let contents: Vec<String> = snapshots
        .iter()
        .map(|s| std::fs::read_to_string(&s.path).unwrap())
        .collect();
    assert_eq!(contents, vec!["v2", "v1"]);
    assert_eq!(ws.read_dest("a.txt"), "v3");
}

#[tokio::test]
async fn test_backup_failure_does_not_block_overwrite() {
    let mut ws = Workspace::new();
    ws.write_source("a.txt", "new");
    ws.write_dest("a.txt", "old");
    // A plain file where the snapshot folder should go.
    common::write(&ws.backups().join("a.txt"), "in the way");

    let result = ws.sync().await;

    assert!(result.success);
    assert_eq!(result.files_processed, 1);
    assert_eq!(result.files_backed_up, 1);
    assert_eq!(ws.read_dest("a.txt"), "new");
    assert!(ws
        .log
        .messages(LogLevel::Warning)
        .iter()
        .any(|m| m.starts_with("Backup of a.txt failed")));
}

// ============================================================================
// Dry run
// ============================================================================

#[tokio::test]
async fn test_dry_run_changes_nothing_and_predicts_counts() {
    let mut ws = Workspace::new();
    ws.write_source("a.txt", "new");
    ws.write_source("b.txt", "same");
    ws.write_source("sub/c.txt", "fresh");
    ws.write_dest("a.txt", "old");
    ws.write_dest("b.txt", "same");
    let before = common::tree(&ws.dest());

    let dry = ws.dry_run().await;

    assert!(dry.success);
    assert_eq!(common::tree(&ws.dest()), before);
    assert!(!ws.backups().exists());

    let real = ws.sync().await;
    assert_eq!(dry.files_processed, real.files_processed);
    assert_eq!(dry.files_backed_up, real.files_backed_up);
    assert_eq!(dry.files_skipped, real.files_skipped);
    assert_eq!(real.files_processed, 2);
    assert_eq!(real.files_backed_up, 1);
}

#[tokio::test]
async fn test_dry_run_with_missing_destination() {
    let mut ws = Workspace::new();
    ws.write_source("a.txt", "alpha");

    let result = ws.dry_run().await;

    assert!(result.success);
    assert_eq!(result.files_processed, 1);
    assert!(!ws.dest().exists());
}

// ============================================================================
// Exclusions and destination-only files
// ============================================================================

#[tokio::test]
async fn test_excluded_files_are_skipped() {
    let mut ws = Workspace::new();
    ws.profile = ws.profile.clone().with_excludes(["*.log"]);
    ws.write_source("keep.txt", "keep");
    ws.write_source(".syncvault", "marker");
    ws.write_source("download.tmp", "partial");
    ws.write_source("~$report.docx", "lock");
    ws.write_source("SyncManagerBackups/old.txt", "backup");
    ws.write_source("System Volume Information/x", "sys");
    ws.write_source("logs/debug.log", "noise");

    let result = ws.sync().await;

    assert_eq!(result.files_processed, 1);
    assert_eq!(result.files_skipped, 6);
    let copied: Vec<_> = common::tree(&ws.dest()).into_iter().map(|(p, _)| p).collect();
    assert_eq!(copied, vec![std::path::PathBuf::from("keep.txt")]);
}

#[tokio::test]
async fn test_destination_only_files_are_kept() {
    let mut ws = Workspace::new();
    ws.write_source("a.txt", "alpha");
    ws.write_dest("extra.txt", "mine");

    let result = ws.sync().await;

    assert!(result.success);
    assert_eq!(result.destination_only, 1);
    assert_eq!(ws.read_dest("extra.txt"), "mine");
    assert!(ws
        .log
        .messages(LogLevel::Info)
        .iter()
        .any(|m| m.contains("extra.txt")));
}

#[tokio::test]
async fn test_overwrite_keeps_same_named_tmp_file_in_destination() {
    let mut ws = Workspace::new();
    ws.write_source("notes.txt", "new");
    ws.write_dest("notes.txt", "old");
    ws.write_dest("notes.txt.tmp", "scratch");

    let result = ws.sync().await;

    assert!(result.success);
    assert_eq!(result.files_processed, 1);
    assert_eq!(ws.read_dest("notes.txt"), "new");
    assert_eq!(ws.read_dest("notes.txt.tmp"), "scratch");
    let left: Vec<_> = common::tree(&ws.dest()).into_iter().map(|(p, _)| p).collect();
    assert_eq!(
        left,
        vec![
            std::path::PathBuf::from("notes.txt"),
            std::path::PathBuf::from("notes.txt.tmp"),
        ]
    );
}

#[tokio::test]
async fn test_backup_root_inside_destination_is_not_reported() {
    let mut ws = Workspace::new();
    let root = ws.dest().join("SyncManagerBackups");
    ws.profile = ws.profile.clone().with_backup_root(root);
    ws.write_source("a.txt", "new");
    ws.write_dest("a.txt", "old");

    let result = ws.sync().await;

    assert!(result.success);
    assert_eq!(result.files_backed_up, 1);
    assert_eq!(result.destination_only, 0);
}

// ============================================================================
// Failures and cancellation
// ============================================================================

#[tokio::test]
async fn test_per_file_failure_does_not_stop_run() {
    let mut ws = Workspace::new();
    ws.write_source("a.txt", "alpha");
    ws.write_source("sub/b.txt", "beta");
    ws.write_source("z.txt", "zeta");
    // `sub` is a file in the destination, so `sub/b.txt` cannot be created.
    ws.write_dest("sub", "blocker");

    let result = ws.sync().await;

    assert!(result.success);
    assert_eq!(result.files_failed, 1);
    assert_eq!(result.files_processed, 2);
    assert_eq!(ws.read_dest("z.txt"), "zeta");
    assert_eq!(ws.log.messages(LogLevel::Error).len(), 1);
}

#[tokio::test]
async fn test_cancellation_stops_between_files() {
    let mut ws = Workspace::new();
    for i in 0..10 {
        ws.write_source(&format!("file{i:02}.txt"), "content");
    }
    let cancel = CancellationHandle::new();
    let copies = AtomicU32::new(0);
    let progress = |message: &str| {
        if message.starts_with("Copying") && copies.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
            cancel.cancel();
        }
    };

    let result = ws
        .engine
        .execute(&mut ws.profile, false, &progress, &cancel)
        .await;

    assert!(result.success);
    assert!(result.cancelled);
    assert_eq!(result.files_processed, 3);
    assert_eq!(common::tree(&ws.dest()).len(), 3);
    assert!(!ws.dest().join("file09.txt").exists());
    assert_eq!(ws.profile.status(), &ProfileStatus::Cancelled);
}
