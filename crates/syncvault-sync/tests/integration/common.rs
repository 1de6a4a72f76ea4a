//! Shared fixtures for the integration tests

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use syncvault_core::domain::{CancellationHandle, SyncProfile, SyncResult};
use syncvault_core::ports::{MemoryLogSink, NoProgress};
use syncvault_sync::backup::{BackupManager, Snapshot};
use syncvault_sync::engine::SyncEngine;
use tempfile::TempDir;

/// A source tree, a destination tree and a backup root under one temp dir
pub struct Workspace {
    pub dir: TempDir,
    pub profile: SyncProfile,
    pub log: Arc<MemoryLogSink>,
    pub engine: SyncEngine,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let source = dir.path().join("source");
        std::fs::create_dir_all(&source).unwrap();
        let profile = SyncProfile::new("docs", source, dir.path().join("dest"))
            .unwrap()
            .with_backup_root(dir.path().join("backups"));
        let log = Arc::new(MemoryLogSink::new());
        let engine = SyncEngine::new(log.clone());
        Self {
            dir,
            profile,
            log,
            engine,
        }
    }

    pub fn with_retention(mut self, retention: u32) -> Self {
        self.profile = self.profile.with_retention(retention).unwrap();
        self
    }

    pub fn source(&self) -> PathBuf {
        self.profile.source().to_path_buf()
    }

    pub fn dest(&self) -> PathBuf {
        self.profile.destination().to_path_buf()
    }

    pub fn backups(&self) -> PathBuf {
        self.dir.path().join("backups")
    }

    pub fn write_source(&self, rel: &str, content: &str) {
        write(&self.source().join(rel), content);
    }

    pub fn write_dest(&self, rel: &str, content: &str) {
        write(&self.dest().join(rel), content);
    }

    pub fn read_dest(&self, rel: &str) -> String {
        std::fs::read_to_string(self.dest().join(rel)).unwrap()
    }

    pub async fn sync(&mut self) -> SyncResult {
        self.run(false).await
    }

    pub async fn dry_run(&mut self) -> SyncResult {
        self.run(true).await
    }

    async fn run(&mut self, dry_run: bool) -> SyncResult {
        self.engine
            .execute(
                &mut self.profile,
                dry_run,
                &NoProgress,
                &CancellationHandle::new(),
            )
            .await
    }

    /// Snapshots of `file_name`, newest first
    pub async fn snapshots(&self, file_name: &str) -> Vec<Snapshot> {
        let folder = BackupManager::new(self.backups()).folder_for(OsStr::new(file_name));
        BackupManager::list_snapshots(&folder).await.unwrap()
    }
}

pub fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Recursive listing of `root` as sorted (relative path, content) pairs
pub fn tree(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<(PathBuf, Vec<u8>)>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                out.push((rel, std::fs::read(&path).unwrap()));
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}
