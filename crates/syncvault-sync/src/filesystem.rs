//! Local filesystem helpers used by the engine and the backup manager
//!
//! ## Design Decisions
//!
//! - **Atomic copies**: content is copied to a temporary sibling and renamed
//!   over the target, so a crash never leaves a half-written destination file.
//!   The sibling gets a fresh hidden name opened with `create_new`, so a user
//!   file that happens to share a name is never clobbered.
//! - **Deterministic enumeration**: directory entries are sorted by name so a
//!   run always visits files in the same order.
//! - **Symlinks are not followed**: they are logged and left out of the walk.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

/// Suffix of in-flight copies; matched by the built-in `.tmp` exclusion.
const TMP_SUFFIX: &str = ".syncvault.tmp";

/// Distinguishes temporary siblings created by this process.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Lists every regular file under `root`, as paths relative to `root`.
///
/// # Errors
/// Returns the first I/O error hit while reading a directory.
#[instrument(fields(root = %root.display()))]
pub async fn enumerate_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk_directory(root, Path::new(""), &mut files).await?;
    debug!(count = files.len(), "enumeration complete");
    Ok(files)
}

/// Recursively collects files under `root.join(relative)`.
fn walk_directory<'a>(
    root: &'a Path,
    relative: &'a Path,
    files: &'a mut Vec<PathBuf>,
) -> Pin<Box<dyn Future<Output = std::io::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = tokio::fs::read_dir(root.join(relative)).await?;
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            children.push(entry);
        }
        children.sort_by_key(|entry| entry.file_name());

        for entry in children {
            let child = relative.join(entry.file_name());
            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                walk_directory(root, &child, files).await?;
            } else if file_type.is_file() {
                files.push(child);
            } else {
                debug!(path = %child.display(), "Skipping non-regular file");
            }
        }

        Ok(())
    })
}

/// Creates `dir` and all missing parents.
pub async fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await
}

/// Copies `source` over `target` via a temporary sibling and a rename.
///
/// The parent directory of `target` must already exist. Returns the number
/// of bytes copied. The source's permissions are carried over.
#[instrument(fields(source = %source.display(), target = %target.display()))]
pub async fn copy_atomic(source: &Path, target: &Path) -> std::io::Result<u64> {
    let mut reader = File::open(source).await?;
    let permissions = reader.metadata().await?.permissions();

    let (tmp_path, mut writer) = create_tmp_sibling(target).await?;
    debug!(?tmp_path, "copying to temporary file");

    let copied = async {
        let bytes = tokio::io::copy(&mut reader, &mut writer).await?;
        writer.flush().await?;
        writer.sync_all().await?;
        drop(writer);
        tokio::fs::set_permissions(&tmp_path, permissions).await?;
        tokio::fs::rename(&tmp_path, target).await?;
        Ok::<u64, std::io::Error>(bytes)
    }
    .await;

    match copied {
        Ok(bytes) => {
            debug!(bytes, "copy complete");
            Ok(bytes)
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            Err(e)
        }
    }
}

/// Returns true for the temporary sibling of a copy that has not been renamed yet.
pub fn is_in_flight_copy(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().ends_with(TMP_SUFFIX))
}

/// Creates a new, previously non-existent file next to `target`.
async fn create_tmp_sibling(target: &Path) -> std::io::Result<(PathBuf, File)> {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    loop {
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = target.with_file_name(format!(
            ".{name}.{}-{n}{TMP_SUFFIX}",
            std::process::id()
        ));
        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
}
