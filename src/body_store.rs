//! Filesystem body store (component B). Generalizes the teacher's direct
//! `fs::write` in `storage/filesystem.rs::put_object` into the atomic
//! temp-then-rename contract spec.md §4.2 requires.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Writes `data` to `path` atomically: parent directories are created,
/// the body lands at `path.tmp` first, is fsync'd and closed, then
/// renamed onto `path`. The temp file is removed on any failure.
pub async fn write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let tmp_path = tmp_path_for(path);
    match write_tmp_and_rename(path, &tmp_path, data).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&tmp_path).await;
            Err(e)
        }
    }
}

async fn write_tmp_and_rename(path: &Path, tmp_path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp_path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(tmp_path, path).await?;
    Ok(())
}

pub async fn open(path: &Path) -> std::io::Result<fs::File> {
    fs::File::open(path).await
}

/// Missing files are not an error: removal is always best-effort.
pub async fn remove(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("failed to remove cache body {:?}: {}", path, e);
        }
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
