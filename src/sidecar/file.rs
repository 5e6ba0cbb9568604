//! Config file reads and atomic replaces.

use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

/// Reads the whole config file as text.
pub async fn read_config_file(path: &Path) -> io::Result<String> {
    tokio::fs::read_to_string(path).await
}

/// Returns the sibling temp path used while replacing `path`.
pub fn temp_path_for(path: &Path) -> io::Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("config path {:?} has no file name", path),
        )
    })?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    Ok(dir.join(format!(".{}.tmp", name.to_string_lossy())))
}

/// Follows symlinks to the file that actually holds the config.
///
/// A path that does not exist yet is returned unchanged.
pub async fn resolve_target(path: &Path) -> io::Result<PathBuf> {
    match tokio::fs::canonicalize(path).await {
        Ok(target) => Ok(target),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(path.to_path_buf()),
        Err(e) => Err(e),
    }
}

/// Replaces the file at `path` with `content`.
///
/// The content is written and synced to a sibling temp file which is then
/// renamed over `path`, so readers see either the old or the new file, never
/// a truncated one. The existing file's permissions are carried over. If
/// `path` is a symlink the link is kept and its target is replaced.
pub async fn write_config_file(path: &Path, content: &str) -> io::Result<()> {
    let target = resolve_target(path).await?;
    let temp_path = temp_path_for(&target)?;

    let result = write_then_rename(&target, &temp_path, content).await;
    if result.is_err() {
        // Only clean up a regular file we may have left behind.
        if let Ok(meta) = tokio::fs::symlink_metadata(&temp_path).await {
            if meta.is_file() {
                let _ = tokio::fs::remove_file(&temp_path).await;
            }
        }
    }
    result
}

async fn write_then_rename(path: &Path, temp_path: &Path, content: &str) -> io::Result<()> {
    let mut file = tokio::fs::File::create(temp_path).await?;
    file.write_all(content.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);

    if let Ok(meta) = tokio::fs::metadata(path).await {
        tokio::fs::set_permissions(temp_path, meta.permissions()).await?;
    }

    tokio::fs::rename(temp_path, path).await
}

/// Computes the SHA256 hash of the given content.
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
