//! Whole-file replacement that readers never observe half-written.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

/// Write `contents` to `path` via a sibling temp file and a rename.
///
/// The temp file lives in the same directory so the rename stays on one
/// filesystem. Concurrent writers to the same path race last-rename-wins.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp = temp_sibling(path)?;

    if let Err(e) = fs::write(&tmp, contents).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// Remove `path`, treating an already-missing file as success.
pub async fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn temp_sibling(path: &Path) -> io::Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "path has no file name")
    })?;
    let tmp_name = format!(".{}.{}.tmp", name.to_string_lossy(), uuid::Uuid::new_v4());
    Ok(path.with_file_name(tmp_name))
}
