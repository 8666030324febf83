//! File system helpers shared by the walker, the runner and the cache

use crate::error::{TestIdError, TestIdResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;

/// Sibling path used while rewriting `path`
pub fn temp_sibling(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replace the contents of `path` without ever writing to it directly
///
/// The new contents go to a temporary sibling first; the original is then removed and
/// the sibling renamed into place.
pub async fn write_replacing(path: &Path, contents: &str) -> TestIdResult<()> {
    let temp = temp_sibling(path);

    fs::write(&temp, contents)
        .await
        .map_err(|e| TestIdError::io("write", &temp, e))?;

    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(TestIdError::io("unlink", path, e)),
    }

    fs::rename(&temp, path)
        .await
        .map_err(|e| TestIdError::io("rename", &temp, e))?;

    Ok(())
}

/// Modification time of `path` in epoch milliseconds
pub async fn modified_millis(path: &Path) -> TestIdResult<i64> {
    let metadata = fs::metadata(path)
        .await
        .map_err(|e| TestIdError::io("get stat for", path, e))?;
    metadata_millis(path, &metadata)
}

pub(crate) fn metadata_millis(path: &Path, metadata: &std::fs::Metadata) -> TestIdResult<i64> {
    let modified = metadata
        .modified()
        .map_err(|e| TestIdError::io("get modification time for", path, e))?;
    let millis = match modified.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_millis() as i64,
        Err(before_epoch) => -(before_epoch.duration().as_millis() as i64),
    };
    Ok(millis)
}
