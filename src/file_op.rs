//! File system side of the mutating DAV methods

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use actix_web::web;
use futures::StreamExt;
use log::{debug, error, warn};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use crate::errors::RuntimeError;

/// Stream a request body into `file_path`, creating missing parent directories.
///
/// Data goes into a temporary file next to the target first and is renamed into place
/// once complete, so an existing file is replaced in one step.
///
/// Returns total bytes written to file.
pub async fn write_file(mut payload: web::Payload, file_path: &Path) -> Result<u64, RuntimeError> {
    let parent = file_path
        .parent()
        .ok_or_else(|| RuntimeError::Conflict(format!("{} has no parent", file_path.display())))?
        .to_path_buf();

    tokio::fs::create_dir_all(&parent).await.map_err(|e| {
        error!(target: "fs", "Failed to create {}: {e}", parent.display());
        RuntimeError::IoError(format!("Failed to create directory {}", parent.display()), e)
    })?;

    // Tempfile doesn't support async operations, so we'll do it on a background thread.
    let temp_dir = parent.clone();
    let named_temp_file = tokio::task::spawn_blocking(move || NamedTempFile::new_in(temp_dir))
        .await
        .map_err(|e| RuntimeError::Internal(format!("Temporary file task failed: {e}")))?
        .map_err(|e| {
            RuntimeError::IoError(
                format!("Failed to create temporary file in {}", parent.display()),
                e,
            )
        })?;

    let (file, temp_path) = named_temp_file
        .keep()
        .map_err(|err| RuntimeError::IoError("Failed to keep temporary file".into(), err.error))?;
    let mut temp_file = tokio::fs::File::from_std(file);

    let mut written_len = 0;
    let mut write_error = None;
    while let Some(chunk) = payload.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                write_error = Some(RuntimeError::IoError(
                    "Failed to read request body".into(),
                    io::Error::other(e.to_string()),
                ));
                break;
            }
        };
        if let Err(e) = temp_file.write_all(&bytes).await {
            write_error = Some(RuntimeError::IoError("Failed to write to file".into(), e));
            break;
        }
        written_len += bytes.len() as u64;
    }

    if write_error.is_none()
        && let Err(e) = temp_file.flush().await
    {
        write_error = Some(RuntimeError::IoError(
            "Failed to flush all the file writes to disk".into(),
            e,
        ));
    }
    drop(temp_file);

    if let Some(e) = write_error {
        error!(target: "fs", "Writing {} failed: {e}", file_path.display());
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }

    if let Err(err) = tokio::fs::rename(&temp_path, file_path).await {
        error!(target: "fs", "Failed to move {temp_path:?} to {file_path:?}: {err}");
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(RuntimeError::IoError(
            format!("Failed to move temporary file to {}", file_path.display()),
            err,
        ));
    }

    debug!(target: "fs", "Wrote {written_len} bytes to {}", file_path.display());
    Ok(written_len)
}

/// Remove a file, or a directory with everything below it.
pub async fn remove(path: &Path) -> Result<(), RuntimeError> {
    let metadata = tokio::fs::symlink_metadata(path)
        .await
        .map_err(|e| RuntimeError::IoError(format!("Failed to stat {}", path.display()), e))?;

    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    result.map_err(|e| {
        error!(target: "fs", "Failed to delete {}: {e}", path.display());
        RuntimeError::IoError(format!("Failed to delete {}", path.display()), e)
    })
}

/// Copy `from` to `to`, descending into directories. Runs on the blocking pool.
pub async fn copy(from: PathBuf, to: PathBuf) -> Result<(), RuntimeError> {
    if to.starts_with(&from) {
        return Err(RuntimeError::Conflict(format!(
            "cannot copy {} into itself",
            from.display()
        )));
    }

    let (src, dst) = (from.clone(), to.clone());
    web::block(move || copy_recursive(&src, &dst))
        .await
        .map_err(|e| RuntimeError::Internal(format!("Copy task failed: {e}")))?
        .map_err(|e| {
            error!(target: "fs", "Failed to copy {} to {}: {e}", from.display(), to.display());
            RuntimeError::IoError(
                format!("Failed to copy {} to {}", from.display(), to.display()),
                e,
            )
        })
}

fn copy_recursive(from: &Path, to: &Path) -> io::Result<()> {
    if !from.is_dir() {
        std::fs::copy(from, to)?;
        return Ok(());
    }

    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
    }
    Ok(())
}

/// Rename `from` to `to`. No copy fallback, moves across file systems fail.
pub async fn rename(from: &Path, to: &Path) -> Result<(), RuntimeError> {
    tokio::fs::rename(from, to).await.map_err(|e| {
        if e.kind() == ErrorKind::CrossesDevices {
            warn!(target: "fs", "{} and {} are on different file systems", from.display(), to.display());
        }
        error!(target: "fs", "Failed to move {} to {}: {e}", from.display(), to.display());
        RuntimeError::IoError(
            format!("Failed to move {} to {}", from.display(), to.display()),
            e,
        )
    })
}
