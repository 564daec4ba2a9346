//! Crash-safe replacement of ebook files
//!
//! New container bytes are written to a temporary sibling of the target. The
//! sibling is moved over the original only once it is complete and non-empty;
//! on any failure the temporary file is removed and the original is untouched.

use crate::error::{Result, WriteError};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Write a replacement for `target` through `write`, then move it into place
pub fn replace_atomically<F>(target: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    // Dropping the temp file on an error path deletes it
    let mut temp = tempfile::Builder::new()
        .prefix(".ebookmeta-")
        .suffix(".tmp")
        .tempfile_in(dir)?;

    write(temp.as_file_mut())?;

    let file = temp.as_file_mut();
    file.flush()?;
    file.sync_all()?;

    if file.metadata()?.len() == 0 {
        tracing::warn!("Discarding empty replacement for {:?}", target);
        return Err(WriteError::EmptyOutput(target.display().to_string()).into());
    }

    // Temp files are created owner-only; the replacement keeps the original mode
    if let Ok(existing) = std::fs::metadata(target) {
        file.set_permissions(existing.permissions())?;
    }

    temp.persist(target).map_err(|e| WriteError::Persist {
        path: target.display().to_string(),
        reason: e.error.to_string(),
    })?;

    tracing::debug!("Replaced {:?}", target);
    Ok(())
}
