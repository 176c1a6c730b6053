use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::AssemblyError;

/// Creates a temp file in the directory that will hold `destination`, so the
/// final rename never crosses filesystems.
pub fn temp_file_beside(destination: &Path, prefix: &str) -> Result<NamedTempFile, AssemblyError> {
    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|err| {
        AssemblyError::Filesystem(format!("create dir {}: {err}", parent.display()))
    })?;
    tempfile::Builder::new()
        .prefix(prefix)
        .tempfile_in(parent)
        .map_err(|err| AssemblyError::Filesystem(err.to_string()))
}

/// Flushes `temp` and renames it over `destination`.
pub fn persist(mut temp: NamedTempFile, destination: &Path) -> Result<(), AssemblyError> {
    temp.as_file_mut()
        .flush()
        .map_err(|err| AssemblyError::Filesystem(err.to_string()))?;
    temp.persist(destination).map_err(|err| {
        AssemblyError::Filesystem(format!("write {}: {}", destination.display(), err.error))
    })?;
    Ok(())
}

/// Replaces `destination` with `contents` in one rename.
pub fn write_atomic(destination: &Path, contents: &[u8]) -> Result<(), AssemblyError> {
    let mut temp = temp_file_beside(destination, ".kira-asm")?;
    temp.write_all(contents)
        .map_err(|err| AssemblyError::Filesystem(err.to_string()))?;
    persist(temp, destination)
}
