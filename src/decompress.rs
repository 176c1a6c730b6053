use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::Command;

use flate2::read::MultiGzDecoder;

use crate::domain::DecompressorKind;
use crate::error::AssemblyError;
use crate::fs_util;

#[derive(Debug, Clone)]
pub enum Decompressor {
    /// Runs `gunzip -f` on the archive.
    External { gunzip: Option<PathBuf> },
    Builtin,
}

impl Decompressor {
    pub fn new(kind: DecompressorKind) -> Self {
        match kind {
            DecompressorKind::Gunzip => Decompressor::External {
                gunzip: find_in_path("gunzip"),
            },
            DecompressorKind::Builtin => Decompressor::Builtin,
        }
    }

    /// Replaces `archive` with its decompressed contents and returns the new path.
    /// An existing output file is overwritten.
    pub fn decompress(&self, archive: &Path) -> Result<PathBuf, AssemblyError> {
        let output = decompressed_path(archive)?;
        match self {
            Decompressor::External { gunzip } => {
                let gunzip = gunzip
                    .as_ref()
                    .ok_or_else(|| AssemblyError::MissingTool("gunzip".to_string()))?;
                run_cmd(gunzip, &["-f".to_string(), archive.to_string_lossy().to_string()])?;
            }
            Decompressor::Builtin => gunzip_in_process(archive, &output)?,
        }
        tracing::info!(path = %output.display(), "archive decompressed");
        Ok(output)
    }
}

/// Archive path with its `.gz` suffix removed.
pub fn decompressed_path(archive: &Path) -> Result<PathBuf, AssemblyError> {
    let is_gz = archive
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if !is_gz {
        return Err(AssemblyError::Decompression(format!(
            "{} is not a .gz archive",
            archive.display()
        )));
    }
    Ok(archive.with_extension(""))
}

fn gunzip_in_process(archive: &Path, output: &Path) -> Result<(), AssemblyError> {
    let file = File::open(archive).map_err(|err| {
        AssemblyError::Filesystem(format!("open archive {}: {err}", archive.display()))
    })?;
    let mut decoder = MultiGzDecoder::new(BufReader::new(file));

    let mut temp = fs_util::temp_file_beside(output, ".kira-asm-gunzip")?;
    io::copy(&mut decoder, temp.as_file_mut())
        .map_err(|err| AssemblyError::Decompression(err.to_string()))?;
    fs_util::persist(temp, output)?;
    fs::remove_file(archive).map_err(|err| AssemblyError::Filesystem(err.to_string()))?;
    Ok(())
}

fn run_cmd(program: &Path, args: &[String]) -> Result<(), AssemblyError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|err| AssemblyError::Decompression(err.to_string()))?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let message = if stderr.is_empty() {
        format!("command failed: {}", program.display())
    } else {
        stderr
    };
    Err(AssemblyError::Decompression(message))
}

pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}
