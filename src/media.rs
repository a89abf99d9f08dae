//! Media injection pipeline.
//!
//! Copies auxiliary files into a private staging directory and repacks
//! them into a boot medium: either appended to an existing compressed
//! initrd (a fresh gzip member concatenated onto the archive, which the
//! kernel reads as one logical stream) or packed into a newly built
//! ISO-9660 image. The staging directory is removed on every exit path;
//! the produced artifact is handed back to the caller, who owns its
//! lifecycle afterward.
//!
//! The initrd path is a serialized three-stage pipe chain: enumerate the
//! staged files null-separated, archive them with `cpio` in newc format,
//! compress with `gzip`. Each stage's output is captured and fed to the
//! next over stdin, so no two subprocesses ever run concurrently.

use std::fs::{self, OpenOptions};
use std::io::Write;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;
use which::which;

use crate::error::VirtstageError;
use crate::executor::{CommandExecutor, CommandSpec};

/// ISO-9660 builders, in preference order. virt-install's historical
/// fallback chain; all three accept mkisofs-style arguments.
const ISO_TOOLS: &[&str] = &["xorrisofs", "genisoimage", "mkisofs"];

/// A file to copy into generated boot media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Injection {
    /// Source file on the host.
    pub path: Utf8PathBuf,
    /// Destination name inside the medium; defaults to the source file's
    /// base name.
    #[serde(default)]
    pub name: Option<String>,
}

impl Injection {
    /// Creates an injection keeping the source's base name.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: None,
        }
    }

    /// Creates an injection with an explicit destination name.
    pub fn named(path: impl Into<Utf8PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: Some(name.into()),
        }
    }

    /// Resolves the destination file name inside the medium.
    pub fn destination_name(&self) -> Result<String, VirtstageError> {
        match &self.name {
            Some(name) if !name.is_empty() => Ok(name.clone()),
            _ => self
                .path
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| {
                    VirtstageError::Validation(format!(
                        "injection source '{}' has no file name to derive a destination from",
                        self.path
                    ))
                }),
        }
    }
}

/// Appends the injection files to an existing gzip-compressed cpio initrd,
/// in place.
///
/// Produces a new gzip member from a staging directory and concatenates
/// it onto the archive file; multi-member gzip concatenation is valid for
/// the initramfs consumer. The original `initrd` file is mutated in
/// place, no new file is created.
pub fn inject_into_initrd(
    initrd: &Utf8Path,
    injections: &[Injection],
    scratch_dir: &Utf8Path,
    executor: &dyn CommandExecutor,
) -> Result<()> {
    let staging = create_staging_dir(scratch_dir)?;
    let result = (|| -> Result<()> {
        stage_injections(&staging, injections)?;

        let file_list = null_separated_file_list(&staging)?;
        let cpio_spec = CommandSpec::new(
            "cpio",
            vec![
                "--null".to_string(),
                "--create".to_string(),
                "--format=newc".to_string(),
                "--owner=0:0".to_string(),
                "--quiet".to_string(),
            ],
        )
        .with_cwd(staging.clone())
        .with_stdin(file_list);
        let archive = run_captured(executor, &cpio_spec)?;

        let gzip_spec = CommandSpec::new("gzip", Vec::new()).with_stdin(archive);
        let compressed = run_captured(executor, &gzip_spec)?;

        append_to_file(initrd, &compressed)?;
        debug!("appended {} injected file(s) to {}", injections.len(), initrd);
        Ok(())
    })();
    remove_staging_dir(&staging);
    result
}

/// Builds a new ISO-9660 image (Rock Ridge + Joliet, UTF-8 charset) from
/// the injection files and returns its path.
///
/// The image lands in `scratch_dir` under a unique name. On packaging
/// failure the partially written image is deleted before the error
/// propagates; on success the caller owns the returned file and is
/// responsible for its eventual deletion.
pub fn inject_into_new_iso(
    injections: &[Injection],
    scratch_dir: &Utf8Path,
    executor: &dyn CommandExecutor,
) -> Result<Utf8PathBuf> {
    let staging = create_staging_dir(scratch_dir)?;
    let iso_path = scratch_dir.join(format!("injection-{}.iso", Uuid::new_v4()));
    let result = (|| -> Result<Utf8PathBuf> {
        stage_injections(&staging, injections)?;

        let spec = CommandSpec::new(
            iso_tool(),
            vec![
                "-o".to_string(),
                iso_path.to_string(),
                "-r".to_string(),
                "-J".to_string(),
                "-input-charset".to_string(),
                "utf8".to_string(),
                staging.to_string(),
            ],
        );
        let result = executor.execute(&spec)?;
        if !result.success() {
            let err = result.into_execution_error(&spec);
            if let Err(e) = fs::remove_file(&iso_path)
                && e.kind() != std::io::ErrorKind::NotFound
            {
                warn!("failed to remove partial ISO {}: {}", iso_path, e);
            }
            return Err(err.into());
        }
        debug!("built injection ISO {}", iso_path);
        Ok(iso_path.clone())
    })();
    remove_staging_dir(&staging);
    result
}

/// Picks the first available ISO builder on PATH. When none is found the
/// first candidate is returned anyway, so the executor surfaces the
/// command-not-found error with the usual diagnostics.
fn iso_tool() -> &'static str {
    ISO_TOOLS
        .iter()
        .find(|tool| which(tool).is_ok())
        .copied()
        .unwrap_or(ISO_TOOLS[0])
}

/// Creates a uniquely named staging directory under the scratch directory.
fn create_staging_dir(scratch_dir: &Utf8Path) -> Result<Utf8PathBuf, VirtstageError> {
    let staging = scratch_dir.join(format!("staging-{}", Uuid::new_v4()));
    fs::create_dir_all(&staging).map_err(|e| {
        VirtstageError::io(format!("failed to create staging directory: {}", staging), e)
    })?;
    Ok(staging)
}

/// Copies every injection into the staging directory under its resolved
/// destination name.
fn stage_injections(staging: &Utf8Path, injections: &[Injection]) -> Result<(), VirtstageError> {
    for injection in injections {
        let dest = staging.join(injection.destination_name()?);
        fs::copy(&injection.path, &dest).map_err(|e| {
            VirtstageError::io(format!("failed to copy injection file: {}", injection.path), e)
        })?;
    }
    Ok(())
}

/// Removes the staging directory, best effort. Runs on every exit path;
/// a failure here must not mask the pipeline's own result.
fn remove_staging_dir(staging: &Utf8Path) {
    if let Err(e) = fs::remove_dir_all(staging)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!("failed to remove staging directory {}: {}", staging, e);
    }
}

/// Enumerates the staging tree as null-separated, `./`-relative paths,
/// the same shape `find . -print0` would emit for the cpio archiver.
fn null_separated_file_list(staging: &Utf8Path) -> Result<Vec<u8>, VirtstageError> {
    let mut list = Vec::new();
    list.extend_from_slice(b".\0");
    for entry in WalkDir::new(staging).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let context = format!("failed to walk staging directory: {}", staging);
            match e.into_io_error() {
                Some(io_err) => VirtstageError::io(context, io_err),
                None => VirtstageError::Validation(context),
            }
        })?;
        let relative = entry
            .path()
            .strip_prefix(staging)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .into_owned();
        list.extend_from_slice(b"./");
        list.extend_from_slice(relative.as_bytes());
        list.push(0);
    }
    Ok(list)
}

/// Runs a pipeline stage, returning its captured stdout or an
/// `Execution` error carrying the command line and captured stderr.
fn run_captured(executor: &dyn CommandExecutor, spec: &CommandSpec) -> Result<Vec<u8>> {
    let result = executor.execute(spec)?;
    if !result.success() {
        return Err(result.into_execution_error(spec).into());
    }
    Ok(result.stdout)
}

/// Appends bytes to an existing file.
fn append_to_file(path: &Utf8Path, bytes: &[u8]) -> Result<(), VirtstageError> {
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| VirtstageError::io(format!("failed to open initrd for append: {}", path), e))?;
    file.write_all(bytes)
        .map_err(|e| VirtstageError::io(format!("failed to append to initrd: {}", path), e))
}
