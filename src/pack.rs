//! Building self-extracting artifacts.
//!
//! An artifact is a POSIX shell stub, the marker line, and a gzip-compressed
//! tar of the source directory, concatenated into one executable file. The
//! stub lets the artifact run on a machine without `sfx`; `sfx run` ignores
//! it and only looks for the marker line.

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::pipeline::{find_marker, resolve_installer, validate_marker};
use crate::{FailureKind, LaunchError, PackOptions};

/// Result of a successful [`pack`].
#[derive(Debug, Clone, Serialize)]
pub struct PackReport {
    /// The artifact that was written.
    pub output: PathBuf,
    /// One-based line number of the marker line.
    pub marker_line: u64,
    /// Byte offset of the first payload byte.
    pub payload_offset: u64,
    /// Total artifact size in bytes.
    pub size: u64,
}

fn pack_error(context: &str, error: impl std::fmt::Display) -> LaunchError {
    LaunchError::Pack {
        message: format!("{context}: {error}"),
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn writes_into(output: &Path, source_dir: &Path) -> bool {
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (fs::canonicalize(parent), fs::canonicalize(source_dir)) {
        (Ok(parent), Ok(source)) => parent.starts_with(source),
        _ => false,
    }
}

/// Append every top-level entry of `source_dir` under its own name, so the
/// archive has no `.` root entry. Returns the number of top-level entries.
fn append_contents<W: Write>(
    builder: &mut tar::Builder<W>,
    source_dir: &Path,
) -> io::Result<usize> {
    let mut children = fs::read_dir(source_dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    children.sort();

    for child in &children {
        let Some(name) = child.file_name() else {
            continue;
        };
        let metadata = fs::symlink_metadata(child)?;
        if metadata.is_dir() {
            builder.append_dir_all(name, child)?;
        } else {
            builder.append_path_with_name(child, name)?;
        }
    }
    Ok(children.len())
}

/// Render the shell stub, ending with the marker line.
///
/// The stub performs the same pipeline as `sfx run` with standard tools
/// (`awk`, `tail`, `tar`, `mktemp`) and exits with the same category codes.
pub fn stub_script(marker: &str, installer_name: &str) -> String {
    format!(
        r#"#!/bin/sh
# Self-extracting installer, packed by sfx {version}.
# Everything after the marker line is a gzip-compressed tar archive.
SFX_MARKER={marker_q}
SFX_INSTALLER={installer_q}
export SFX_MARKER

ARCHIVE_LINE=$(awk '$0 == ENVIRON["SFX_MARKER"] {{ print NR + 1; exit }}' "$0")
if [ -z "$ARCHIVE_LINE" ]; then
    echo "$0: payload marker not found" >&2
    exit {locate}
fi

SCRATCH=$(mktemp -d "${{TMPDIR:-/tmp}}/sfx.XXXXXX") || exit {scratch}
trap 'rm -rf "$SCRATCH"' EXIT
trap 'exit {interrupted}' INT TERM

if ! tail -n +"$ARCHIVE_LINE" "$0" | tar -xzf - -C "$SCRATCH"; then
    echo "$0: payload extraction failed" >&2
    exit {extraction}
fi
if [ ! -x "$SCRATCH/$SFX_INSTALLER" ]; then
    echo "$0: $SFX_INSTALLER missing from payload" >&2
    exit {missing}
fi

(cd "$SCRATCH" && "./$SFX_INSTALLER" "$@")
exit $?

{marker}
"#,
        version = env!("CARGO_PKG_VERSION"),
        marker_q = shell_quote(marker),
        installer_q = shell_quote(installer_name),
        locate = FailureKind::Locate.exit_code(),
        scratch = FailureKind::Scratch.exit_code(),
        interrupted = FailureKind::Interrupted.exit_code(),
        extraction = FailureKind::Extraction.exit_code(),
        missing = FailureKind::InstallerMissing.exit_code(),
    )
}

fn write_artifact(
    output: &Path,
    stub: &str,
    source_dir: &Path,
    compression: u32,
) -> Result<usize, LaunchError> {
    let file = File::create(output).map_err(|e| pack_error(&output.display().to_string(), e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(stub.as_bytes())
        .map_err(|e| pack_error("writing stub", e))?;

    let encoder = GzEncoder::new(writer, Compression::new(compression));
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    let entries = append_contents(&mut builder, source_dir)
        .map_err(|e| pack_error(&source_dir.display().to_string(), e))?;
    let encoder = builder
        .into_inner()
        .map_err(|e| pack_error("finishing archive", e))?;
    let mut writer = encoder
        .finish()
        .map_err(|e| pack_error("finishing compression", e))?;
    writer.flush().map_err(|e| pack_error("flushing artifact", e))?;
    drop(writer);

    #[cfg(unix)]
    fs::set_permissions(output, fs::Permissions::from_mode(0o755))
        .map_err(|e| pack_error("marking artifact executable", e))?;

    Ok(entries)
}

/// The payload bytes can reproduce the marker line, notably with
/// compression level 0 where file contents are stored verbatim.
fn verify_single_marker(output: &Path, marker: &str) -> Result<(), LaunchError> {
    let file = File::open(output).map_err(|e| pack_error(&output.display().to_string(), e))?;
    let hits = find_marker(BufReader::new(file), marker)
        .map_err(|e| pack_error("verifying artifact", e))?;
    if hits.len() == 1 {
        return Ok(());
    }
    let lines: Vec<u64> = hits.iter().map(|hit| hit.line).collect();
    Err(LaunchError::Pack {
        message: format!(
            "marker {marker:?} occurs on lines {lines:?} of the packed artifact; \
             raise the compression level or choose another marker"
        ),
    })
}

/// Pack `source_dir` into a self-extracting artifact at `output`.
///
/// The directory's contents become the top level of the payload, so
/// `source_dir/installer` is extracted as `installer`.
///
/// # Errors
///
/// - `InvalidMarker` if the marker is unusable
/// - `InstallerMissing` / `InstallerNotExecutable` if the source directory
///   has no executable entry point
/// - `Pack` if the marker collides with a stub line or shows up again in the
///   written payload, and for any other validation or I/O failure; the
///   output file is removed
///
/// # Example
///
/// ```rust,no_run
/// use sfx_installer::{pack, PackOptions};
/// use std::path::Path;
///
/// let report = pack(Path::new("dist"), Path::new("setup.sh"), &PackOptions::default())?;
/// println!("payload at byte {}", report.payload_offset);
/// # Ok::<(), sfx_installer::LaunchError>(())
/// ```
pub fn pack(
    source_dir: &Path,
    output: &Path,
    options: &PackOptions,
) -> Result<PackReport, LaunchError> {
    validate_marker(&options.marker)?;
    if options.compression > 9 {
        return Err(LaunchError::Pack {
            message: format!("compression level {} is out of range 0-9", options.compression),
        });
    }
    if !source_dir.is_dir() {
        return Err(LaunchError::Pack {
            message: format!("{} is not a directory", source_dir.display()),
        });
    }
    resolve_installer(source_dir, &options.installer_name)?;
    if writes_into(output, source_dir) {
        return Err(LaunchError::Pack {
            message: format!(
                "output {} must not be inside the source directory",
                output.display()
            ),
        });
    }

    let stub = stub_script(&options.marker, &options.installer_name);
    let marker_line = stub.lines().count() as u64;
    if let Some(line) = stub
        .lines()
        .take(marker_line as usize - 1)
        .position(|line| line == options.marker)
    {
        return Err(LaunchError::Pack {
            message: format!(
                "marker {:?} equals line {} of the stub; choose a more distinctive marker",
                options.marker,
                line + 1
            ),
        });
    }

    let written = write_artifact(output, &stub, source_dir, options.compression)
        .and_then(|entries| verify_single_marker(output, &options.marker).map(|()| entries));
    let entries = match written {
        Ok(entries) => entries,
        Err(error) => {
            if let Err(e) = fs::remove_file(output) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(output = %output.display(), "Failed to remove partial artifact: {e}");
                }
            }
            return Err(error);
        }
    };

    let size = fs::metadata(output)
        .map_err(|e| pack_error(&output.display().to_string(), e))?
        .len();
    debug!(marker_line, entries, payload_offset = stub.len(), "Wrote artifact stub");
    info!(output = %output.display(), size, "Packed artifact");

    Ok(PackReport {
        output: output.to_path_buf(),
        marker_line,
        payload_offset: stub.len() as u64,
        size,
    })
}
