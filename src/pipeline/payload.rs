//! Gzip + tar payload extraction.

use super::shutdown::Shutdown;
use crate::LaunchError;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tar::Archive;
use tracing::{debug, warn};

/// What an extraction wrote to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractSummary {
    /// Number of archive entries unpacked (directories included).
    pub entries: usize,
    /// Total size of the unpacked entries as recorded in the archive.
    pub bytes: u64,
}

fn extraction(message: impl Into<String>) -> LaunchError {
    LaunchError::Extraction {
        message: message.into(),
    }
}

fn is_unsafe(path: &Path) -> bool {
    path.components().any(|c| {
        matches!(
            c,
            Component::Prefix(_) | Component::RootDir | Component::ParentDir
        )
    })
}

/// Unpack a gzip-compressed tar stream into `dest`.
///
/// Permission bits are preserved so an executable installer stays
/// executable. `cancel` is checked before each entry. The stream is read to
/// the end so the gzip trailer (CRC32 and length) is verified.
///
/// # Errors
///
/// - `EmptyPayload` if `reader` yields no bytes at all
/// - `Extraction` if the stream is not valid gzip/tar, is truncated, fails
///   its checksum, or contains no entries
/// - `UnsafeEntry` if an entry path is absolute or climbs out of `dest`
/// - `Interrupted` if `cancel` was set
pub fn extract_payload<R: Read>(
    reader: R,
    dest: &Path,
    cancel: &AtomicBool,
) -> Result<ExtractSummary, LaunchError> {
    let mut reader = BufReader::new(reader);
    let has_data = !reader
        .fill_buf()
        .map_err(|e| extraction(format!("cannot read payload: {e}")))?
        .is_empty();
    if !has_data {
        return Err(LaunchError::EmptyPayload);
    }

    let mut archive = Archive::new(GzDecoder::new(reader));
    archive.set_preserve_permissions(true);
    archive.set_preserve_mtime(true);

    let mut summary = ExtractSummary::default();
    let entries = archive
        .entries()
        .map_err(|e| extraction(format!("cannot read archive: {e}")))?;

    for entry in entries {
        if cancel.load(Ordering::SeqCst) {
            return Err(LaunchError::Interrupted);
        }

        let mut entry = entry.map_err(|e| extraction(format!("corrupt archive: {e}")))?;
        let path: PathBuf = entry
            .path()
            .map_err(|e| extraction(format!("invalid entry name: {e}")))?
            .into_owned();
        if is_unsafe(&path) {
            return Err(LaunchError::UnsafeEntry { path });
        }
        let size = entry.size();

        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| extraction(format!("{}: {e}", path.display())))?;
        if !unpacked {
            return Err(LaunchError::UnsafeEntry { path });
        }

        summary.entries += 1;
        summary.bytes += size;
    }

    // The tar reader stops at the end-of-archive blocks; the gzip trailer
    // is only checked once the decoder reaches EOF.
    io::copy(&mut archive.into_inner(), &mut io::sink())
        .map_err(|e| extraction(format!("corrupt or truncated payload: {e}")))?;

    if summary.entries == 0 {
        return Err(extraction("archive contains no entries"));
    }

    debug!(
        dest = %dest.display(),
        entries = summary.entries,
        bytes = summary.bytes,
        "Extracted payload"
    );
    Ok(summary)
}

/// Extract the payload starting at `offset` in `artifact` on the blocking
/// pool, aborting between entries on SIGINT/SIGTERM.
///
/// On interruption this waits for the worker to stop writing before
/// returning, so the caller can safely remove `dest`.
pub(crate) async fn extract_artifact_payload(
    artifact: &Path,
    offset: u64,
    dest: &Path,
    shutdown: &mut Shutdown,
) -> Result<ExtractSummary, LaunchError> {
    let cancel = Arc::new(AtomicBool::new(false));
    let mut task = {
        let cancel = Arc::clone(&cancel);
        let artifact = artifact.to_path_buf();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let unreadable = |source: std::io::Error| LaunchError::ArtifactUnreadable {
                path: artifact.clone(),
                source,
            };
            let mut file = File::open(&artifact).map_err(unreadable)?;
            file.seek(SeekFrom::Start(offset)).map_err(unreadable)?;
            extract_payload(file, &dest, &cancel)
        })
    };

    let finished = tokio::select! {
        joined = &mut task => Some(joined),
        () = shutdown.recv() => None,
    };

    match finished {
        Some(joined) => joined.map_err(|e| extraction(format!("extraction worker failed: {e}")))?,
        None => {
            warn!("Shutdown signal received during extraction");
            cancel.store(true, Ordering::SeqCst);
            if let Err(e) = task.await {
                warn!("Extraction worker failed while stopping: {e}");
            }
            Err(LaunchError::Interrupted)
        }
    }
}
