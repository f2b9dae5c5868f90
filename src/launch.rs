//! Launching a self-extracting artifact.
//!
//! This module provides the main [`launch`] function: locate the payload,
//! extract it into a scratch directory, run the installer, clean up.

use crate::pipeline::{
    extract_artifact_payload, locate_payload, resolve_installer, run_installer, PayloadLocation,
    ScratchDir, Shutdown,
};
use crate::{LaunchError, LaunchOptions, LaunchProgress};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of a launch that got as far as running the installer.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchReport {
    /// The artifact that was launched.
    pub artifact: PathBuf,
    /// Where the payload was found.
    pub location: PayloadLocation,
    /// The scratch directory used for the run.
    pub scratch_dir: PathBuf,
    /// Whether the scratch directory was left in place.
    pub kept: bool,
    /// Number of archive entries extracted.
    pub entries: usize,
    /// The installer's exit code.
    pub exit_code: i32,
}

impl LaunchReport {
    /// Whether the installer reported success.
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Launch a self-extracting artifact.
///
/// This function:
/// 1. Locates the marker line (fails before touching the filesystem if it is
///    missing or duplicated)
/// 2. Creates a uniquely named scratch directory
/// 3. Extracts the gzip'd tar payload into it
/// 4. Runs the installer with the scratch directory as working directory
/// 5. Removes the scratch directory, on success and on failure alike
///
/// # Arguments
///
/// - `artifact`: Path of the artifact (stub + marker line + payload)
/// - `options`: Launch options (marker, timeout, etc.)
/// - `on_progress`: Callback for progress updates
///
/// # Returns
///
/// - `Ok(LaunchReport)` once the installer has run, whatever its exit code;
///   check [`LaunchReport::exit_code`]
/// - `Err(LaunchError)` if any stage failed before an exit code was known
///
/// # Example
///
/// ```rust,no_run
/// use sfx_installer::{launch, LaunchOptions};
/// use std::path::Path;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let result = launch(Path::new("setup.sh"), LaunchOptions::default(), |progress| {
///         eprintln!("{}", progress.description());
///     })
///     .await;
///
///     match result {
///         Ok(report) => std::process::exit(report.exit_code),
///         Err(e) => {
///             eprintln!("{e}. Fix: {}", e.fix_suggestion());
///             std::process::exit(e.exit_code().into());
///         }
///     }
/// }
/// ```
pub async fn launch<F>(
    artifact: &Path,
    options: LaunchOptions,
    on_progress: F,
) -> Result<LaunchReport, LaunchError>
where
    F: Fn(LaunchProgress) + Send + Sync,
{
    // Step 1: Locate the payload
    on_progress(LaunchProgress::Locating {
        artifact: artifact.to_path_buf(),
    });
    let location = {
        let path = artifact.to_path_buf();
        let marker = options.marker.clone();
        tokio::task::spawn_blocking(move || locate_payload(&path, &marker))
            .await
            .map_err(|e| LaunchError::ArtifactUnreadable {
                path: artifact.to_path_buf(),
                source: std::io::Error::other(e),
            })??
    };

    // Signals from here on are seen by whichever stage runs next
    let mut shutdown = Shutdown::listen();

    // Step 2: Acquire the scratch directory; it is released on every path below
    let scratch = ScratchDir::create(options.scratch_root.as_deref())?;
    let scratch_dir = scratch.path().to_path_buf();

    // Steps 3 and 4: Extract and run
    let outcome = extract_and_run(
        artifact,
        &location,
        &scratch_dir,
        &options,
        &mut shutdown,
        &on_progress,
    )
    .await;

    // Step 5: Cleanup, regardless of outcome
    let kept = release(scratch, options.keep_scratch, &on_progress);
    let (entries, exit_code) = outcome?;

    on_progress(LaunchProgress::Completed { exit_code });
    Ok(LaunchReport {
        artifact: artifact.to_path_buf(),
        location,
        scratch_dir,
        kept,
        entries,
        exit_code,
    })
}

async fn extract_and_run<F>(
    artifact: &Path,
    location: &PayloadLocation,
    scratch_dir: &Path,
    options: &LaunchOptions,
    shutdown: &mut Shutdown,
    on_progress: &F,
) -> Result<(usize, i32), LaunchError>
where
    F: Fn(LaunchProgress) + Send + Sync,
{
    on_progress(LaunchProgress::Extracting {
        scratch_dir: scratch_dir.to_path_buf(),
        payload_offset: location.payload_offset,
    });
    let summary =
        extract_artifact_payload(artifact, location.payload_offset, scratch_dir, shutdown).await?;

    let installer = resolve_installer(scratch_dir, &options.installer_name)?;

    on_progress(LaunchProgress::Invoking {
        installer: installer.clone(),
    });
    let exit_code = run_installer(
        &installer,
        scratch_dir,
        &options.installer_args,
        options.timeout,
        shutdown,
    )
    .await?;

    Ok((summary.entries, exit_code))
}

fn release<F>(scratch: ScratchDir, keep: bool, on_progress: &F) -> bool
where
    F: Fn(LaunchProgress) + Send + Sync,
{
    if keep {
        let path = scratch.keep();
        info!(scratch_dir = %path.display(), "Keeping scratch directory");
        return true;
    }

    on_progress(LaunchProgress::CleaningUp {
        scratch_dir: scratch.path().to_path_buf(),
    });
    let path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        warn!(scratch_dir = %path.display(), "Failed to remove scratch directory: {e}");
    }
    false
}
