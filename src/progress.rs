//! Progress reporting types for launches.
//!
//! The [`LaunchProgress`] enum represents the discrete stages of the
//! locate, extract, invoke, cleanup pipeline. Stages are reported through the
//! callback passed to [`launch`](crate::launch), in order.

use std::path::PathBuf;

/// Progress stages during a launch.
///
/// # Example
///
/// ```rust
/// use sfx_installer::LaunchProgress;
///
/// fn on_progress(progress: LaunchProgress) {
///     match &progress {
///         LaunchProgress::Extracting { scratch_dir, .. } => {
///             eprintln!("Extracting into {}", scratch_dir.display());
///         }
///         LaunchProgress::Completed { exit_code } => {
///             eprintln!("Installer exited with {exit_code}");
///         }
///         other => eprintln!("{}", other.description()),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum LaunchProgress {
    /// Searching the artifact for the marker line.
    Locating {
        /// The artifact being launched.
        artifact: PathBuf,
    },

    /// Unpacking the payload.
    Extracting {
        /// Scratch directory receiving the files.
        scratch_dir: PathBuf,
        /// Byte offset of the payload inside the artifact.
        payload_offset: u64,
    },

    /// Running the installer.
    Invoking {
        /// Path of the installer being run.
        installer: PathBuf,
    },

    /// Removing the scratch directory.
    CleaningUp {
        /// Scratch directory being removed.
        scratch_dir: PathBuf,
    },

    /// The pipeline finished and the installer's exit code is known.
    Completed {
        /// Exit code reported by the installer.
        exit_code: i32,
    },
}

impl LaunchProgress {
    /// Get a human-readable description of the current stage.
    ///
    /// ```rust
    /// use sfx_installer::LaunchProgress;
    ///
    /// let progress = LaunchProgress::Completed { exit_code: 0 };
    /// assert_eq!(progress.description(), "Launch complete");
    /// ```
    pub fn description(&self) -> &'static str {
        match self {
            Self::Locating { .. } => "Locating payload",
            Self::Extracting { .. } => "Extracting payload",
            Self::Invoking { .. } => "Running installer",
            Self::CleaningUp { .. } => "Cleaning up",
            Self::Completed { .. } => "Launch complete",
        }
    }

    /// Check if this progress stage indicates completion.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
