//! Error types for launching and packing self-extracting artifacts.
//!
//! Every failure belongs to exactly one [`FailureKind`], and every kind maps
//! to its own process exit code so that callers (and shell scripts wrapping
//! `sfx`) can tell a missing marker apart from a broken archive or a broken
//! installer. Each error also carries an actionable fix suggestion.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use strum::IntoEnumIterator;
use thiserror::Error;

/// Closed set of failure categories.
///
/// # Example
///
/// ```rust
/// use sfx_installer::FailureKind;
///
/// assert_eq!(FailureKind::Locate.exit_code(), 65);
/// assert_eq!(FailureKind::Interrupted.exit_code(), 130);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The marker line is missing, duplicated, or the artifact is unreadable.
    Locate,
    /// The payload is empty, corrupt, truncated or unsafe.
    Extraction,
    /// The extracted payload has no usable installer entry point.
    InstallerMissing,
    /// The installer ran but did not report an exit code (signal, timeout).
    InstallerFailed,
    /// The scratch directory could not be created.
    Scratch,
    /// The launcher received SIGINT/SIGTERM.
    Interrupted,
    /// Building an artifact failed.
    Pack,
}

impl FailureKind {
    /// Process exit code for this category.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Locate => 65,
            Self::Extraction => 66,
            Self::InstallerMissing => 67,
            Self::Scratch => 68,
            Self::Pack => 69,
            Self::InstallerFailed => 70,
            Self::Interrupted => 130,
        }
    }

    /// Iterator over every failure category.
    pub fn all() -> impl Iterator<Item = Self> {
        <Self as IntoEnumIterator>::iter()
    }
}

/// Errors that can occur while launching or packing an artifact.
///
/// A non-zero installer exit is deliberately not an error: it is reported in
/// [`LaunchReport::exit_code`](crate::LaunchReport) and forwarded.
///
/// # Example
///
/// ```rust
/// use sfx_installer::{FailureKind, LaunchError};
///
/// let error = LaunchError::EmptyPayload;
/// assert_eq!(error.kind(), FailureKind::Extraction);
/// eprintln!("{error}\nhint: {}", error.fix_suggestion());
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LaunchError {
    /// The marker string itself is unusable (empty or contains a newline).
    #[error("Invalid marker {marker:?}: must be non-empty and fit on one line")]
    InvalidMarker {
        /// The rejected marker.
        marker: String,
    },

    /// The artifact could not be opened or read.
    #[error("Cannot read artifact {}: {source}", path.display())]
    ArtifactUnreadable {
        /// Path of the artifact.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No line equal to the marker exists in the artifact.
    #[error("Marker line {marker:?} not found")]
    MarkerNotFound {
        /// The marker that was searched for.
        marker: String,
    },

    /// The marker line occurs more than once, so the payload start is ambiguous.
    #[error("Marker line {marker:?} found {} times (lines {lines:?})", lines.len())]
    MarkerDuplicated {
        /// The marker that was searched for.
        marker: String,
        /// One-based line numbers of every occurrence.
        lines: Vec<u64>,
    },

    /// The marker is present but nothing follows it.
    #[error("Payload is empty: no archive data follows the marker line")]
    EmptyPayload,

    /// The payload is not a readable gzip-compressed tar stream.
    #[error("Payload extraction failed: {message}")]
    Extraction {
        /// Description of the decoding or unpacking failure.
        message: String,
    },

    /// An archive entry would be written outside the scratch directory.
    #[error("Refusing to extract unsafe archive entry {}", path.display())]
    UnsafeEntry {
        /// Path recorded in the archive.
        path: PathBuf,
    },

    /// The temporary directory could not be created.
    #[error("Cannot create scratch directory: {message}")]
    Scratch {
        /// Description of the failure.
        message: String,
    },

    /// The payload does not contain the installer entry point.
    #[error("Installer not found at {}", path.display())]
    InstallerMissing {
        /// Where the installer was expected.
        path: PathBuf,
    },

    /// The installer exists but cannot be executed.
    #[error("Installer at {} is not executable", path.display())]
    InstallerNotExecutable {
        /// Path of the installer.
        path: PathBuf,
    },

    /// Spawning the installer process failed.
    #[error("Failed to start installer: {message}")]
    InstallerSpawn {
        /// Description of the spawn failure.
        message: String,
    },

    /// The installer was killed by a signal and produced no exit code.
    #[error("Installer terminated by signal {}", signal.map_or_else(|| "unknown".to_string(), |s| s.to_string()))]
    InstallerTerminated {
        /// Terminating signal number, when the platform reports one.
        signal: Option<i32>,
    },

    /// The installer did not finish within the configured timeout.
    #[error("Installer timed out after {duration:?}")]
    Timeout {
        /// The configured timeout.
        duration: Duration,
    },

    /// The launcher received an interrupt or termination signal.
    #[error("Interrupted by signal")]
    Interrupted,

    /// Building an artifact failed.
    #[error("Packing failed: {message}")]
    Pack {
        /// Description of the failure.
        message: String,
    },
}

impl LaunchError {
    /// Failure category of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidMarker { .. }
            | Self::ArtifactUnreadable { .. }
            | Self::MarkerNotFound { .. }
            | Self::MarkerDuplicated { .. } => FailureKind::Locate,
            Self::EmptyPayload | Self::Extraction { .. } | Self::UnsafeEntry { .. } => {
                FailureKind::Extraction
            }
            Self::Scratch { .. } => FailureKind::Scratch,
            Self::InstallerMissing { .. }
            | Self::InstallerNotExecutable { .. }
            | Self::InstallerSpawn { .. } => FailureKind::InstallerMissing,
            Self::InstallerTerminated { .. } | Self::Timeout { .. } => FailureKind::InstallerFailed,
            Self::Interrupted => FailureKind::Interrupted,
            Self::Pack { .. } => FailureKind::Pack,
        }
    }

    /// Process exit code for this error, see [`FailureKind::exit_code`].
    pub fn exit_code(&self) -> u8 {
        self.kind().exit_code()
    }

    /// Get an actionable suggestion for fixing this error.
    pub fn fix_suggestion(&self) -> &'static str {
        match self {
            Self::InvalidMarker { .. } => "Pass a single-line, non-empty marker with --marker",
            Self::ArtifactUnreadable { .. } => "Check the artifact path and its read permissions",
            Self::MarkerNotFound { .. } => {
                "The file is not a packed artifact, or it was packed with a different --marker"
            }
            Self::MarkerDuplicated { .. } => {
                "Re-pack the artifact: the marker line must appear exactly once"
            }
            Self::EmptyPayload => "The artifact was truncated after the marker; re-download or re-pack it",
            Self::Extraction { .. } => {
                "The archive data is corrupt or truncated; re-download or re-pack the artifact"
            }
            Self::UnsafeEntry { .. } => {
                "The archive contains absolute or parent-relative paths; re-pack from a plain directory"
            }
            Self::Scratch { .. } => "Point TMPDIR (or --scratch-root) at a writable directory with free space",
            Self::InstallerMissing { .. } => {
                "Re-pack the artifact with an executable named `installer` at the top level"
            }
            Self::InstallerNotExecutable { .. } => {
                "Mark the installer executable (chmod +x) before packing"
            }
            Self::InstallerSpawn { .. } => {
                "Make sure the installer is a valid program for this platform (check its shebang line)"
            }
            Self::InstallerTerminated { .. } => "Inspect the installer output above; it was killed before finishing",
            Self::Timeout { .. } => "Retry with a longer --timeout, or without one",
            Self::Interrupted => "Run the artifact again to restart the installation",
            Self::Pack { .. } => "Check the source directory and that the output location is writable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes: HashSet<u8> = FailureKind::all().map(|k| k.exit_code()).collect();
        assert_eq!(codes.len(), FailureKind::all().count());
        assert!(!codes.contains(&0), "0 is reserved for success");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            LaunchError::MarkerNotFound {
                marker: "__ARCHIVE_BELOW__".to_string()
            }
            .kind(),
            FailureKind::Locate
        );
        assert_eq!(
            LaunchError::MarkerDuplicated {
                marker: "__ARCHIVE_BELOW__".to_string(),
                lines: vec![3, 9],
            }
            .kind(),
            FailureKind::Locate
        );
        assert_eq!(LaunchError::EmptyPayload.kind(), FailureKind::Extraction);
        assert_eq!(
            LaunchError::InstallerNotExecutable {
                path: PathBuf::from("/tmp/x/installer")
            }
            .kind(),
            FailureKind::InstallerMissing
        );
        assert_eq!(
            LaunchError::Timeout {
                duration: Duration::from_secs(1)
            }
            .kind(),
            FailureKind::InstallerFailed
        );
        assert_eq!(LaunchError::Interrupted.exit_code(), 130);
    }

    #[test]
    fn test_duplicated_display() {
        let error = LaunchError::MarkerDuplicated {
            marker: "__ARCHIVE_BELOW__".to_string(),
            lines: vec![3, 9],
        };
        let text = error.to_string();
        assert!(text.contains("2 times"));
        assert!(text.contains("[3, 9]"));
    }

    #[test]
    fn test_terminated_display() {
        let error = LaunchError::InstallerTerminated { signal: Some(9) };
        assert_eq!(error.to_string(), "Installer terminated by signal 9");
        let error = LaunchError::InstallerTerminated { signal: None };
        assert_eq!(error.to_string(), "Installer terminated by signal unknown");
    }

    #[test]
    fn test_all_variants_have_fix() {
        let errors = vec![
            LaunchError::InvalidMarker {
                marker: String::new(),
            },
            LaunchError::ArtifactUnreadable {
                path: PathBuf::from("missing.sh"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            },
            LaunchError::MarkerNotFound {
                marker: "M".to_string(),
            },
            LaunchError::EmptyPayload,
            LaunchError::Extraction {
                message: "invalid gzip header".to_string(),
            },
            LaunchError::UnsafeEntry {
                path: PathBuf::from("../etc/passwd"),
            },
            LaunchError::Scratch {
                message: "read-only file system".to_string(),
            },
            LaunchError::InstallerMissing {
                path: PathBuf::from("installer"),
            },
            LaunchError::InstallerSpawn {
                message: "exec format error".to_string(),
            },
            LaunchError::Interrupted,
            LaunchError::Pack {
                message: "no such directory".to_string(),
            },
        ];

        for error in errors {
            assert!(
                !error.fix_suggestion().is_empty(),
                "fix_suggestion() should return non-empty string for {:?}",
                error
            );
        }
    }

    #[test]
    fn test_failure_kind_serde() {
        let json = serde_json::to_string(&FailureKind::InstallerMissing).unwrap();
        assert_eq!(json, "\"installer_missing\"");
        let back: FailureKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FailureKind::InstallerMissing);
    }
}
