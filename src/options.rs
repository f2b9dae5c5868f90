//! Launch and pack options.
//!
//! This module provides [`LaunchOptions`] and [`PackOptions`]. Both default to
//! the conventional artifact layout: marker line `__ARCHIVE_BELOW__` and an
//! entry point named `installer`.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// Marker line separating the stub from the payload.
pub const DEFAULT_MARKER: &str = "__ARCHIVE_BELOW__";

/// File name of the entry point inside the payload.
pub const DEFAULT_INSTALLER_NAME: &str = "installer";

/// Configuration for [`launch`](crate::launch).
///
/// # Default Behavior
///
/// The scratch directory is created under the platform temp directory, which
/// honours the `TMPDIR` environment variable on Unix. It is removed when the
/// launch finishes, whatever the outcome. There is no installer timeout.
///
/// # Example
///
/// ```rust
/// use sfx_installer::LaunchOptions;
/// use std::time::Duration;
///
/// let opts = LaunchOptions {
///     timeout: Some(Duration::from_secs(600)),
///     keep_scratch: true,
///     ..Default::default()
/// };
/// assert_eq!(opts.marker, "__ARCHIVE_BELOW__");
/// ```
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Marker line to search for.
    pub marker: String,

    /// Name of the entry point at the top level of the payload.
    pub installer_name: String,

    /// Directory in which the scratch directory is created.
    ///
    /// `None` uses the platform temp directory (`TMPDIR`).
    pub scratch_root: Option<PathBuf>,

    /// Leave the scratch directory in place after the run.
    ///
    /// Default: `false`
    pub keep_scratch: bool,

    /// Kill the installer if it runs longer than this.
    ///
    /// Default: `None` (wait indefinitely)
    pub timeout: Option<Duration>,

    /// Extra arguments forwarded to the installer.
    pub installer_args: Vec<OsString>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            installer_name: DEFAULT_INSTALLER_NAME.to_string(),
            scratch_root: None,
            keep_scratch: false,
            timeout: None,
            installer_args: Vec::new(),
        }
    }
}

/// Configuration for [`pack`](crate::pack).
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Marker line written between stub and payload.
    pub marker: String,

    /// Entry point the source directory must contain.
    pub installer_name: String,

    /// Gzip level, 0 (store) to 9 (best).
    ///
    /// Default: 6
    pub compression: u32,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            installer_name: DEFAULT_INSTALLER_NAME.to_string(),
            compression: 6,
        }
    }
}
