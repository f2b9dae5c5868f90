//! # sfx-installer
//!
//! Self-extracting installer artifacts: a shell stub, a marker line, and a
//! gzip-compressed tar payload concatenated into one executable file.
//!
//! This crate provides both halves of the workflow:
//!
//! - [`pack()`] builds an artifact from a directory containing an `installer`
//! - [`launch()`] locates the payload in an artifact, extracts it into a
//!   scratch directory, runs the installer there, and removes the scratch
//!   directory afterwards
//!
//! ## Features
//!
//! - Marker lookup that fails fast on missing or duplicated markers
//! - Scoped scratch directory removed on every exit path, including
//!   SIGINT/SIGTERM during extraction or installation
//! - [`LaunchError`] with a distinct [`FailureKind`] exit code per failure
//!   category and an actionable fix suggestion
//!
//! ## Example
//!
//! ```rust,no_run
//! use sfx_installer::{launch, pack, LaunchOptions, PackOptions};
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), sfx_installer::LaunchError> {
//!     pack(Path::new("dist"), Path::new("setup.sh"), &PackOptions::default())?;
//!
//!     let report = launch(Path::new("setup.sh"), LaunchOptions::default(), |progress| {
//!         eprintln!("{}", progress.description());
//!     })
//!     .await?;
//!     println!("installer exited with {}", report.exit_code);
//!     Ok(())
//! }
//! ```

mod error;
mod launch;
mod options;
mod pack;
mod pipeline;
mod progress;

pub use error::{FailureKind, LaunchError};
pub use launch::{launch, LaunchReport};
pub use options::{LaunchOptions, PackOptions, DEFAULT_INSTALLER_NAME, DEFAULT_MARKER};
pub use pack::{pack, stub_script, PackReport};
pub use pipeline::{
    extract_payload, find_marker, locate_payload, resolve_installer, ExtractSummary, MarkerHit,
    PayloadLocation, ScratchDir,
};
pub use progress::LaunchProgress;
