//! Pipeline stage implementations.
//!
//! This module contains the individual stages that [`launch`](crate::launch)
//! strings together:
//!
//! - `marker`: locate the marker line and the payload offset
//! - `scratch`: scoped temporary directory, removed on drop
//! - `payload`: gzip + tar extraction with traversal checks
//! - `installer`: entry point resolution and invocation
//! - `shutdown`: SIGINT/SIGTERM listener shared by every stage of a launch

mod installer;
mod marker;
mod payload;
mod scratch;
mod shutdown;

pub use installer::resolve_installer;
pub use marker::{find_marker, locate_payload, MarkerHit, PayloadLocation};
pub use payload::{extract_payload, ExtractSummary};
pub use scratch::ScratchDir;

pub(crate) use installer::run_installer;
pub(crate) use marker::validate_marker;
pub(crate) use payload::extract_artifact_payload;
pub(crate) use shutdown::Shutdown;
