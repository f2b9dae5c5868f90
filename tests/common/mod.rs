//! Shared fixtures for integration tests.
#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub const MARKER: &str = "__ARCHIVE_BELOW__";

/// Write `body` as an `/bin/sh` script with the given mode.
pub fn write_script(path: &Path, body: &str, mode: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
}

/// A source directory with an executable `installer` running `body`.
pub fn source_dir(root: &Path, body: &str) -> PathBuf {
    let source = root.join("dist");
    write_script(&source.join("installer"), body, 0o755);
    source
}

/// Gzip'd tar built in memory: `(name, contents, mode)` per file.
pub fn tar_gz(files: &[(&str, &[u8], u32)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data, mode) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(*mode);
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Hand-assembled artifact: `prefix_lines` text lines (marker last) followed
/// by `payload`.
pub fn write_artifact(path: &Path, prefix_lines: &[&str], payload: &[u8]) {
    let mut bytes = Vec::new();
    for line in prefix_lines {
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
    }
    bytes.extend_from_slice(payload);
    fs::write(path, bytes).unwrap();
}

/// Number of entries directly inside `dir`.
pub fn entry_count(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

/// An empty directory to use as scratch root.
pub fn scratch_root(root: &Path) -> PathBuf {
    let path = root.join("scratch");
    fs::create_dir_all(&path).unwrap();
    path
}
