//! Marker line search.

use crate::LaunchError;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// A line that matched the marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerHit {
    /// One-based line number of the marker line.
    pub line: u64,
    /// Byte offset just past the marker line's terminator.
    pub end_offset: u64,
}

/// Where the payload starts inside an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PayloadLocation {
    /// One-based line number of the marker line.
    pub marker_line: u64,
    /// One-based line number of the first payload line (`marker_line + 1`).
    pub payload_line: u64,
    /// Byte offset of the first payload byte.
    pub payload_offset: u64,
}

pub(crate) fn validate_marker(marker: &str) -> Result<(), LaunchError> {
    if marker.is_empty() || marker.contains(['\n', '\r']) {
        return Err(LaunchError::InvalidMarker {
            marker: marker.to_string(),
        });
    }
    Ok(())
}

/// Scan a byte stream for lines equal to `marker`.
///
/// Lines are split on `\n`; a trailing `\r` is ignored so artifacts that went
/// through a CRLF conversion still match. The stream is treated as bytes, not
/// text, since everything after the marker is binary. Lines that merely
/// contain the marker do not match.
///
/// # Errors
///
/// Returns any I/O error raised by `reader`.
pub fn find_marker<R: BufRead>(mut reader: R, marker: &str) -> io::Result<Vec<MarkerHit>> {
    let needle = marker.as_bytes();
    let mut hits = Vec::new();
    let mut line = Vec::new();
    let mut line_no: u64 = 0;
    let mut offset: u64 = 0;

    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 {
            break;
        }
        line_no += 1;
        offset += read as u64;

        let mut content = line.as_slice();
        if let Some(rest) = content.strip_suffix(b"\n") {
            content = rest;
        }
        if let Some(rest) = content.strip_suffix(b"\r") {
            content = rest;
        }
        if content == needle {
            hits.push(MarkerHit {
                line: line_no,
                end_offset: offset,
            });
        }
    }

    Ok(hits)
}

/// Locate the payload inside the artifact at `path`.
///
/// The marker line must occur exactly once. The payload starts on the line
/// after it.
///
/// # Errors
///
/// - `InvalidMarker` if `marker` is empty or spans lines
/// - `ArtifactUnreadable` if the file cannot be read
/// - `MarkerNotFound` if no line equals the marker
/// - `MarkerDuplicated` if more than one line does
///
/// # Example
///
/// ```rust,no_run
/// use sfx_installer::locate_payload;
/// use std::path::Path;
///
/// let location = locate_payload(Path::new("setup.sh"), "__ARCHIVE_BELOW__")?;
/// println!("payload starts on line {}", location.payload_line);
/// # Ok::<(), sfx_installer::LaunchError>(())
/// ```
pub fn locate_payload(path: &Path, marker: &str) -> Result<PayloadLocation, LaunchError> {
    validate_marker(marker)?;

    let unreadable = |source: io::Error| LaunchError::ArtifactUnreadable {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(unreadable)?;
    let hits = find_marker(BufReader::new(file), marker).map_err(unreadable)?;

    let location = classify(&hits, marker)?;
    debug!(
        artifact = %path.display(),
        marker_line = location.marker_line,
        payload_offset = location.payload_offset,
        "Located payload"
    );
    Ok(location)
}

fn classify(hits: &[MarkerHit], marker: &str) -> Result<PayloadLocation, LaunchError> {
    match hits {
        [] => Err(LaunchError::MarkerNotFound {
            marker: marker.to_string(),
        }),
        [hit] => Ok(PayloadLocation {
            marker_line: hit.line,
            payload_line: hit.line + 1,
            payload_offset: hit.end_offset,
        }),
        _ => Err(LaunchError::MarkerDuplicated {
            marker: marker.to_string(),
            lines: hits.iter().map(|h| h.line).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const MARKER: &str = "__ARCHIVE_BELOW__";

    #[test]
    fn test_find_single_marker() {
        let data = b"#!/bin/sh\nexit 0\n__ARCHIVE_BELOW__\n\x1f\x8b\x08binary";
        let hits = find_marker(Cursor::new(&data[..]), MARKER).unwrap();
        assert_eq!(
            hits,
            vec![MarkerHit {
                line: 3,
                end_offset: 35
            }]
        );
        assert_eq!(&data[35..38], b"\x1f\x8b\x08");
    }

    #[test]
    fn test_marker_must_be_whole_line() {
        let data = b"awk '/^__ARCHIVE_BELOW__$/' \"$0\"\n# __ARCHIVE_BELOW__\n__ARCHIVE_BELOW__ \n";
        let hits = find_marker(Cursor::new(&data[..]), MARKER).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_crlf_marker_line() {
        let data = b"echo hi\r\n__ARCHIVE_BELOW__\r\npayload";
        let hits = find_marker(Cursor::new(&data[..]), MARKER).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].line, 2);
        assert_eq!(hits[0].end_offset, 28);
    }

    #[test]
    fn test_marker_on_last_line_without_newline() {
        let data = b"exit 0\n__ARCHIVE_BELOW__";
        let hits = find_marker(Cursor::new(&data[..]), MARKER).unwrap();
        assert_eq!(hits[0].end_offset, data.len() as u64);
    }

    #[test]
    fn test_classify_outcomes() {
        assert!(matches!(
            classify(&[], MARKER),
            Err(LaunchError::MarkerNotFound { .. })
        ));

        let location = classify(
            &[MarkerHit {
                line: 20,
                end_offset: 400,
            }],
            MARKER,
        )
        .unwrap();
        assert_eq!(location.marker_line, 20);
        assert_eq!(location.payload_line, 21);
        assert_eq!(location.payload_offset, 400);

        let duplicated = classify(
            &[
                MarkerHit {
                    line: 4,
                    end_offset: 60,
                },
                MarkerHit {
                    line: 9,
                    end_offset: 120,
                },
            ],
            MARKER,
        );
        match duplicated {
            Err(LaunchError::MarkerDuplicated { lines, .. }) => assert_eq!(lines, vec![4, 9]),
            other => panic!("expected MarkerDuplicated, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_marker() {
        assert!(validate_marker(MARKER).is_ok());
        assert!(matches!(
            validate_marker(""),
            Err(LaunchError::InvalidMarker { .. })
        ));
        assert!(matches!(
            validate_marker("A\nB"),
            Err(LaunchError::InvalidMarker { .. })
        ));
    }

    #[test]
    fn test_locate_payload_in_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 1..20 {
            writeln!(file, "# line {i}").unwrap();
        }
        writeln!(file, "{MARKER}").unwrap();
        file.write_all(b"payload").unwrap();
        file.flush().unwrap();

        let location = locate_payload(file.path(), MARKER).unwrap();
        assert_eq!(location.marker_line, 20);
        assert_eq!(location.payload_line, 21);

        let contents = std::fs::read(file.path()).unwrap();
        assert_eq!(&contents[location.payload_offset as usize..], b"payload");
    }

    #[test]
    fn test_locate_payload_missing_file() {
        let result = locate_payload(Path::new("/nonexistent/artifact.sh"), MARKER);
        assert!(matches!(
            result,
            Err(LaunchError::ArtifactUnreadable { .. })
        ));
    }
}
