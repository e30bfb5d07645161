//! Plain-text document files
//!
//! One document per line: a decimal id, a tab (or any whitespace), then the WKT of
//! its geometry. Blank lines and lines starting with `#` are skipped. A line with an
//! unreadable id is an error; a line with missing or malformed WKT is kept and left
//! to the index's omission rule.
//!
//! ```text
//! # id    geometry
//! 1	POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))
//! 2	POINT(100 100)
//! ```

use crate::{DocumentId, GeometryIndex, IndexError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Outcome of loading a document file into an index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Document lines read
    pub documents: usize,
    /// Documents whose stored geometry changed
    pub changed: usize,
}

/// Parse document lines from a reader
///
/// Lines that are not valid UTF-8 are skipped with a warning.
pub fn parse_documents<R: BufRead>(mut reader: R) -> Result<Vec<(DocumentId, String)>> {
    let mut documents = Vec::new();
    let mut buffer = Vec::new();
    let mut number = 0;

    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            break;
        }
        number += 1;

        let line = match std::str::from_utf8(&buffer) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Skipping line {} of document file: {}", number, e);
                continue;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (raw_id, wkt) = trimmed
            .split_once(char::is_whitespace)
            .unwrap_or((trimmed, ""));

        let id = raw_id
            .parse::<DocumentId>()
            .map_err(|e| IndexError::MalformedDocument {
                line: number,
                reason: format!("invalid id '{raw_id}': {e}"),
            })?;

        documents.push((id, wkt.trim().to_string()));
    }

    Ok(documents)
}

/// Load a document file into `index`
///
/// Later lines for the same id reindex it.
pub fn load_file(index: &mut GeometryIndex, path: impl AsRef<Path>) -> Result<LoadReport> {
    #[cfg(feature = "profiling")]
    profiling::scope!("loader::load_file");

    let path = path.as_ref();
    let file = File::open(path)?;
    let documents = parse_documents(BufReader::new(file))?;

    let changed = index.index_parallel(&documents);
    tracing::info!(
        "Loaded {} documents from {} into '{}' ({} changed, {} indexed)",
        documents.len(),
        path.display(),
        index.name(),
        changed,
        index.len()
    );

    Ok(LoadReport {
        documents: documents.len(),
        changed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_parse_documents() {
        let input = "# comment\n\n1\tPOINT(1 2)\n2   LINESTRING(0 0, 1 1)\n3\n";
        let documents = parse_documents(Cursor::new(input)).unwrap();

        assert_eq!(
            documents,
            vec![
                (1, "POINT(1 2)".to_string()),
                (2, "LINESTRING(0 0, 1 1)".to_string()),
                (3, String::new()),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_bad_id() {
        let input = "1\tPOINT(1 2)\nabc\tPOINT(3 4)\n";
        let err = parse_documents(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, IndexError::MalformedDocument { line: 2, .. }));
    }

    #[test]
    fn test_parse_skips_invalid_utf8_line() {
        let mut input = b"1\tPOINT(1 2)\n".to_vec();
        input.extend_from_slice(b"2\tPOINT(\xff\xfe)\n");
        input.extend_from_slice(b"3\tPOINT(5 6)");

        let documents = parse_documents(Cursor::new(input)).unwrap();
        assert_eq!(
            documents,
            vec![(1, "POINT(1 2)".to_string()), (3, "POINT(5 6)".to_string())]
        );

        // Line numbers still count the skipped line
        let mut input = b"\xff\n".to_vec();
        input.extend_from_slice(b"x\tPOINT(0 0)\n");
        let err = parse_documents(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, IndexError::MalformedDocument { line: 2, .. }));
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir().join(format!("geometry-index-load-{}.tsv", std::process::id()));
        {
            let mut file = File::create(&path).unwrap();
            writeln!(file, "1\tPOLYGON((0 0, 10 0, 10 10, 0 10, 0 0))").unwrap();
            writeln!(file, "2\tPOINT(100 100)").unwrap();
            writeln!(file, "3\tPOINT(oops").unwrap();
            writeln!(file, "4").unwrap();
        }

        let mut index = GeometryIndex::default();
        let report = load_file(&mut index, &path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(report, LoadReport { documents: 4, changed: 2 });
        assert_eq!(index.len(), 2);
        assert!(index.contains(1) && index.contains(2));
        assert!(index.check_consistency().is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let mut index = GeometryIndex::default();
        let err = load_file(&mut index, "/nonexistent/documents.tsv").unwrap_err();
        assert!(matches!(err, IndexError::Io(_)));
    }
}
