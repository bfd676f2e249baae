//! Text I/O helpers shared by the loaders and the demo.
//!
//! - `read_text`: read a whole file, mapping a missing path to `FileNotFound`.
//! - `data_lines`: iterate non-blank, non-comment lines with 1-based numbers.
//! - `split_fields`: tokenise a row on commas, semicolons or whitespace.
//! - `parse_segment_id`: parse an integral, non-negative ID field.
//! - `write_json_file`: pretty-print a serializable value to disk.
//! - `write_distances_csv`: dump distance results as a flat table.
use crate::error::{Error, Result};
use crate::types::{DistanceResult, SegmentId};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
        _ => Error::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

pub fn data_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

pub fn split_fields(line: &str) -> Vec<&str> {
    line.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .collect()
}

/// Parse a field holding an integer value; `"12"` and `"12.0"` are accepted.
pub fn parse_integral(field: &str) -> Option<i64> {
    if let Ok(v) = field.parse::<i64>() {
        return Some(v);
    }
    let v = field.parse::<f64>().ok()?;
    if v.is_finite() && v.fract() == 0.0 && v.abs() <= i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

pub fn parse_segment_id(field: &str) -> Option<SegmentId> {
    parse_integral(field).and_then(SegmentId::from_raw)
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(ErrorKind::InvalidData, e),
    })?;
    write_file(path, json)
}

/// Write results as `query_id,distance,uncertainty,status,correspondent,candidates`.
/// Undefined values are written as `NaN`; a missing correspondent as an empty field.
pub fn write_distances_csv(path: &Path, results: &[DistanceResult]) -> Result<()> {
    ensure_parent_dir(path)?;
    write_file(path, distances_csv(results))
}

pub fn distances_csv(results: &[DistanceResult]) -> String {
    let mut out = String::from("query_id,distance,uncertainty,status,correspondent,candidates\n");
    for r in results {
        let correspondent = r.correspondent.map(|id| id.to_string()).unwrap_or_default();
        let _ = writeln!(
            out,
            "{},{},{},{},{},{}",
            r.query_id, r.distance, r.uncertainty, r.status, correspondent, r.candidates
        );
    }
    out
}

fn write_file(path: &Path, contents: String) -> Result<()> {
    fs::write(path, contents).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| Error::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}
