use crate::error::{Error, Result};
use crate::io::{data_lines, parse_segment_id, read_text, split_fields};
use crate::types::SegmentId;
use log::debug;
use std::path::Path;

/// One parsed row of a correspondence file, IDs still in the raw namespace.
#[derive(Clone, Debug, PartialEq)]
pub struct RawCorrespondence {
    /// 1-based line number in the source file.
    pub line: usize,
    pub epoch0: SegmentId,
    pub epoch1: SegmentId,
    /// Trailing numeric columns (precomputed geometry), unused by the engine.
    pub extra: Vec<f64>,
}

/// Read a header-less correspondence table.
///
/// Rows are `id_epoch0, id_epoch1[, extra...]`. Any row that does not parse is
/// fatal, as is a file without a single data row.
pub fn read_correspondence_file(path: &Path) -> Result<Vec<RawCorrespondence>> {
    let text = read_text(path)?;
    let rows = parse_correspondences(&text).map_err(|(line, reason)| Error::MalformedInput {
        path: path.to_path_buf(),
        line,
        reason,
    })?;
    debug!(
        "read_correspondence_file path={} rows={}",
        path.display(),
        rows.len()
    );
    Ok(rows)
}

pub(crate) fn parse_correspondences(
    text: &str,
) -> std::result::Result<Vec<RawCorrespondence>, (usize, String)> {
    let mut rows = Vec::new();
    for (line, content) in data_lines(text) {
        let fields = split_fields(content);
        if fields.len() < 2 {
            return Err((
                line,
                format!("expected at least 2 id columns, found {}", fields.len()),
            ));
        }
        let epoch0 = parse_segment_id(fields[0])
            .ok_or_else(|| (line, format!("invalid epoch0 segment id `{}`", fields[0])))?;
        let epoch1 = parse_segment_id(fields[1])
            .ok_or_else(|| (line, format!("invalid epoch1 segment id `{}`", fields[1])))?;
        let extra = fields[2..]
            .iter()
            .map(|field| {
                field
                    .parse::<f64>()
                    .map_err(|e| (line, format!("extra column `{field}`: {e}")))
            })
            .collect::<std::result::Result<Vec<f64>, _>>()?;
        rows.push(RawCorrespondence {
            line,
            epoch0,
            epoch1,
            extra,
        });
    }
    if rows.is_empty() {
        return Err((0, "no correspondence rows".to_string()));
    }
    Ok(rows)
}
