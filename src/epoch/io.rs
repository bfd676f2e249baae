//! Plain ASCII point loader.
//!
//! Each data row holds `x y z` followed by one value per named extra column,
//! separated by commas or whitespace. `#` lines are comments. The
//! `segment_id` column is parsed as an integer column (values such as `4.0`
//! are accepted); every other extra column is stored as `f64`.
use super::{AttributeColumn, AttributeTable, PointSet, SEGMENT_ID};
use crate::error::{Error, Result};
use crate::io::{data_lines, parse_integral, read_text, split_fields};
use log::debug;
use nalgebra::Point3;
use std::path::Path;

pub fn read_xyz<S: AsRef<str>>(path: &Path, extra_columns: &[S]) -> Result<PointSet> {
    let text = read_text(path)?;
    let expected = 3 + extra_columns.len();
    let malformed = |line: usize, reason: String| Error::MalformedInput {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut coordinates = Vec::new();
    let mut int_columns: Vec<Option<Vec<i64>>> = extra_columns
        .iter()
        .map(|name| (name.as_ref() == SEGMENT_ID).then(Vec::new))
        .collect();
    let mut float_columns: Vec<Vec<f64>> = vec![Vec::new(); extra_columns.len()];

    for (line_no, line) in data_lines(&text) {
        let fields = split_fields(line);
        if fields.len() != expected {
            return Err(malformed(
                line_no,
                format!("expected {expected} columns, found {}", fields.len()),
            ));
        }
        let mut xyz = [0.0f64; 3];
        for (axis, field) in fields[..3].iter().enumerate() {
            xyz[axis] = field
                .parse::<f64>()
                .map_err(|e| malformed(line_no, format!("coordinate `{field}`: {e}")))?;
            if !xyz[axis].is_finite() {
                return Err(malformed(line_no, format!("non-finite coordinate `{field}`")));
            }
        }
        coordinates.push(Point3::new(xyz[0], xyz[1], xyz[2]));

        for (col, field) in fields[3..].iter().enumerate() {
            match int_columns[col].as_mut() {
                Some(ints) => {
                    let value = parse_integral(field).ok_or_else(|| {
                        malformed(line_no, format!("`{field}` is not an integer segment id"))
                    })?;
                    ints.push(value);
                }
                None => {
                    let value = field.parse::<f64>().map_err(|e| {
                        malformed(
                            line_no,
                            format!("column `{}` value `{field}`: {e}", extra_columns[col].as_ref()),
                        )
                    })?;
                    float_columns[col].push(value);
                }
            }
        }
    }

    let mut attributes = AttributeTable::new();
    for ((name, ints), floats) in extra_columns
        .iter()
        .zip(int_columns)
        .zip(float_columns)
    {
        let column = match ints {
            Some(values) => AttributeColumn::from(values),
            None => AttributeColumn::from(floats),
        };
        attributes.insert(name.as_ref(), column);
    }

    debug!(
        "read_xyz path={} points={} columns={}",
        path.display(),
        coordinates.len(),
        attributes.len()
    );
    PointSet::new(coordinates, attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SegmentId;
    use std::io::Write;

    #[test]
    fn reads_coordinates_and_typed_columns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# x y z segment_id intensity").unwrap();
        writeln!(file, "0.0 0.0 1.0 4 0.5").unwrap();
        writeln!(file, "1.0,0.0,1.0,4.0,0.25").unwrap();
        writeln!(file, "2.0 0.0 1.0 -1 0.0").unwrap();
        file.flush().unwrap();

        let cloud = read_xyz(file.path(), &["segment_id", "intensity"]).unwrap();
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.segment_ids(), &[4, 4, -1]);
        assert_eq!(
            cloud.attribute("intensity").and_then(AttributeColumn::as_float),
            Some(&[0.5, 0.25, 0.0][..])
        );
        assert_eq!(cloud.segment_of(0), Some(SegmentId(4)));
    }

    #[test]
    fn rejects_short_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0.0 0.0 1.0 4").unwrap();
        writeln!(file, "0.0 0.0").unwrap();
        file.flush().unwrap();

        match read_xyz(file.path(), &["segment_id"]) {
            Err(Error::MalformedInput { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed input, got {other:?}"),
        }
    }

    #[test]
    fn rejects_nan_coordinates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0.0 0.0 1.0 4").unwrap();
        writeln!(file, "NaN 0.0 1.0 4").unwrap();
        file.flush().unwrap();

        match read_xyz(file.path(), &["segment_id"]) {
            Err(Error::MalformedInput { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed input, got {other:?}"),
        }
    }

    #[test]
    fn missing_segment_column_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0.0 0.0 1.0").unwrap();
        file.flush().unwrap();
        let empty: [&str; 0] = [];
        assert!(matches!(
            read_xyz(file.path(), &empty),
            Err(Error::MissingSegmentIds)
        ));
    }
}
