//! Correspondence table linking epoch-0 segments to epoch-1 segments.
//!
//! The file is authored against the *raw* IDs of both epochs. Loading goes
//! through the collision [`Resolution`]: epoch-1 IDs are translated by the
//! resolution offset before they are checked against the resolved ID sets.
//! Rows that reference a missing segment are dropped and kept in
//! [`CorrespondenceTable::dropped`]; they never abort the load.
//!
//! Lookups are keyed by the epoch-0 ID. One epoch-0 segment may map to several
//! epoch-1 segments; the first row in file order is the primary correspondent.

mod loader;

pub use loader::{read_correspondence_file, RawCorrespondence};

use crate::collision::Resolution;
use crate::error::{EpochLabel, Error, Result};
use crate::types::SegmentId;
use log::{debug, warn};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Validated pairing, IDs in the resolved namespace.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrespondenceEntry {
    pub epoch0: SegmentId,
    pub epoch1: SegmentId,
    pub extra: Vec<f64>,
}

/// Row excluded because it referenced a segment that does not exist.
#[derive(Debug)]
pub struct DroppedEntry {
    pub line: usize,
    pub epoch0: SegmentId,
    /// Epoch-1 ID after translation into the resolved namespace, if representable.
    pub epoch1: Option<SegmentId>,
    pub error: Error,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedSummary {
    pub line: usize,
    pub reason: String,
}

impl From<&DroppedEntry> for DroppedSummary {
    fn from(entry: &DroppedEntry) -> Self {
        Self {
            line: entry.line,
            reason: entry.error.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CorrespondenceTable {
    entries: Vec<CorrespondenceEntry>,
    by_epoch0: HashMap<SegmentId, Vec<usize>>,
    dropped: Vec<DroppedEntry>,
}

impl CorrespondenceTable {
    /// Read `path` and validate it against the resolved epochs.
    pub fn load(path: &Path, resolution: &Resolution) -> Result<Self> {
        let raw = read_correspondence_file(path)?;
        Ok(Self::from_raw(raw, resolution))
    }

    /// Translate raw rows into the resolved namespace and validate them.
    pub fn from_raw(raw: Vec<RawCorrespondence>, resolution: &Resolution) -> Self {
        let mut table = Self::default();
        for row in raw {
            let translated = resolution.translate_epoch1(row.epoch1);
            let checked = translated
                .ok_or(Error::DanglingReference {
                    epoch: EpochLabel::Epoch1,
                    id: row.epoch1,
                })
                .and_then(|epoch1| {
                    check_reference(
                        &resolution.ids_epoch0,
                        &resolution.ids_epoch1,
                        row.epoch0,
                        epoch1,
                    )
                    .map(|()| epoch1)
                });
            match checked {
                Ok(epoch1) => table.push(CorrespondenceEntry {
                    epoch0: row.epoch0,
                    epoch1,
                    extra: row.extra,
                }),
                Err(error) => table.drop_row(DroppedEntry {
                    line: row.line,
                    epoch0: row.epoch0,
                    epoch1: translated,
                    error,
                }),
            }
        }
        table.log_summary();
        table
    }

    /// Build from already-resolved entries (no ID translation).
    pub fn from_entries<I>(
        entries: I,
        ids_epoch0: &BTreeSet<SegmentId>,
        ids_epoch1: &BTreeSet<SegmentId>,
    ) -> Self
    where
        I: IntoIterator<Item = CorrespondenceEntry>,
    {
        let mut table = Self::default();
        for (idx, entry) in entries.into_iter().enumerate() {
            match check_reference(ids_epoch0, ids_epoch1, entry.epoch0, entry.epoch1) {
                Ok(()) => table.push(entry),
                Err(error) => table.drop_row(DroppedEntry {
                    line: idx + 1,
                    epoch0: entry.epoch0,
                    epoch1: Some(entry.epoch1),
                    error,
                }),
            }
        }
        table.log_summary();
        table
    }

    fn push(&mut self, entry: CorrespondenceEntry) {
        self.by_epoch0
            .entry(entry.epoch0)
            .or_default()
            .push(self.entries.len());
        self.entries.push(entry);
    }

    fn drop_row(&mut self, dropped: DroppedEntry) {
        warn!(
            "correspondence line {} dropped: {}",
            dropped.line, dropped.error
        );
        self.dropped.push(dropped);
    }

    fn log_summary(&self) {
        debug!(
            "CorrespondenceTable kept={} dropped={} keys={}",
            self.entries.len(),
            self.dropped.len(),
            self.by_epoch0.len()
        );
    }

    /// Primary epoch-1 correspondent of an epoch-0 segment.
    pub fn correspondent_of(&self, epoch0: SegmentId) -> Option<SegmentId> {
        self.by_epoch0
            .get(&epoch0)
            .and_then(|rows| rows.first())
            .map(|&idx| self.entries[idx].epoch1)
    }

    /// All epoch-1 correspondents in file order.
    pub fn correspondents_of(&self, epoch0: SegmentId) -> Vec<SegmentId> {
        self.by_epoch0
            .get(&epoch0)
            .map(|rows| rows.iter().map(|&idx| self.entries[idx].epoch1).collect())
            .unwrap_or_default()
    }

    pub fn entries(&self) -> &[CorrespondenceEntry] {
        &self.entries
    }

    pub fn dropped(&self) -> &[DroppedEntry] {
        &self.dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn check_reference(
    ids_epoch0: &BTreeSet<SegmentId>,
    ids_epoch1: &BTreeSet<SegmentId>,
    epoch0: SegmentId,
    epoch1: SegmentId,
) -> Result<()> {
    if !ids_epoch0.contains(&epoch0) {
        return Err(Error::DanglingReference {
            epoch: EpochLabel::Epoch0,
            id: epoch0,
        });
    }
    if !ids_epoch1.contains(&epoch1) {
        return Err(Error::DanglingReference {
            epoch: EpochLabel::Epoch1,
            id: epoch1,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::loader::parse_correspondences;
    use super::*;
    use crate::collision::resolve;
    use crate::epoch::PointSet;
    use nalgebra::Point3;
    use std::io::Write;

    fn cloud(ids: &[i64]) -> PointSet {
        let coords = (0..ids.len())
            .map(|i| Point3::new(i as f64, 0.0, 0.0))
            .collect();
        PointSet::from_segments(coords, ids.to_vec()).unwrap()
    }

    fn raw(rows: &[(u64, u64)]) -> Vec<RawCorrespondence> {
        rows.iter()
            .enumerate()
            .map(|(i, &(a, b))| RawCorrespondence {
                line: i + 1,
                epoch0: SegmentId(a),
                epoch1: SegmentId(b),
                extra: Vec::new(),
            })
            .collect()
    }

    #[test]
    fn rows_are_validated_in_resolved_namespace() {
        let res = resolve(&cloud(&[1, 2, 3]), &cloud(&[1, 2, 4])).unwrap();
        // raw epoch1 id 3 does not exist; raw 4 -> resolved 8 does.
        let table = CorrespondenceTable::from_raw(raw(&[(1, 1), (2, 3), (3, 4)]), &res);

        assert_eq!(table.len(), 2);
        assert_eq!(table.correspondent_of(SegmentId(1)), Some(SegmentId(5)));
        assert_eq!(table.correspondent_of(SegmentId(3)), Some(SegmentId(8)));
        assert_eq!(table.correspondent_of(SegmentId(2)), None);

        let dropped = table.dropped();
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].line, 2);
        assert!(dropped[0].error.is_recoverable());
        assert!(matches!(
            dropped[0].error,
            Error::DanglingReference {
                epoch: EpochLabel::Epoch1,
                id: SegmentId(7)
            }
        ));
    }

    #[test]
    fn unknown_epoch0_ids_are_dropped() {
        let res = resolve(&cloud(&[0, 1]), &cloud(&[5, 6])).unwrap();
        let table = CorrespondenceTable::from_raw(raw(&[(9, 5), (0, 6)]), &res);
        assert_eq!(table.len(), 1);
        assert!(matches!(
            table.dropped()[0].error,
            Error::DanglingReference {
                epoch: EpochLabel::Epoch0,
                ..
            }
        ));
    }

    #[test]
    fn one_to_many_keeps_file_order() {
        let ids0: BTreeSet<_> = [SegmentId(1)].into_iter().collect();
        let ids1: BTreeSet<_> = [SegmentId(10), SegmentId(11)].into_iter().collect();
        let entries = [11u64, 10].map(|b| CorrespondenceEntry {
            epoch0: SegmentId(1),
            epoch1: SegmentId(b),
            extra: Vec::new(),
        });
        let table = CorrespondenceTable::from_entries(entries, &ids0, &ids1);
        assert_eq!(table.correspondent_of(SegmentId(1)), Some(SegmentId(11)));
        assert_eq!(
            table.correspondents_of(SegmentId(1)),
            vec![SegmentId(11), SegmentId(10)]
        );
    }

    #[test]
    fn parser_keeps_extra_columns() {
        let rows = parse_correspondences("1,2,0.5,1.5\n3 4\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].extra, vec![0.5, 1.5]);
        assert_eq!(rows[1].epoch1, SegmentId(4));
        assert_eq!(rows[1].line, 2);
    }

    #[test]
    fn parser_rejects_malformed_rows() {
        assert_eq!(parse_correspondences("1,2\n7\n").unwrap_err().0, 2);
        assert_eq!(parse_correspondences("a,b\n").unwrap_err().0, 1);
        assert_eq!(parse_correspondences("1,-2\n").unwrap_err().0, 1);
        assert!(parse_correspondences("\n# nothing\n").is_err());
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let res = resolve(&cloud(&[0]), &cloud(&[1])).unwrap();
        let missing = CorrespondenceTable::load(Path::new("/definitely/not/here.csv"), &res);
        assert!(matches!(missing, Err(Error::FileNotFound(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0,x").unwrap();
        file.flush().unwrap();
        assert!(matches!(
            CorrespondenceTable::load(file.path(), &res),
            Err(Error::MalformedInput { line: 1, .. })
        ));
    }
}
