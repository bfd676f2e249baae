//! Error taxonomy shared by every stage.
//!
//! Setup failures (missing files, empty epochs, unparsable tables, bad
//! parameters) abort the pipeline and surface as [`Error`]. Dangling
//! correspondence rows are recoverable: they are recorded as
//! [`Error::DanglingReference`] inside the table's drop list and never
//! returned from a loader. Per-query degradations are not errors at all; see
//! [`crate::types::DistanceStatus`].

use crate::types::SegmentId;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Which of the two epochs an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EpochLabel {
    Epoch0,
    Epoch1,
}

impl std::fmt::Display for EpochLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EpochLabel::Epoch0 => f.write_str("epoch0"),
            EpochLabel::Epoch1 => f.write_str("epoch1"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed input {}:{line}: {reason}", path.display())]
    MalformedInput {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{epoch} contains no points")]
    EmptyEpoch { epoch: EpochLabel },

    #[error("point {index} has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize },

    #[error("point set has no `segment_id` attribute")]
    MissingSegmentIds,

    #[error("attribute `{name}` has {found} entries, expected {expected}")]
    AttributeLength {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("attribute `{name}` must be an integer column")]
    AttributeType { name: String },

    #[error("segment id {id} cannot be offset by {offset} without overflow")]
    IdOverflow { id: i64, offset: i64 },

    #[error("{epoch} has no segment with id {id}")]
    DanglingReference { epoch: EpochLabel, id: SegmentId },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("computation cancelled")]
    Cancelled,
}

impl Error {
    /// True for errors that only invalidate a single table entry.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::DanglingReference { .. })
    }
}
