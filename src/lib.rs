#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod config;
pub mod diagnostics;
pub mod epoch;
pub mod error;
pub mod pipeline;
pub mod types;

// Stage modules – public for tools that drive the stages by hand.
pub mod collision;
pub mod correspondence;
pub mod distance;
pub mod geometry;
pub mod io;

// --- High-level re-exports -------------------------------------------------

pub use crate::epoch::PointSet;
pub use crate::error::{Error, Result};
pub use crate::pipeline::{Pbm3c2, Pbm3c2Params, Preprocessed};
pub use crate::types::{DistanceResult, DistanceStatus, SegmentId};

pub use crate::diagnostics::{ChangeReport, PipelineTrace};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```
/// use pbm3c2::prelude::*;
/// use nalgebra::Point3;
///
/// # fn main() -> pbm3c2::Result<()> {
/// let coords = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
/// let epoch = PointSet::from_segments(coords, vec![3, UNSEGMENTED])?;
/// assert_eq!(epoch.max_segment_id(), Some(SegmentId(3)));
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::epoch::UNSEGMENTED;
    pub use crate::{
        ChangeReport, DistanceResult, DistanceStatus, Pbm3c2, Pbm3c2Params, PointSet, SegmentId,
    };
}
