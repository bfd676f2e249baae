//! End-to-end change detection between two segmented epochs.
//!
//! [`Pbm3c2`] holds the fixed parameters of a run and drives the stages in
//! order:
//! 1. collision repair of the segment-ID namespaces ([`crate::collision`]),
//! 2. correspondence loading against the resolved namespaces,
//! 3. per-epoch geometry indices (built concurrently under `parallel`),
//! 4. the batch distance computation.
//!
//! Steps 1-2 live in [`Pbm3c2::preprocess`]; steps 3-4 in [`Pbm3c2::run`].
//! [`Pbm3c2::compute`] chains both and returns a [`ChangeReport`].
//!
//! ```no_run
//! use pbm3c2::{Pbm3c2, SegmentId};
//! use pbm3c2::epoch::io::read_xyz;
//! use std::path::Path;
//!
//! # fn main() -> pbm3c2::Result<()> {
//! let epoch0 = read_xyz(Path::new("epoch0.xyz"), &["segment_id"])?;
//! let epoch1 = read_xyz(Path::new("epoch1.xyz"), &["segment_id"])?;
//! let queries: Vec<SegmentId> = (1..31).map(SegmentId).collect();
//! let report = Pbm3c2::new(0.01).compute(
//!     &epoch0,
//!     &epoch1,
//!     Path::new("correspondences.csv"),
//!     &queries,
//!     5.0,
//! )?;
//! for r in &report.results {
//!     println!("{} {:.4} +/- {:.4}", r.query_id, r.distance, r.uncertainty);
//! }
//! # Ok(())
//! # }
//! ```

use crate::collision::{self, Resolution};
use crate::correspondence::CorrespondenceTable;
use crate::diagnostics::timing::elapsed_ms;
use crate::diagnostics::{
    ChangeReport, CollisionStage, CorrespondenceStage, DistanceStage, GeometryStage,
    InputDescriptor, PipelineTrace, TimingBreakdown,
};
use crate::distance::{self, CancelFlag, DistanceEngine, DistanceInputs, DistanceParams};
use crate::epoch::PointSet;
use crate::error::{EpochLabel, Error, Result};
use crate::geometry::{GeometryParams, SegmentGeometryIndex};
use crate::types::{DistanceResult, SegmentId};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Pbm3c2Params {
    /// Registration error of the epoch alignment, added to every uncertainty.
    pub registration_error: f64,
    pub geometry: GeometryParams,
    pub distance: DistanceParams,
}

impl Default for Pbm3c2Params {
    fn default() -> Self {
        Self {
            registration_error: 0.0,
            geometry: GeometryParams::default(),
            distance: DistanceParams::default(),
        }
    }
}

/// Epochs and correspondences in the shared, collision-free namespace.
#[derive(Debug)]
pub struct Preprocessed {
    pub epoch0: PointSet,
    pub epoch1: PointSet,
    pub correspondences: CorrespondenceTable,
    pub resolution: Resolution,
}

pub struct Pbm3c2 {
    params: Pbm3c2Params,
    engine: DistanceEngine,
}

struct Measured {
    results: Vec<DistanceResult>,
    geometry: [GeometryStage; 2],
}

impl Pbm3c2 {
    pub fn new(registration_error: f64) -> Self {
        Self::with_params(Pbm3c2Params {
            registration_error,
            ..Default::default()
        })
    }

    pub fn with_params(params: Pbm3c2Params) -> Self {
        let engine = DistanceEngine::new(params.distance.clone());
        Self { params, engine }
    }

    pub fn params(&self) -> &Pbm3c2Params {
        &self.params
    }

    /// Registration error fixed at construction.
    pub fn registration_error(&self) -> f64 {
        self.params.registration_error
    }

    pub fn set_geometry_params(&mut self, geometry: GeometryParams) {
        self.params.geometry = geometry;
    }

    pub fn set_distance_params(&mut self, distance: DistanceParams) {
        self.engine = DistanceEngine::new(distance.clone());
        self.params.distance = distance;
    }

    /// Resolve ID collisions and load the correspondence file against the
    /// resolved namespaces. Inputs are never modified.
    pub fn preprocess(
        &self,
        epoch0: &PointSet,
        epoch1: &PointSet,
        correspondence_path: &Path,
    ) -> Result<Preprocessed> {
        self.preprocess_timed(epoch0, epoch1, correspondence_path, &mut TimingBreakdown::default())
    }

    fn preprocess_timed(
        &self,
        epoch0: &PointSet,
        epoch1: &PointSet,
        correspondence_path: &Path,
        timings: &mut TimingBreakdown,
    ) -> Result<Preprocessed> {
        ensure_non_empty(epoch0, epoch1)?;
        if !correspondence_path.exists() {
            return Err(Error::FileNotFound(correspondence_path.to_path_buf()));
        }
        let resolution = timings.time("collision", || collision::resolve(epoch0, epoch1))?;
        let correspondences = timings.time("correspondences", || {
            CorrespondenceTable::load(correspondence_path, &resolution)
        })?;
        info!(
            "Pbm3c2::preprocess offset={} correspondences={} dropped={}",
            resolution.offset,
            correspondences.len(),
            correspondences.dropped().len()
        );
        Ok(Preprocessed {
            epoch0: resolution.epoch0.clone(),
            epoch1: resolution.epoch1.clone(),
            correspondences,
            resolution,
        })
    }

    /// Measure the signed change of every queried epoch-0 segment.
    ///
    /// Epochs and table must already share one namespace (see
    /// [`Pbm3c2::preprocess`]). `results[i]` answers `query_ids[i]`.
    pub fn run(
        &self,
        epoch0: &PointSet,
        epoch1: &PointSet,
        correspondences: &CorrespondenceTable,
        query_ids: &[SegmentId],
        search_radius: f64,
    ) -> Result<Vec<DistanceResult>> {
        self.run_with_cancel(
            epoch0,
            epoch1,
            correspondences,
            query_ids,
            search_radius,
            &CancelFlag::new(),
        )
    }

    /// Like [`Pbm3c2::run`], stopping with [`Error::Cancelled`] once `cancel`
    /// is raised.
    pub fn run_with_cancel(
        &self,
        epoch0: &PointSet,
        epoch1: &PointSet,
        correspondences: &CorrespondenceTable,
        query_ids: &[SegmentId],
        search_radius: f64,
        cancel: &CancelFlag,
    ) -> Result<Vec<DistanceResult>> {
        let measured = self.measure(
            epoch0,
            epoch1,
            correspondences,
            query_ids,
            search_radius,
            cancel,
            &mut TimingBreakdown::default(),
        )?;
        Ok(measured.results)
    }

    /// Run and return the results together with a [`PipelineTrace`].
    pub fn run_with_diagnostics(
        &self,
        epoch0: &PointSet,
        epoch1: &PointSet,
        correspondences: &CorrespondenceTable,
        query_ids: &[SegmentId],
        search_radius: f64,
    ) -> Result<ChangeReport> {
        let total_start = Instant::now();
        let mut timings = TimingBreakdown::default();
        let measured = self.measure(
            epoch0,
            epoch1,
            correspondences,
            query_ids,
            search_radius,
            &CancelFlag::new(),
            &mut timings,
        )?;
        timings.total_ms = elapsed_ms(total_start);
        Ok(self.report(
            epoch0,
            epoch1,
            query_ids,
            search_radius,
            measured,
            timings,
            None,
            None,
        ))
    }

    /// One-shot [`Pbm3c2::preprocess`] followed by [`Pbm3c2::run`].
    ///
    /// `query_ids` and the epoch-0 column of the correspondence file use the
    /// epoch-0 namespace, which collision repair never changes.
    pub fn compute(
        &self,
        epoch0: &PointSet,
        epoch1: &PointSet,
        correspondence_path: &Path,
        query_ids: &[SegmentId],
        search_radius: f64,
    ) -> Result<ChangeReport> {
        let total_start = Instant::now();
        let mut timings = TimingBreakdown::default();
        let prepared = self.preprocess_timed(epoch0, epoch1, correspondence_path, &mut timings)?;
        let measured = self.measure(
            &prepared.epoch0,
            &prepared.epoch1,
            &prepared.correspondences,
            query_ids,
            search_radius,
            &CancelFlag::new(),
            &mut timings,
        )?;
        timings.total_ms = elapsed_ms(total_start);
        Ok(self.report(
            &prepared.epoch0,
            &prepared.epoch1,
            query_ids,
            search_radius,
            measured,
            timings,
            Some(CollisionStage::from_resolution(&prepared.resolution)),
            Some(CorrespondenceStage::from_table(&prepared.correspondences)),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn measure(
        &self,
        epoch0: &PointSet,
        epoch1: &PointSet,
        correspondences: &CorrespondenceTable,
        query_ids: &[SegmentId],
        search_radius: f64,
        cancel: &CancelFlag,
        timings: &mut TimingBreakdown,
    ) -> Result<Measured> {
        ensure_non_empty(epoch0, epoch1)?;
        distance::validate(query_ids, search_radius, self.params.registration_error)?;
        debug!(
            "Pbm3c2::run points0={} points1={} queries={} radius={}",
            epoch0.len(),
            epoch1.len(),
            query_ids.len(),
            search_radius
        );

        let ((index0, stage0), (index1, stage1)) = self.build_indices(epoch0, epoch1);
        timings.push("geometry_epoch0", stage0.elapsed_ms);
        timings.push("geometry_epoch1", stage1.elapsed_ms);

        let inputs = DistanceInputs {
            epoch0: &index0,
            epoch1: &index1,
            correspondences,
            search_radius,
            registration_error: self.params.registration_error,
        };
        let results = timings.time("distances", || {
            self.engine.run_with_cancel(&inputs, query_ids, cancel)
        })?;
        Ok(Measured {
            results,
            geometry: [stage0, stage1],
        })
    }

    fn build_indices(
        &self,
        epoch0: &PointSet,
        epoch1: &PointSet,
    ) -> (
        (SegmentGeometryIndex, GeometryStage),
        (SegmentGeometryIndex, GeometryStage),
    ) {
        let build = |epoch: &PointSet| {
            let start = Instant::now();
            let index = SegmentGeometryIndex::build(epoch, &self.params.geometry);
            let stage = GeometryStage {
                elapsed_ms: elapsed_ms(start),
                summary: index.summary(),
            };
            (index, stage)
        };
        #[cfg(feature = "parallel")]
        {
            rayon::join(|| build(epoch0), || build(epoch1))
        }
        #[cfg(not(feature = "parallel"))]
        {
            (build(epoch0), build(epoch1))
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        epoch0: &PointSet,
        epoch1: &PointSet,
        query_ids: &[SegmentId],
        search_radius: f64,
        measured: Measured,
        timings: TimingBreakdown,
        collision: Option<CollisionStage>,
        correspondences: Option<CorrespondenceStage>,
    ) -> ChangeReport {
        let distances = DistanceStage::from_results(&measured.results);
        debug!(
            "Pbm3c2 done computed={}/{} total_ms={:.3}",
            distances.computed, distances.queries, timings.total_ms
        );
        ChangeReport {
            trace: PipelineTrace {
                input: InputDescriptor {
                    points_epoch0: epoch0.len(),
                    points_epoch1: epoch1.len(),
                    queries: query_ids.len(),
                    search_radius,
                    registration_error: self.params.registration_error,
                },
                timings,
                collision,
                correspondences,
                geometry: measured.geometry,
                distances,
            },
            results: measured.results,
        }
    }
}

impl Default for Pbm3c2 {
    fn default() -> Self {
        Self::with_params(Pbm3c2Params::default())
    }
}

fn ensure_non_empty(epoch0: &PointSet, epoch1: &PointSet) -> Result<()> {
    if epoch0.is_empty() {
        return Err(Error::EmptyEpoch {
            epoch: EpochLabel::Epoch0,
        });
    }
    if epoch1.is_empty() {
        return Err(Error::EmptyEpoch {
            epoch: EpochLabel::Epoch1,
        });
    }
    Ok(())
}
