//! Signed change distance between corresponding segments.
//!
//! For every queried epoch-0 segment the engine
//! 1. looks the segment up in the epoch-0 index,
//! 2. follows the correspondence table to the epoch-1 segment,
//! 3. checks that some epoch-1 point of that segment lies within
//!    `search_radius` of the epoch-0 centroid, otherwise the query is out of
//!    radius (sparse correspondents also bring in the segments whose
//!    centroids are within the radius of the correspondent's centroid),
//! 4. projects `centroid_1 - centroid_0` on the epoch-0 normal, where
//!    `centroid_1` is the centroid of the whole correspondent (plus any
//!    borrowed neighbour segments),
//! 5. derives the uncertainty
//!    `sqrt(s0² + s1²) / sqrt(min(n0, n1)) + registration_error`, with `s0`,
//!    `s1` the spreads of both sides along the epoch-0 normal and `n0`, `n1`
//!    their member counts.
//!
//! Queries that cannot be measured yield a [`DistanceStatus`] other than
//! `Computed` with NaN distance/uncertainty; they never abort the batch.
//!
//! Queries are independent tasks (rayon under the `parallel` feature). The
//! result vector is collected by query position, so `results[i]` always
//! answers `query_ids[i]`.

use crate::correspondence::CorrespondenceTable;
use crate::error::{Error, Result};
use crate::geometry::{centroid, spread_along, SegmentGeometryIndex};
use crate::types::{DistanceResult, DistanceStatus, SegmentId};
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceParams {
    /// Correspondents with fewer members than this borrow candidate points
    /// from nearby epoch-1 segments.
    pub sparse_segment_points: usize,
}

impl Default for DistanceParams {
    fn default() -> Self {
        Self {
            sparse_segment_points: 3,
        }
    }
}

/// Shared flag a caller can raise to stop a running batch early.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Read-only inputs shared by all query tasks.
#[derive(Clone, Copy)]
pub struct DistanceInputs<'a> {
    pub epoch0: &'a SegmentGeometryIndex,
    pub epoch1: &'a SegmentGeometryIndex,
    pub correspondences: &'a CorrespondenceTable,
    pub search_radius: f64,
    pub registration_error: f64,
}

#[derive(Clone, Debug, Default)]
pub struct DistanceEngine {
    params: DistanceParams,
}

impl DistanceEngine {
    pub fn new(params: DistanceParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DistanceParams {
        &self.params
    }

    /// Measure every query; one result per query, in query order.
    pub fn run(
        &self,
        epoch0: &SegmentGeometryIndex,
        epoch1: &SegmentGeometryIndex,
        correspondences: &CorrespondenceTable,
        query_ids: &[SegmentId],
        search_radius: f64,
        registration_error: f64,
    ) -> Result<Vec<DistanceResult>> {
        let inputs = DistanceInputs {
            epoch0,
            epoch1,
            correspondences,
            search_radius,
            registration_error,
        };
        self.run_with_cancel(&inputs, query_ids, &CancelFlag::new())
    }

    /// Like [`DistanceEngine::run`], returning [`Error::Cancelled`] (and no
    /// partial output) once `cancel` is raised.
    pub fn run_with_cancel(
        &self,
        inputs: &DistanceInputs<'_>,
        query_ids: &[SegmentId],
        cancel: &CancelFlag,
    ) -> Result<Vec<DistanceResult>> {
        validate(query_ids, inputs.search_radius, inputs.registration_error)?;
        let start = Instant::now();

        let measure_one = |query: &SegmentId| -> Result<DistanceResult> {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            Ok(self.measure(inputs, *query))
        };

        #[cfg(feature = "parallel")]
        let results = {
            use rayon::prelude::*;
            query_ids
                .par_iter()
                .map(measure_one)
                .collect::<Result<Vec<_>>>()?
        };
        #[cfg(not(feature = "parallel"))]
        let results = query_ids
            .iter()
            .map(measure_one)
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "DistanceEngine::run queries={} computed={} elapsed_ms={:.3}",
            results.len(),
            results.iter().filter(|r| r.is_computed()).count(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(results)
    }

    /// Measure a single query. Never fails; problems are encoded in the status.
    pub fn measure(&self, inputs: &DistanceInputs<'_>, query: SegmentId) -> DistanceResult {
        let Some(seg0) = inputs.epoch0.get(query) else {
            return DistanceResult::unresolved(query, None, DistanceStatus::NoCorrespondence);
        };
        let Some(correspondent) = inputs.correspondences.correspondent_of(query) else {
            return DistanceResult::unresolved(query, None, DistanceStatus::NoCorrespondence);
        };
        let Some(seg1) = inputs.epoch1.get(correspondent) else {
            return DistanceResult::unresolved(
                query,
                Some(correspondent),
                DistanceStatus::NoCorrespondence,
            );
        };
        let Some(normal) = seg0.normal else {
            return DistanceResult::unresolved(
                query,
                Some(correspondent),
                DistanceStatus::GeometryUnavailable,
            );
        };

        let radius = inputs.search_radius;
        let index1 = inputs.epoch1;
        let mut segments1 = vec![correspondent];
        if seg1.member_count < self.params.sparse_segment_points {
            segments1.extend(
                index1
                    .segments_within(&seg1.centroid, radius)
                    .into_iter()
                    .map(|seg| seg.id)
                    .filter(|&id| id != correspondent),
            );
        }

        let within_radius = index1
            .points_within(&seg0.centroid, radius)
            .into_iter()
            .any(|p| {
                index1
                    .segment_of_point(p)
                    .is_some_and(|id| segments1.contains(&id))
            });
        if !within_radius {
            return DistanceResult::unresolved(
                query,
                Some(correspondent),
                DistanceStatus::OutOfRadius,
            );
        }

        let used_neighbors = segments1.len() > 1;
        let members: Vec<usize> = if used_neighbors {
            segments1
                .iter()
                .flat_map(|&id| index1.member_indices(id).iter().copied())
                .collect()
        } else {
            index1.member_indices(correspondent).to_vec()
        };

        let coords1 = index1.coordinates();
        let c1 = if used_neighbors {
            centroid(coords1, &members)
        } else {
            seg1.centroid
        };
        let distance = (c1 - seg0.centroid).dot(&normal);

        let s0 = seg0.spread;
        let s1 = spread_along(coords1, &members, &normal);
        let n_min = seg0.member_count.min(members.len()) as f64;
        let uncertainty = (s0 * s0 + s1 * s1).sqrt() / n_min.sqrt() + inputs.registration_error;

        DistanceResult {
            query_id: query,
            correspondent: Some(correspondent),
            distance,
            uncertainty,
            status: DistanceStatus::Computed,
            candidates: members.len(),
            used_neighbors,
        }
    }
}

/// Reject batch parameters no query could be measured with.
pub(crate) fn validate(
    query_ids: &[SegmentId],
    search_radius: f64,
    registration_error: f64,
) -> Result<()> {
    if query_ids.is_empty() {
        return Err(Error::InvalidParameter(
            "query_ids must not be empty".to_string(),
        ));
    }
    if !(search_radius.is_finite() && search_radius > 0.0) {
        return Err(Error::InvalidParameter(format!(
            "search_radius must be positive, got {}",
            search_radius
        )));
    }
    if !(registration_error.is_finite() && registration_error >= 0.0) {
        return Err(Error::InvalidParameter(format!(
            "registration_error must be non-negative, got {}",
            registration_error
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
