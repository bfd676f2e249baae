//! Per-segment surface geometry and spatial lookup for one epoch.
//!
//! [`SegmentGeometryIndex::build`] groups the points of an epoch by
//! `segment_id` and, for every segment independently, runs a PCA plane fit:
//!
//! - centroid and 3×3 covariance of the member coordinates,
//! - symmetric eigen-decomposition; the eigenvector of the smallest eigenvalue
//!   is the plane normal,
//! - shape ratios (planarity, linearity, sphericity) from the eigenvalues,
//! - spread: standard deviation of the members along the normal.
//!
//! Sign convention: every normal is flipped so that `n · orientation >= 0`
//! (`orientation` defaults to `+Z`).
//!
//! Degenerate segments (fewer than `min_plane_points` members, coincident or
//! near-collinear members) borrow a normal: the normalised mean of the fitted
//! normals of all segments whose centroid lies within `neighbor_radius`. When
//! no such neighbour exists the segment is marked
//! [`NormalSource::Unavailable`] and the distance engine reports it as
//! geometry-unavailable.
//!
//! Two R-trees are bulk-loaded per epoch: one over segment centroids and one
//! over all segmented points. Both are read-only after construction and the
//! index is `Sync`, so worker tasks share it without locking.

mod fit;

use crate::epoch::PointSet;
use crate::types::SegmentId;
use fit::{fit_plane, orient, shape_ratios};
use log::{debug, warn};
use nalgebra::{Point3, Vector3};
use rstar::primitives::GeomWithData;
use rstar::RTree;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub(crate) use fit::{centroid, spread_along};

/// Knobs for the per-segment plane fit and the degenerate-segment fallback.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryParams {
    /// Minimum member count for a plane fit (values below 3 are treated as 3).
    pub min_plane_points: usize,
    /// Middle/largest eigenvalue ratio under which members count as collinear.
    pub collinear_tolerance: f64,
    /// Radius (scene units) searched for neighbour normals of degenerate segments.
    pub neighbor_radius: f64,
    /// Reference direction fixing the normal sign.
    pub orientation: [f64; 3],
}

impl Default for GeometryParams {
    fn default() -> Self {
        Self {
            min_plane_points: 3,
            collinear_tolerance: 1e-9,
            neighbor_radius: 1.0,
            orientation: [0.0, 0.0, 1.0],
        }
    }
}

impl GeometryParams {
    pub fn orientation_vector(&self) -> Vector3<f64> {
        let v = Vector3::from(self.orientation);
        let norm = v.norm();
        if norm.is_finite() && norm > 0.0 {
            v / norm
        } else {
            Vector3::z()
        }
    }
}

/// How a segment obtained its normal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormalSource {
    Fitted,
    Neighbors,
    Unavailable,
}

/// Geometric summary of one segment.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentGeometry {
    pub id: SegmentId,
    pub member_count: usize,
    pub centroid: Point3<f64>,
    /// Oriented unit normal; `None` when [`NormalSource::Unavailable`].
    pub normal: Option<Vector3<f64>>,
    pub normal_source: NormalSource,
    /// Covariance eigenvalues, descending.
    pub eigenvalues: [f64; 3],
    pub planarity: f64,
    pub linearity: f64,
    pub sphericity: f64,
    /// Standard deviation of the members along `normal` (NaN without normal).
    pub spread: f64,
    pub bounding_radius: f64,
}

impl SegmentGeometry {
    pub fn has_normal(&self) -> bool {
        self.normal.is_some()
    }
}

/// Counts reported by the diagnostics stage.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeometrySummary {
    pub segments: usize,
    pub fitted: usize,
    pub from_neighbors: usize,
    pub unavailable: usize,
    pub indexed_points: usize,
}

type IndexedPoint = GeomWithData<[f64; 3], usize>;

pub struct SegmentGeometryIndex {
    epoch: PointSet,
    segments: Vec<SegmentGeometry>,
    members: Vec<Vec<usize>>,
    by_id: HashMap<SegmentId, usize>,
    centroid_tree: RTree<IndexedPoint>,
    point_tree: RTree<IndexedPoint>,
}

impl SegmentGeometryIndex {
    pub fn build(epoch: &PointSet, params: &GeometryParams) -> Self {
        let coords = epoch.coordinates();
        let orientation = params.orientation_vector();

        let mut groups: BTreeMap<SegmentId, Vec<usize>> = BTreeMap::new();
        for (idx, &raw) in epoch.segment_ids().iter().enumerate() {
            if let Some(id) = SegmentId::from_raw(raw) {
                groups.entry(id).or_default().push(idx);
            }
        }
        let (ids, members): (Vec<SegmentId>, Vec<Vec<usize>>) = groups.into_iter().unzip();

        let fit_one = |(id, members): (&SegmentId, &Vec<usize>)| {
            let fit = fit_plane(
                coords,
                members,
                params.min_plane_points,
                params.collinear_tolerance,
            );
            let normal = fit.normal.map(|n| orient(n, &orientation));
            let (planarity, linearity, sphericity) = shape_ratios(&fit.eigenvalues);
            SegmentGeometry {
                id: *id,
                member_count: members.len(),
                centroid: fit.centroid,
                normal,
                normal_source: if normal.is_some() {
                    NormalSource::Fitted
                } else {
                    NormalSource::Unavailable
                },
                eigenvalues: fit.eigenvalues,
                planarity,
                linearity,
                sphericity,
                spread: normal.map_or(f64::NAN, |n| spread_along(coords, members, &n)),
                bounding_radius: fit.bounding_radius,
            }
        };

        #[cfg(feature = "parallel")]
        let mut segments: Vec<SegmentGeometry> = {
            use rayon::prelude::*;
            ids.par_iter().zip(members.par_iter()).map(fit_one).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let mut segments: Vec<SegmentGeometry> =
            ids.iter().zip(members.iter()).map(fit_one).collect();

        let centroid_tree = RTree::bulk_load(
            segments
                .iter()
                .enumerate()
                .map(|(slot, seg)| IndexedPoint::new(to_array(&seg.centroid), slot))
                .collect(),
        );

        borrow_neighbor_normals(
            &mut segments,
            &members,
            coords,
            &centroid_tree,
            params.neighbor_radius,
        );

        let point_tree = RTree::bulk_load(
            members
                .iter()
                .flatten()
                .map(|&idx| IndexedPoint::new(to_array(&coords[idx]), idx))
                .collect(),
        );

        let by_id = ids
            .iter()
            .enumerate()
            .map(|(slot, id)| (*id, slot))
            .collect();

        let index = Self {
            epoch: epoch.clone(),
            segments,
            members,
            by_id,
            centroid_tree,
            point_tree,
        };
        let summary = index.summary();
        debug!(
            "SegmentGeometryIndex::build segments={} fitted={} neighbors={} unavailable={} points={}",
            summary.segments,
            summary.fitted,
            summary.from_neighbors,
            summary.unavailable,
            summary.indexed_points
        );
        index
    }

    pub fn get(&self, id: SegmentId) -> Option<&SegmentGeometry> {
        self.by_id.get(&id).map(|&slot| &self.segments[slot])
    }

    pub fn contains(&self, id: SegmentId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn segments(&self) -> &[SegmentGeometry] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Point indices of segment `id` (empty for unknown IDs).
    pub fn member_indices(&self, id: SegmentId) -> &[usize] {
        self.by_id
            .get(&id)
            .map_or(&[][..], |&slot| self.members[slot].as_slice())
    }

    pub fn coordinates(&self) -> &[Point3<f64>] {
        self.epoch.coordinates()
    }

    pub fn segment_of_point(&self, index: usize) -> Option<SegmentId> {
        self.epoch.segment_of(index)
    }

    /// Segments whose centroid lies within `radius` of `point`, ordered by ID.
    pub fn segments_within(&self, point: &Point3<f64>, radius: f64) -> Vec<&SegmentGeometry> {
        let mut slots: Vec<usize> = self
            .centroid_tree
            .locate_within_distance(to_array(point), radius * radius)
            .map(|hit| hit.data)
            .collect();
        slots.sort_unstable();
        slots.into_iter().map(|slot| &self.segments[slot]).collect()
    }

    /// Indices of segmented points within `radius` of `point`, ascending.
    pub fn points_within(&self, point: &Point3<f64>, radius: f64) -> Vec<usize> {
        let mut hits: Vec<usize> = self
            .point_tree
            .locate_within_distance(to_array(point), radius * radius)
            .map(|hit| hit.data)
            .collect();
        hits.sort_unstable();
        hits
    }

    pub fn summary(&self) -> GeometrySummary {
        let count = |source: NormalSource| {
            self.segments
                .iter()
                .filter(|seg| seg.normal_source == source)
                .count()
        };
        GeometrySummary {
            segments: self.segments.len(),
            fitted: count(NormalSource::Fitted),
            from_neighbors: count(NormalSource::Neighbors),
            unavailable: count(NormalSource::Unavailable),
            indexed_points: self.point_tree.size(),
        }
    }
}

/// Give every segment without a fitted normal the mean of its fitted
/// neighbours' normals. Neighbours are looked up by centroid distance and only
/// fitted normals contribute, so the result does not depend on visiting order.
fn borrow_neighbor_normals(
    segments: &mut [SegmentGeometry],
    members: &[Vec<usize>],
    coords: &[Point3<f64>],
    centroid_tree: &RTree<IndexedPoint>,
    radius: f64,
) {
    let radius_sq = if radius.is_finite() && radius > 0.0 {
        radius * radius
    } else {
        0.0
    };
    let borrowed: Vec<(usize, Option<Vector3<f64>>)> = segments
        .iter()
        .enumerate()
        .filter(|(_, seg)| seg.normal_source == NormalSource::Unavailable)
        .map(|(slot, seg)| {
            let sum = centroid_tree
                .locate_within_distance(to_array(&seg.centroid), radius_sq)
                .filter(|hit| hit.data != slot)
                .filter_map(|hit| match segments[hit.data].normal_source {
                    NormalSource::Fitted => segments[hit.data].normal,
                    _ => None,
                })
                .fold(Vector3::zeros(), |acc, n| acc + n);
            let norm = sum.norm();
            (slot, (norm > 1e-9).then(|| sum / norm))
        })
        .collect();

    for (slot, normal) in borrowed {
        let seg = &mut segments[slot];
        match normal {
            Some(n) => {
                seg.normal = Some(n);
                seg.normal_source = NormalSource::Neighbors;
                seg.spread = spread_along(coords, &members[slot], &n);
            }
            None => warn!(
                "segment {} ({} points) has no plane fit and no neighbour normal within {}",
                seg.id, seg.member_count, radius
            ),
        }
    }
}

fn to_array(p: &Point3<f64>) -> [f64; 3] {
    [p.x, p.y, p.z]
}
