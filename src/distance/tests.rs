use super::*;
use crate::correspondence::CorrespondenceEntry;
use crate::epoch::PointSet;
use crate::geometry::{GeometryParams, NormalSource};
use approx::assert_relative_eq;
use nalgebra::Point3;
use std::collections::BTreeSet;

/// 5×5 grid with 0.25 spacing at `origin`, labelled `id`.
fn grid(origin: [f64; 3], id: i64, coords: &mut Vec<Point3<f64>>, ids: &mut Vec<i64>) {
    for i in 0..5 {
        for j in 0..5 {
            coords.push(Point3::new(
                origin[0] + i as f64 * 0.25,
                origin[1] + j as f64 * 0.25,
                origin[2],
            ));
            ids.push(id);
        }
    }
}

struct Fixture {
    index0: SegmentGeometryIndex,
    index1: SegmentGeometryIndex,
    table: CorrespondenceTable,
}

/// Epoch 0: segments 0, 1 at z=0, segment 2 far away.
/// Epoch 1: segment 10 = segment 0 unchanged, segment 11 = segment 1 raised
/// by 0.3, segment 12 a single point next to segment 11, segment 13 far off.
fn fixture(pairs: &[(u64, u64)]) -> Fixture {
    let (mut c0, mut i0) = (Vec::new(), Vec::new());
    grid([0.0, 0.0, 0.0], 0, &mut c0, &mut i0);
    grid([3.0, 0.0, 0.0], 1, &mut c0, &mut i0);
    grid([20.0, 0.0, 0.0], 2, &mut c0, &mut i0);
    let epoch0 = PointSet::from_segments(c0, i0).unwrap();

    let (mut c1, mut i1) = (Vec::new(), Vec::new());
    grid([0.0, 0.0, 0.0], 10, &mut c1, &mut i1);
    grid([3.0, 0.0, 0.3], 11, &mut c1, &mut i1);
    c1.push(Point3::new(3.5, 0.5, 0.3));
    i1.push(12);
    grid([40.0, 0.0, 0.0], 13, &mut c1, &mut i1);
    let epoch1 = PointSet::from_segments(c1, i1).unwrap();

    let params = GeometryParams::default();
    let index0 = SegmentGeometryIndex::build(&epoch0, &params);
    let index1 = SegmentGeometryIndex::build(&epoch1, &params);
    let entries = pairs.iter().map(|&(a, b)| CorrespondenceEntry {
        epoch0: SegmentId(a),
        epoch1: SegmentId(b),
        extra: Vec::new(),
    });
    let table = CorrespondenceTable::from_entries(
        entries,
        &epoch0.segment_id_set(),
        &epoch1.segment_id_set(),
    );
    Fixture {
        index0,
        index1,
        table,
    }
}

fn ids(raw: &[u64]) -> Vec<SegmentId> {
    raw.iter().copied().map(SegmentId).collect()
}

#[test]
fn identical_geometry_measures_zero_change() {
    let f = fixture(&[(0, 10)]);
    let engine = DistanceEngine::default();
    let out = engine
        .run(&f.index0, &f.index1, &f.table, &ids(&[0]), 5.0, 0.01)
        .unwrap();
    let r = &out[0];
    assert_eq!(r.status, DistanceStatus::Computed);
    assert_eq!(r.correspondent, Some(SegmentId(10)));
    assert_eq!(r.candidates, 25);
    assert_relative_eq!(r.distance, 0.0, epsilon = 1e-12);
    // Flat patches have zero spread, leaving only the registration error.
    assert_relative_eq!(r.uncertainty, 0.01, epsilon = 1e-12);
}

#[test]
fn raised_patch_yields_signed_shift() {
    let f = fixture(&[(1, 11)]);
    let out = DistanceEngine::default()
        .run(&f.index0, &f.index1, &f.table, &ids(&[1]), 5.0, 0.0)
        .unwrap();
    assert_eq!(out[0].status, DistanceStatus::Computed);
    assert_relative_eq!(out[0].distance, 0.3, epsilon = 1e-9);
    assert!(!out[0].used_neighbors);
}

#[test]
fn uncertainty_combines_spreads() {
    // Rough epoch-1 patch: alternate rows at +/-0.1 around z = 0.
    let (mut c0, mut i0) = (Vec::new(), Vec::new());
    grid([0.0, 0.0, 0.0], 0, &mut c0, &mut i0);
    let (mut c1, mut i1) = (Vec::new(), Vec::new());
    for i in 0..4 {
        for j in 0..4 {
            let z = if j % 2 == 0 { 0.1 } else { -0.1 };
            c1.push(Point3::new(i as f64 * 0.25, j as f64 * 0.25, z));
            i1.push(1);
        }
    }
    let e0 = PointSet::from_segments(c0, i0).unwrap();
    let e1 = PointSet::from_segments(c1, i1).unwrap();
    let params = GeometryParams::default();
    let index0 = SegmentGeometryIndex::build(&e0, &params);
    let index1 = SegmentGeometryIndex::build(&e1, &params);
    let table = CorrespondenceTable::from_entries(
        [CorrespondenceEntry {
            epoch0: SegmentId(0),
            epoch1: SegmentId(1),
            extra: Vec::new(),
        }],
        &e0.segment_id_set(),
        &e1.segment_id_set(),
    );
    let out = DistanceEngine::default()
        .run(&index0, &index1, &table, &ids(&[0]), 10.0, 0.02)
        .unwrap();
    let r = &out[0];
    assert_eq!(r.candidates, 16);
    // s0 = 0, s1 = 0.1, min(25, 16) = 16.
    assert_relative_eq!(r.uncertainty, 0.1 / 4.0 + 0.02, epsilon = 1e-12);
    assert_relative_eq!(r.distance, 0.0, epsilon = 1e-12);
}

#[test]
fn statuses_and_order_are_preserved() {
    let f = fixture(&[(0, 10), (2, 13)]);
    let queries = ids(&[2, 7, 1, 0]);
    let out = DistanceEngine::default()
        .run(&f.index0, &f.index1, &f.table, &queries, 5.0, 0.01)
        .unwrap();

    assert_eq!(out.len(), queries.len());
    for (r, q) in out.iter().zip(&queries) {
        assert_eq!(r.query_id, *q);
    }
    // Segment 13 lies 20 units away from segment 2.
    assert_eq!(out[0].status, DistanceStatus::OutOfRadius);
    assert!(out[0].distance.is_nan() && out[0].uncertainty.is_nan());
    assert_eq!(out[0].correspondent, Some(SegmentId(13)));
    // Unknown epoch-0 segment.
    assert_eq!(out[1].status, DistanceStatus::NoCorrespondence);
    // Known segment without a table entry.
    assert_eq!(out[2].status, DistanceStatus::NoCorrespondence);
    assert_eq!(out[2].correspondent, None);
    assert_eq!(out[3].status, DistanceStatus::Computed);
}

#[test]
fn sparse_correspondent_pulls_in_neighbors() {
    let f = fixture(&[(1, 12)]);
    let out = DistanceEngine::default()
        .run(&f.index0, &f.index1, &f.table, &ids(&[1]), 2.0, 0.0)
        .unwrap();
    let r = &out[0];
    assert_eq!(r.status, DistanceStatus::Computed);
    assert!(r.used_neighbors);
    assert_eq!(r.candidates, 26);
    assert_relative_eq!(r.distance, 0.3, epsilon = 1e-9);

    let strict = DistanceEngine::new(DistanceParams {
        sparse_segment_points: 0,
    });
    let out = strict
        .run(&f.index0, &f.index1, &f.table, &ids(&[1]), 2.0, 0.0)
        .unwrap();
    assert!(!out[0].used_neighbors);
    assert_eq!(out[0].candidates, 1);
}

#[test]
fn unavailable_geometry_is_a_status() {
    // Epoch 0 segment 5 is two isolated points: no plane, no neighbours.
    let e0 = PointSet::from_segments(
        vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)],
        vec![5, 5],
    )
    .unwrap();
    let e1 = PointSet::from_segments(vec![Point3::new(0.0, 0.0, 0.1)], vec![6]).unwrap();
    let params = GeometryParams::default();
    let index0 = SegmentGeometryIndex::build(&e0, &params);
    let index1 = SegmentGeometryIndex::build(&e1, &params);
    let ids0: BTreeSet<_> = e0.segment_id_set();
    let ids1: BTreeSet<_> = e1.segment_id_set();
    let table = CorrespondenceTable::from_entries(
        [CorrespondenceEntry {
            epoch0: SegmentId(5),
            epoch1: SegmentId(6),
            extra: Vec::new(),
        }],
        &ids0,
        &ids1,
    );
    let out = DistanceEngine::default()
        .run(&index0, &index1, &table, &ids(&[5]), 5.0, 0.0)
        .unwrap();
    assert_eq!(out[0].status, DistanceStatus::GeometryUnavailable);
    assert!(out[0].distance.is_nan());
}

#[test]
fn rejects_invalid_parameters() {
    let f = fixture(&[(0, 10)]);
    let engine = DistanceEngine::default();
    let run = |queries: &[SegmentId], radius: f64, reg: f64| {
        engine.run(&f.index0, &f.index1, &f.table, queries, radius, reg)
    };
    assert!(matches!(run(&[], 1.0, 0.0), Err(Error::InvalidParameter(_))));
    assert!(matches!(run(&ids(&[0]), 0.0, 0.0), Err(Error::InvalidParameter(_))));
    assert!(matches!(run(&ids(&[0]), f64::NAN, 0.0), Err(Error::InvalidParameter(_))));
    assert!(matches!(run(&ids(&[0]), 1.0, -0.1), Err(Error::InvalidParameter(_))));
}

#[test]
fn cancelled_batch_returns_no_results() {
    let f = fixture(&[(0, 10)]);
    let inputs = DistanceInputs {
        epoch0: &f.index0,
        epoch1: &f.index1,
        correspondences: &f.table,
        search_radius: 5.0,
        registration_error: 0.0,
    };
    let cancel = CancelFlag::new();
    cancel.cancel();
    let result = DistanceEngine::default().run_with_cancel(&inputs, &ids(&[0, 1, 2]), &cancel);
    assert!(matches!(result, Err(Error::Cancelled)));
}

fn pair_table(e0: &PointSet, e1: &PointSet, pairs: &[(u64, u64)]) -> CorrespondenceTable {
    let entries = pairs.iter().map(|&(a, b)| CorrespondenceEntry {
        epoch0: SegmentId(a),
        epoch1: SegmentId(b),
        extra: Vec::new(),
    });
    CorrespondenceTable::from_entries(entries, &e0.segment_id_set(), &e1.segment_id_set())
}

/// 41×41 samples of `z = 0.3 x²` over `[-2, 2]²`.
fn parabolic_sheet(id: i64) -> PointSet {
    let (mut coords, mut ids) = (Vec::new(), Vec::new());
    for i in 0..41 {
        for j in 0..41 {
            let x = -2.0 + i as f64 * 0.1;
            let y = -2.0 + j as f64 * 0.1;
            coords.push(Point3::new(x, y, 0.3 * x * x));
            ids.push(id);
        }
    }
    PointSet::from_segments(coords, ids).unwrap()
}

#[test]
fn identical_curved_segments_measure_zero_at_any_radius() {
    let e0 = parabolic_sheet(0);
    let e1 = parabolic_sheet(1);
    let params = GeometryParams::default();
    let index0 = SegmentGeometryIndex::build(&e0, &params);
    let index1 = SegmentGeometryIndex::build(&e1, &params);
    let table = pair_table(&e0, &e1, &[(0, 1)]);

    let spread = index0.get(SegmentId(0)).unwrap().spread;
    assert!(spread > 0.1);
    for radius in [0.5, 1.0, 5.0] {
        let out = DistanceEngine::default()
            .run(&index0, &index1, &table, &ids(&[0]), radius, 0.01)
            .unwrap();
        let r = &out[0];
        assert_eq!(r.status, DistanceStatus::Computed, "radius {radius}");
        assert_relative_eq!(r.distance, 0.0, epsilon = 1e-9);
        assert_eq!(r.candidates, 41 * 41);
        let expected = (2.0 * spread * spread).sqrt() / 41.0 + 0.01;
        assert_relative_eq!(r.uncertainty, expected, epsilon = 1e-9);
    }
}

#[test]
fn collinear_segments_borrow_or_lack_a_normal() {
    let (mut c0, mut i0) = (Vec::new(), Vec::new());
    grid([0.0, 0.0, 0.0], 0, &mut c0, &mut i0);
    // Line of four points lying on patch 0.
    for k in 0..4 {
        c0.push(Point3::new(0.1 + k as f64 * 0.1, 0.5, 0.0));
        i0.push(6);
    }
    // Line of four points with no plane nearby.
    for k in 0..4 {
        c0.push(Point3::new(10.0 + k as f64, 0.0, 0.0));
        i0.push(5);
    }
    let (mut c1, mut i1) = (Vec::new(), Vec::new());
    for k in 0..4 {
        c1.push(Point3::new(0.1 + k as f64 * 0.1, 0.5, 0.2));
        i1.push(16);
    }
    for k in 0..4 {
        c1.push(Point3::new(10.0 + k as f64, 0.0, 0.1));
        i1.push(15);
    }
    let e0 = PointSet::from_segments(c0, i0).unwrap();
    let e1 = PointSet::from_segments(c1, i1).unwrap();
    let params = GeometryParams::default();
    let index0 = SegmentGeometryIndex::build(&e0, &params);
    let index1 = SegmentGeometryIndex::build(&e1, &params);
    assert_eq!(
        index0.get(SegmentId(6)).unwrap().normal_source,
        NormalSource::Neighbors
    );
    assert_eq!(
        index0.get(SegmentId(5)).unwrap().normal_source,
        NormalSource::Unavailable
    );

    let table = pair_table(&e0, &e1, &[(6, 16), (5, 15)]);
    let out = DistanceEngine::default()
        .run(&index0, &index1, &table, &ids(&[6, 5]), 2.0, 0.01)
        .unwrap();
    assert_eq!(out[0].status, DistanceStatus::Computed);
    assert_relative_eq!(out[0].distance, 0.2, epsilon = 1e-9);
    assert_relative_eq!(out[0].uncertainty, 0.01, epsilon = 1e-9);
    assert_eq!(out[1].status, DistanceStatus::GeometryUnavailable);
    assert_eq!(out[1].correspondent, Some(SegmentId(15)));
}
