use nalgebra::Point3;
use pbm3c2::PointSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Appends a flat 5×5 patch (0.25 spacing) with its corner at `(x, 0, z)`.
pub fn push_patch(x: f64, z: f64, id: i64, coords: &mut Vec<Point3<f64>>, ids: &mut Vec<i64>) {
    for i in 0..5 {
        for j in 0..5 {
            coords.push(Point3::new(x + i as f64 * 0.25, j as f64 * 0.25, z));
            ids.push(id);
        }
    }
}

/// Builds an epoch from `(x, z, id)` patches plus a few unsegmented points.
pub fn epoch(patches: &[(f64, f64, i64)]) -> PointSet {
    let (mut coords, mut ids) = (Vec::new(), Vec::new());
    for &(x, z, id) in patches {
        push_patch(x, z, id, &mut coords, &mut ids);
    }
    for k in 0..3 {
        coords.push(Point3::new(-10.0 - k as f64, -10.0, 0.0));
        ids.push(-1);
    }
    PointSet::from_segments(coords, ids).expect("valid synthetic epoch")
}

/// Two epochs with colliding IDs: epoch 0 uses {1, 2, 3}, epoch 1 uses
/// {1, 2, 4}. Raw pairs 1→1, 2→2, 3→4 move by +0.5, 0.0 and -0.2.
pub fn colliding_epochs() -> (PointSet, PointSet) {
    let epoch0 = epoch(&[(0.0, 0.0, 1), (5.0, 0.0, 2), (10.0, 0.0, 3)]);
    let epoch1 = epoch(&[(0.0, 0.5, 1), (5.0, 0.0, 2), (10.0, -0.2, 4)]);
    (epoch0, epoch1)
}

pub fn write_text(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("write fixture");
    path
}

/// Serialises an epoch as `x y z segment_id` rows.
pub fn xyz_text(epoch: &PointSet) -> String {
    let mut out = String::from("# x y z segment_id\n");
    for (p, id) in epoch.coordinates().iter().zip(epoch.segment_ids()) {
        let _ = writeln!(out, "{} {} {} {}", p.x, p.y, p.z, id);
    }
    out
}
