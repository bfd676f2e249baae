use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};

/// Result of a PCA fit over one segment's members.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PcaFit {
    pub centroid: Point3<f64>,
    /// Eigenvalues sorted descending.
    pub eigenvalues: [f64; 3],
    /// Eigenvector of the smallest eigenvalue, `None` when the members do not
    /// span a plane.
    pub normal: Option<Vector3<f64>>,
    pub bounding_radius: f64,
}

pub(crate) fn centroid(coords: &[Point3<f64>], members: &[usize]) -> Point3<f64> {
    if members.is_empty() {
        return Point3::origin();
    }
    let sum = members
        .iter()
        .fold(Vector3::zeros(), |acc, &idx| acc + coords[idx].coords);
    Point3::from(sum / members.len() as f64)
}

/// Centre, covariance and eigen-decompose the members. Fewer than
/// `min_points` members, coincident points, or a middle eigenvalue below
/// `collinear_tolerance * largest` leave the normal undefined.
pub(crate) fn fit_plane(
    coords: &[Point3<f64>],
    members: &[usize],
    min_points: usize,
    collinear_tolerance: f64,
) -> PcaFit {
    let c = centroid(coords, members);
    let mut cov = Matrix3::<f64>::zeros();
    let mut bounding_radius = 0.0f64;
    for &idx in members {
        let d = coords[idx] - c;
        cov += d * d.transpose();
        bounding_radius = bounding_radius.max(d.norm());
    }
    if !members.is_empty() {
        cov /= members.len() as f64;
    }

    let eig = SymmetricEigen::new(cov);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));
    let eigenvalues = order.map(|i| eig.eigenvalues[i].max(0.0));

    let [l1, l2, _] = eigenvalues;
    let spans_plane = members.len() >= min_points.max(3)
        && l1.is_finite()
        && l1 > f64::EPSILON
        && l2 > collinear_tolerance * l1;

    let normal = if spans_plane {
        let n = eig.eigenvectors.column(order[2]).into_owned();
        let norm = n.norm();
        (norm.is_finite() && norm > 1e-12).then(|| n / norm)
    } else {
        None
    };

    PcaFit {
        centroid: c,
        eigenvalues,
        normal,
        bounding_radius,
    }
}

/// Flip `normal` so that it does not point against `orientation`.
pub(crate) fn orient(normal: Vector3<f64>, orientation: &Vector3<f64>) -> Vector3<f64> {
    if normal.dot(orientation) < 0.0 {
        -normal
    } else {
        normal
    }
}

/// Population standard deviation of the members' offsets along `normal`,
/// measured from their own mean.
pub(crate) fn spread_along(coords: &[Point3<f64>], members: &[usize], normal: &Vector3<f64>) -> f64 {
    if members.is_empty() {
        return f64::NAN;
    }
    let n = members.len() as f64;
    let c = centroid(coords, members);
    let var = members
        .iter()
        .map(|&idx| {
            let h = (coords[idx] - c).dot(normal);
            h * h
        })
        .sum::<f64>()
        / n;
    var.sqrt()
}

/// `(planarity, linearity, sphericity)` from descending eigenvalues.
pub(crate) fn shape_ratios(eigenvalues: &[f64; 3]) -> (f64, f64, f64) {
    let [l1, l2, l3] = *eigenvalues;
    if l1 <= 0.0 || !l1.is_finite() {
        return (0.0, 0.0, 0.0);
    }
    ((l2 - l3) / l1, (l1 - l2) / l1, l3 / l1)
}
