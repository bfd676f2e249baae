use serde::{Deserialize, Serialize};

/// Identifier of a segment within one epoch (non-negative `segment_id` value).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub u64);

impl SegmentId {
    /// Interpret a raw attribute value; negative values mark unsegmented points.
    pub fn from_raw(raw: i64) -> Option<Self> {
        u64::try_from(raw).ok().map(SegmentId)
    }
}

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SegmentId {
    fn from(value: u64) -> Self {
        SegmentId(value)
    }
}

/// Outcome of a single distance query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceStatus {
    Computed,
    NoCorrespondence,
    OutOfRadius,
    GeometryUnavailable,
}

impl DistanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceStatus::Computed => "computed",
            DistanceStatus::NoCorrespondence => "no-correspondence",
            DistanceStatus::OutOfRadius => "out-of-radius",
            DistanceStatus::GeometryUnavailable => "geometry-unavailable",
        }
    }
}

impl std::fmt::Display for DistanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed change estimate for one queried epoch-0 segment.
///
/// `distance` and `uncertainty` are NaN unless `status` is
/// [`DistanceStatus::Computed`]; JSON output renders those as `null`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistanceResult {
    pub query_id: SegmentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correspondent: Option<SegmentId>,
    pub distance: f64,
    pub uncertainty: f64,
    pub status: DistanceStatus,
    /// Number of epoch-1 points that entered the estimate.
    pub candidates: usize,
    /// Whether the sparse-segment neighbourhood fallback contributed points.
    pub used_neighbors: bool,
}

impl DistanceResult {
    pub fn unresolved(
        query_id: SegmentId,
        correspondent: Option<SegmentId>,
        status: DistanceStatus,
    ) -> Self {
        Self {
            query_id,
            correspondent,
            distance: f64::NAN,
            uncertainty: f64::NAN,
            status,
            candidates: 0,
            used_neighbors: false,
        }
    }

    pub fn is_computed(&self) -> bool {
        self.status == DistanceStatus::Computed
    }
}
