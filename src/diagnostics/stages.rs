use crate::collision::Resolution;
use crate::correspondence::{CorrespondenceTable, DroppedSummary};
use crate::geometry::GeometrySummary;
use crate::types::{DistanceResult, DistanceStatus};
use serde::Serialize;

/// Outcome of the segment-ID collision repair.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionStage {
    pub segments_epoch0: usize,
    pub segments_epoch1: usize,
    pub relabeled: bool,
    pub offset: u64,
}

impl CollisionStage {
    pub fn from_resolution(resolution: &Resolution) -> Self {
        Self {
            segments_epoch0: resolution.ids_epoch0.len(),
            segments_epoch1: resolution.ids_epoch1.len(),
            relabeled: resolution.relabeled,
            offset: resolution.offset,
        }
    }
}

/// Rows kept and dropped while loading the correspondence table.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrespondenceStage {
    pub kept: usize,
    pub dropped: Vec<DroppedSummary>,
}

impl CorrespondenceStage {
    pub fn from_table(table: &CorrespondenceTable) -> Self {
        Self {
            kept: table.len(),
            dropped: table.dropped().iter().map(DroppedSummary::from).collect(),
        }
    }
}

/// Per-epoch geometry index build.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryStage {
    pub elapsed_ms: f64,
    #[serde(flatten)]
    pub summary: GeometrySummary,
}

/// Status histogram of a distance batch.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DistanceStage {
    pub queries: usize,
    pub computed: usize,
    pub no_correspondence: usize,
    pub out_of_radius: usize,
    pub geometry_unavailable: usize,
    pub used_neighbors: usize,
}

impl DistanceStage {
    pub fn from_results(results: &[DistanceResult]) -> Self {
        let mut stage = Self {
            queries: results.len(),
            ..Default::default()
        };
        for r in results {
            match r.status {
                DistanceStatus::Computed => stage.computed += 1,
                DistanceStatus::NoCorrespondence => stage.no_correspondence += 1,
                DistanceStatus::OutOfRadius => stage.out_of_radius += 1,
                DistanceStatus::GeometryUnavailable => stage.geometry_unavailable += 1,
            }
            if r.used_neighbors {
                stage.used_neighbors += 1;
            }
        }
        stage
    }
}
