use crate::diagnostics::{
    CollisionStage, CorrespondenceStage, DistanceStage, GeometryStage, TimingBreakdown,
};
use crate::types::DistanceResult;
use serde::Serialize;

/// Result produced by [`Pbm3c2::run_with_diagnostics`](crate::Pbm3c2) and
/// [`Pbm3c2::compute`](crate::Pbm3c2).
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeReport {
    pub results: Vec<DistanceResult>,
    pub trace: PipelineTrace,
}

/// End-to-end trace describing what the pipeline executed.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTrace {
    pub input: InputDescriptor,
    pub timings: TimingBreakdown,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collision: Option<CollisionStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correspondences: Option<CorrespondenceStage>,
    pub geometry: [GeometryStage; 2],
    pub distances: DistanceStage,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    pub points_epoch0: usize,
    pub points_epoch1: usize,
    pub queries: usize,
    pub search_radius: f64,
    pub registration_error: f64,
}
