//! Serializable reports describing a pipeline run.
//!
//! `ChangeReport` is what the diagnostic entry points of [`crate::Pbm3c2`]
//! return: the ordered distance results together with a `PipelineTrace`
//! summarising collision repair, correspondence loading, both geometry index
//! builds, the distance status histogram and per-stage timings.

pub mod pipeline;
pub mod stages;
pub mod timing;

pub use pipeline::{ChangeReport, InputDescriptor, PipelineTrace};
pub use stages::{CollisionStage, CorrespondenceStage, DistanceStage, GeometryStage};
pub use timing::{StageTiming, TimingBreakdown};
