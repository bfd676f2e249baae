use crate::error::{Error, Result};
use crate::pipeline::Pbm3c2Params;
use crate::types::SegmentId;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Deserialize)]
pub struct EpochSource {
    pub path: PathBuf,
    /// Extra per-point columns following `x y z`, in file order.
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,
}

fn default_columns() -> Vec<String> {
    vec![crate::epoch::SEGMENT_ID.to_string()]
}

/// Epoch-0 segments to measure: an explicit list or a half-open range.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ApplyIds {
    List(Vec<u64>),
    Range { start: u64, end: u64 },
}

impl ApplyIds {
    pub fn to_segment_ids(&self) -> Vec<SegmentId> {
        match self {
            ApplyIds::List(ids) => ids.iter().copied().map(SegmentId).collect(),
            ApplyIds::Range { start, end } => (*start..*end).map(SegmentId).collect(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OutputConfig {
    pub distances_csv: Option<PathBuf>,
    pub report_json: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RuntimeConfig {
    pub epoch0: EpochSource,
    pub epoch1: EpochSource,
    pub correspondences: PathBuf,
    pub apply_ids: ApplyIds,
    pub search_radius: f64,
    #[serde(default)]
    pub params: Pbm3c2Params,
    #[serde(default)]
    pub output: OutputConfig,
}

pub fn load_config(path: &Path) -> Result<RuntimeConfig> {
    let config_error = |reason: String| Error::Config {
        path: path.to_path_buf(),
        reason,
    };
    let contents =
        fs::read_to_string(path).map_err(|e| config_error(format!("failed to read: {e}")))?;
    serde_json::from_str(&contents).map_err(|e| config_error(format!("failed to parse: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_full_config_with_range() {
        let file = write_config(
            r#"{
                "epoch0": {"path": "e0.xyz"},
                "epoch1": {"path": "e1.xyz", "columns": ["segment_id", "intensity"]},
                "correspondences": "corr.csv",
                "apply_ids": {"start": 1, "end": 4},
                "search_radius": 5.0,
                "params": {"registration_error": 0.01, "distance": {"sparse_segment_points": 5}},
                "output": {"distances_csv": "out/d.csv"}
            }"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.epoch0.columns, vec!["segment_id".to_string()]);
        assert_eq!(config.epoch1.columns.len(), 2);
        assert_eq!(
            config.apply_ids.to_segment_ids(),
            vec![SegmentId(1), SegmentId(2), SegmentId(3)]
        );
        assert_eq!(config.params.registration_error, 0.01);
        assert_eq!(config.params.distance.sparse_segment_points, 5);
        assert_eq!(config.params.geometry.min_plane_points, 3);
        assert!(config.output.report_json.is_none());
    }

    #[test]
    fn apply_ids_accepts_a_list() {
        let ids: ApplyIds = serde_json::from_str("[7, 3, 7]").unwrap();
        assert_eq!(ids, ApplyIds::List(vec![7, 3, 7]));
        assert_eq!(ids.to_segment_ids().len(), 3);
    }

    #[test]
    fn failures_map_to_config_errors() {
        let missing = load_config(Path::new("no/such/config.json")).unwrap_err();
        assert!(matches!(missing, Error::Config { .. }));

        let file = write_config(r#"{"epoch0": {"path": "a"}}"#);
        let bad = load_config(file.path()).unwrap_err();
        assert!(matches!(bad, Error::Config { .. }));
    }
}
