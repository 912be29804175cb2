//! Artifact export: model, feature configuration, and training report.
//!
//! Each document is written to a temp sibling and renamed into place, so a
//! concurrent reader never observes a partially-written file. Existing
//! artifacts are fully overwritten; there are no merge semantics across runs.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{
    FEATURE_NAMES, SEX_MAP, SIRE_FREQ_THRESHOLD, TARGET_COLUMN, TARGET_TRANSFORM,
};
use crate::error::PipelineError;
use crate::features::EncoderSet;
use crate::gbdt::GbdtModel;
use crate::trainer::TrainingReport;

pub const MODEL_FILE: &str = "model.json";
pub const FEATURE_CONFIG_FILE: &str = "feature_config.json";
pub const TRAINING_REPORT_FILE: &str = "training_report.json";

/// The contract a separate runtime uses to rebuild an identical feature
/// vector for a new horse: ordered names, target transform, and every fitted
/// encoding table, stored verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureConfig {
    pub features: Vec<String>,
    pub target: String,
    pub target_transform: String,
    pub sex_map: BTreeMap<String, i64>,
    pub sire_classes: Vec<String>,
    pub damsire_classes: Vec<String>,
    pub sire_target_encoding: BTreeMap<String, f64>,
    pub damsire_target_encoding: BTreeMap<String, f64>,
    pub sire_freq_threshold: usize,
}

impl FeatureConfig {
    pub fn from_encoders(encoders: &EncoderSet) -> Self {
        Self {
            features: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            target: TARGET_COLUMN.to_string(),
            target_transform: TARGET_TRANSFORM.to_string(),
            sex_map: SEX_MAP
                .iter()
                .map(|&(code, num)| (code.to_string(), num))
                .collect(),
            sire_classes: encoders.sire.ordinal.classes.clone(),
            damsire_classes: encoders.damsire.ordinal.classes.clone(),
            sire_target_encoding: encoders.sire.target_mean.means.clone(),
            damsire_target_encoding: encoders.damsire.target_mean.means.clone(),
            sire_freq_threshold: SIRE_FREQ_THRESHOLD,
        }
    }
}

fn artifact_error(path: &Path, source: io::Error) -> PipelineError {
    PipelineError::ArtifactWrite {
        path: path.to_path_buf(),
        source,
    }
}

/// Serialize to a temp sibling, then rename over the destination.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| artifact_error(path, io::Error::new(io::ErrorKind::InvalidData, e)))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    let tmp = path.with_file_name(format!("{file_name}.tmp"));

    fs::write(&tmp, json).map_err(|e| artifact_error(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| artifact_error(path, e))?;
    Ok(())
}

/// Write the three independent artifacts into `out_dir`, creating it if
/// absent.
pub fn export_artifacts(
    out_dir: &Path,
    model: &GbdtModel,
    feature_config: &FeatureConfig,
    report: &TrainingReport,
) -> Result<(PathBuf, PathBuf, PathBuf), PipelineError> {
    fs::create_dir_all(out_dir).map_err(|e| artifact_error(out_dir, e))?;

    let model_path = out_dir.join(MODEL_FILE);
    write_json_atomic(&model_path, model)?;
    info!(path = %model_path.display(), "model saved");

    let config_path = out_dir.join(FEATURE_CONFIG_FILE);
    write_json_atomic(&config_path, feature_config)?;
    info!(path = %config_path.display(), "feature config saved");

    let report_path = out_dir.join(TRAINING_REPORT_FILE);
    write_json_atomic(&report_path, report)?;
    info!(path = %report_path.display(), "training report saved");

    Ok((model_path, config_path, report_path))
}
