//! End-to-end training pipeline.
//!
//! Strictly linear: load → aggregate → encode/assemble → train → export.
//! A run either completes and overwrites the three artifacts, or the process
//! exits non-zero; there is no retry and no partial output.

use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::aggregate;
use crate::config::TrainParams;
use crate::export::{self, FeatureConfig};
use crate::features;
use crate::loader;
use crate::trainer;

/// Run the full pipeline against the two input tables, writing artifacts
/// into `out_dir`.
pub fn run(
    races_csv: &Path,
    horses_csv: &Path,
    out_dir: &Path,
    params: &TrainParams,
) -> Result<()> {
    info!("loading data");
    let races = loader::load_races(races_csv)?;
    let horses = loader::load_horses(horses_csv)?;
    info!(races = races.len(), horses = horses.len(), "data loaded");

    info!("aggregating race records");
    let aggregates = aggregate::aggregate(&races);
    info!(horses_with_form = aggregates.len(), "aggregation complete");

    info!("assembling feature matrix");
    let (matrix, encoders) = features::assemble(&horses, &aggregates)?;

    info!("training model");
    let outcome = trainer::train_model(&matrix, params)?;

    info!("exporting artifacts");
    let feature_config = FeatureConfig::from_encoders(&encoders);
    export::export_artifacts(out_dir, &outcome.model, &feature_config, &outcome.report)?;

    info!("pipeline complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FEATURE_NAMES;
    use crate::error::PipelineError;
    use std::fmt::Write as _;
    use std::fs;
    use std::path::PathBuf;

    const RACES_HEADER: &str = "horse_id,position,prize,official_rating,sp_dec,\
weight_carried_lbs,number_of_runners,age,distance_furlongs,going,surface,race_class";

    /// Three horses: one with ten ranked races (three wins), one with a
    /// single race, one whose rank is always missing.
    fn write_inputs(dir: &Path) -> (PathBuf, PathBuf) {
        let mut races = String::from(RACES_HEADER);
        races.push('\n');
        for i in 0..10 {
            let position = if i < 3 { 1 } else { 4 + i % 3 };
            writeln!(
                races,
                "steady,{position},500,80,5.0,130,10,4,1m2f,Good,Turf,Class 4"
            )
            .unwrap();
        }
        races.push_str("oneshot,2,800,75,3.5,128,8,3,5f,Soft,Turf,Class 5\n");
        for _ in 0..4 {
            races.push_str("norank,,0,,,,,,6f,Good,Turf,Class 6\n");
        }

        let horses = "horse_id,sex,sire,damsire,total_prize,peak_official_rating,wins,total_runs\n\
                      steady,G,Galileo,Danehill,15000,82,3,10\n\
                      oneshot,F,Frankel,Pivotal,800,75,0,1\n\
                      norank,C,Dubawi,Sadler's Wells,0,,0,4\n";

        let races_path = dir.join("races.csv");
        let horses_path = dir.join("horses.csv");
        fs::write(&races_path, races).unwrap();
        fs::write(&horses_path, horses).unwrap();
        (races_path, horses_path)
    }

    fn small_params() -> TrainParams {
        TrainParams {
            n_trees: 30,
            learning_rate: 0.2,
            max_depth: 3,
            subsample: 1.0,
            colsample_bytree: 1.0,
            min_child_weight: 1.0,
            reg_alpha: 0.0,
            reg_lambda: 1.0,
            n_folds: 2,
            seed: 42,
        }
    }

    #[test]
    fn test_end_to_end_three_horse_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let (races_path, horses_path) = write_inputs(dir.path());
        let out_dir = dir.path().join("artifacts");

        // The no-rank horse is excluded before the join, so the matrix has
        // exactly two rows and every cell is a concrete number.
        let races = loader::load_races(&races_path).unwrap();
        let horses = loader::load_horses(&horses_path).unwrap();
        let aggregates = aggregate::aggregate(&races);
        assert_eq!(aggregates.len(), 2);

        let (matrix, _) = features::assemble(&horses, &aggregates).unwrap();
        assert_eq!(matrix.x.nrows(), 2);
        assert_eq!(matrix.x.ncols(), FEATURE_NAMES.len());
        assert!(matrix.x.iter().all(|v| v.is_finite()));

        let steady = matrix
            .horse_ids
            .iter()
            .position(|id| id == "steady")
            .unwrap();
        let win_rate_col = FEATURE_NAMES.iter().position(|n| *n == "win_rate").unwrap();
        assert!((matrix.x[[steady, win_rate_col]] - 0.3).abs() < 1e-6);
        let dist_col = FEATURE_NAMES
            .iter()
            .position(|n| *n == "avg_distance")
            .unwrap();
        assert!((matrix.x[[steady, dist_col]] - 10.0).abs() < 1e-6);

        run(&races_path, &horses_path, &out_dir, &small_params()).unwrap();

        let report: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(out_dir.join("training_report.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(report["n_samples_total"], 2);
        assert!(report["n_samples_train"].as_u64().unwrap() <= 2);
        assert_eq!(report["n_features"], FEATURE_NAMES.len() as u64);

        assert!(out_dir.join("model.json").exists());
        assert!(out_dir.join("feature_config.json").exists());
    }

    #[test]
    fn test_default_fold_count_fatal_on_tiny_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let (races_path, horses_path) = write_inputs(dir.path());
        let out_dir = dir.path().join("artifacts");

        // Two positive-target rows cannot satisfy k = 5.
        let err = run(
            &races_path,
            &horses_path,
            &out_dir,
            &TrainParams::default(),
        )
        .unwrap_err();

        let pipeline_err = err.downcast_ref::<PipelineError>().unwrap();
        assert!(matches!(
            pipeline_err,
            PipelineError::InsufficientTrainingData {
                available: 2,
                required: 5
            }
        ));
        // Nothing was written.
        assert!(!out_dir.join("model.json").exists());
    }
}
