//! Model training: positive-target filter, log1p transform, k-fold
//! cross-validation, final fit, and report metrics.
//!
//! Cross-validation R² is computed on the log-transformed target; the
//! in-sample MAE / median-AE / R² are computed on inverse-transformed,
//! original-scale predictions. The two are different scales by design.

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::config::{TrainParams, FEATURE_NAMES};
use crate::error::PipelineError;
use crate::features::FeatureMatrix;
use crate::gbdt::{self, GbdtModel};
use crate::metrics::{mean_absolute_error, median_absolute_error, r2_score};

/// Write-once training report, serialized verbatim as the report artifact.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub cv_r2_mean: f64,
    pub cv_r2_std: f64,
    pub cv_r2_scores: Vec<f64>,
    pub train_mae: f64,
    pub train_median_ae: f64,
    pub train_r2: f64,
    pub n_samples_total: usize,
    pub n_samples_train: usize,
    pub n_features: usize,
    pub feature_importances: BTreeMap<String, f64>,
}

/// The fitted model together with its report.
#[derive(Debug)]
pub struct TrainingOutcome {
    pub model: GbdtModel,
    pub report: TrainingReport,
}

/// Shuffled k-fold split: first `n % k` folds get one extra sample.
fn kfold_indices(n: usize, k: usize, seed: u64) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let base = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut offset = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        folds.push(indices[offset..offset + size].to_vec());
        offset += size;
    }
    folds
}

fn cross_validate(x: &Array2<f32>, y_log: &[f32], params: &TrainParams) -> Vec<f64> {
    let n = y_log.len();
    let folds = kfold_indices(n, params.n_folds, params.seed);

    let mut scores = Vec::with_capacity(folds.len());
    for fold in &folds {
        let holdout: Vec<bool> = {
            let mut mask = vec![false; n];
            for &i in fold {
                mask[i] = true;
            }
            mask
        };
        let train_rows: Vec<usize> = (0..n).filter(|&i| !holdout[i]).collect();

        let x_train = x.select(Axis(0), &train_rows);
        let y_train: Vec<f32> = train_rows.iter().map(|&i| y_log[i]).collect();
        let trained = gbdt::train(&x_train, &y_train, params);

        let x_fold = x.select(Axis(0), fold);
        let preds: Vec<f64> = trained
            .model
            .predict(&x_fold)
            .into_iter()
            .map(f64::from)
            .collect();
        let actual: Vec<f64> = fold.iter().map(|&i| f64::from(y_log[i])).collect();
        scores.push(r2_score(&actual, &preds));
    }
    scores
}

/// Fit the regressor against log1p(total_prize) and evaluate it.
///
/// Rows with a non-positive target are excluded from training but counted in
/// `n_samples_total`. Fails fatally when fewer positive rows remain than the
/// configured fold count.
pub fn train_model(
    matrix: &FeatureMatrix,
    params: &TrainParams,
) -> Result<TrainingOutcome, PipelineError> {
    let n_total = matrix.y.len();
    let positive_rows: Vec<usize> = (0..n_total).filter(|&i| matrix.y[i] > 0.0).collect();
    let n_train = positive_rows.len();

    // n_folds == 0 is rejected here as well: kfold_indices divides by k.
    if n_train == 0 || params.n_folds == 0 || n_train < params.n_folds {
        return Err(PipelineError::InsufficientTrainingData {
            available: n_train,
            required: params.n_folds.max(1),
        });
    }
    info!(n_total, n_train, "training samples (positive target)");

    let x_pos = matrix.x.select(Axis(0), &positive_rows);
    let y_pos: Vec<f64> = positive_rows.iter().map(|&i| matrix.y[i]).collect();
    let y_log: Vec<f32> = y_pos.iter().map(|&v| v.ln_1p() as f32).collect();

    let cv_r2_scores = cross_validate(&x_pos, &y_log, params);
    let cv_r2_mean = cv_r2_scores.iter().sum::<f64>() / cv_r2_scores.len() as f64;
    let cv_r2_std = {
        let var = cv_r2_scores
            .iter()
            .map(|s| (s - cv_r2_mean) * (s - cv_r2_mean))
            .sum::<f64>()
            / cv_r2_scores.len() as f64;
        var.sqrt()
    };
    info!(cv_r2_mean, cv_r2_std, "cross-validation complete");

    let trained = gbdt::train(&x_pos, &y_log, params);

    // In-sample metrics on the original monetary scale.
    let preds: Vec<f64> = trained
        .model
        .predict(&x_pos)
        .into_iter()
        .map(|p| f64::from(p).exp_m1())
        .collect();
    let train_mae = mean_absolute_error(&y_pos, &preds);
    let train_median_ae = median_absolute_error(&y_pos, &preds);
    let train_r2 = r2_score(&y_pos, &preds);
    info!(train_mae, train_median_ae, train_r2, "in-sample metrics");

    let gain_total: f64 = trained.feature_gain.iter().sum();
    let feature_importances: BTreeMap<String, f64> = FEATURE_NAMES
        .iter()
        .zip(trained.feature_gain.iter())
        .map(|(name, &gain)| {
            let importance = if gain_total > 0.0 { gain / gain_total } else { 0.0 };
            (name.to_string(), importance)
        })
        .collect();

    let report = TrainingReport {
        cv_r2_mean,
        cv_r2_std,
        cv_r2_scores,
        train_mae,
        train_median_ae,
        train_r2,
        n_samples_total: n_total,
        n_samples_train: n_train,
        n_features: FEATURE_NAMES.len(),
        feature_importances,
    };

    Ok(TrainingOutcome {
        model: trained.model,
        report,
    })
}
