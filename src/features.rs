//! Feature assembly: join, encode, and build the numeric matrix.
//!
//! This is the single place where missing values become concrete numbers.
//! Earlier stages keep `Option<f64>` so statistics stay unbiased; here every
//! remaining `None` resolves to 0 immediately before matrix construction.

use anyhow::{ensure, Result};
use ndarray::Array2;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use crate::config::{FEATURE_NAMES, SIRE_FREQ_THRESHOLD};
use crate::encoding::{encode_sex, FittedEncoder};
use crate::types::{HorseAggregates, HorseSummary};

/// Fitted encoders for both lineage attributes, persisted into the feature
/// configuration artifact.
#[derive(Debug, Clone)]
pub struct EncoderSet {
    pub sire: FittedEncoder,
    pub damsire: FittedEncoder,
}

/// The assembled training table: one row per joined horse, columns exactly
/// matching [`FEATURE_NAMES`].
#[derive(Debug)]
pub struct FeatureMatrix {
    pub x: Array2<f32>,
    pub y: Vec<f64>,
    pub horse_ids: Vec<String>,
}

fn fill(value: Option<f64>) -> f32 {
    value.unwrap_or(0.0) as f32
}

fn build_row(
    summary: &HorseSummary,
    agg: &HorseAggregates,
    encoders: &EncoderSet,
) -> Vec<f32> {
    let going = |cat: &str| fill(agg.going_share.get(cat).copied());
    let (sire_ordinal, sire_avg_prize) = encoders.sire.apply(&summary.sire);
    let (damsire_ordinal, damsire_avg_prize) = encoders.damsire.apply(&summary.damsire);

    // Order must match FEATURE_NAMES exactly.
    vec![
        agg.race_count as f32,
        agg.win_count as f32,
        agg.place_count as f32,
        agg.avg_position as f32,
        agg.std_position as f32,
        agg.best_position as f32,
        agg.worst_position as f32,
        fill(agg.avg_norm_position),
        fill(agg.avg_field_size),
        fill(agg.avg_sp),
        fill(agg.min_sp),
        fill(agg.avg_weight),
        fill(agg.avg_distance),
        agg.std_distance as f32,
        fill(agg.avg_official_rating),
        fill(agg.max_official_rating),
        fill(agg.age_last),
        agg.win_rate as f32,
        agg.place_rate as f32,
        agg.avg_class as f32,
        agg.best_class as f32,
        going("Firm"),
        going("Good"),
        going("Good to Firm"),
        going("Good to Soft"),
        going("Soft"),
        fill(agg.surface_share.get("Turf").copied()),
        encode_sex(&summary.sex) as f32,
        sire_ordinal as f32,
        damsire_ordinal as f32,
        sire_avg_prize as f32,
        damsire_avg_prize as f32,
    ]
}

/// Inner-join summaries with aggregates, fit the lineage encoders on the
/// joined rows, and build the ordered feature matrix plus target vector.
///
/// Horses present on only one side are excluded; the drop counts are logged
/// so the population shrink stays observable.
pub fn assemble(
    horses: &[HorseSummary],
    aggregates: &[HorseAggregates],
) -> Result<(FeatureMatrix, EncoderSet)> {
    let agg_by_id: HashMap<&str, &HorseAggregates> = aggregates
        .iter()
        .map(|a| (a.horse_id.as_str(), a))
        .collect();

    let joined: Vec<(&HorseSummary, &HorseAggregates)> = horses
        .iter()
        .filter_map(|h| agg_by_id.get(h.horse_id.as_str()).map(|a| (h, *a)))
        .collect();

    // Count drops by id, not row arithmetic: a duplicated summary id joins
    // the same aggregate more than once, so joined rows can outnumber either
    // side.
    let joined_ids: HashSet<&str> = joined.iter().map(|(h, _)| h.horse_id.as_str()).collect();
    let dropped_summaries = horses
        .iter()
        .filter(|h| !joined_ids.contains(h.horse_id.as_str()))
        .count();
    let dropped_aggregates = aggregates
        .iter()
        .filter(|a| !joined_ids.contains(a.horse_id.as_str()))
        .count();
    if dropped_summaries > 0 || dropped_aggregates > 0 {
        warn!(
            dropped_summaries,
            dropped_aggregates, "join excluded horses present on only one side"
        );
    }
    info!(rows = joined.len(), "joined feature table");

    let targets: Vec<f64> = joined.iter().map(|(h, _)| h.total_prize).collect();
    let sires: Vec<String> = joined.iter().map(|(h, _)| h.sire.clone()).collect();
    let damsires: Vec<String> = joined.iter().map(|(h, _)| h.damsire.clone()).collect();

    let encoders = EncoderSet {
        sire: FittedEncoder::fit(&sires, &targets, SIRE_FREQ_THRESHOLD),
        damsire: FittedEncoder::fit(&damsires, &targets, SIRE_FREQ_THRESHOLD),
    };

    let mut data = Vec::with_capacity(joined.len() * FEATURE_NAMES.len());
    let mut horse_ids = Vec::with_capacity(joined.len());
    for (summary, agg) in &joined {
        let row = build_row(summary, agg, &encoders);
        debug_assert_eq!(row.len(), FEATURE_NAMES.len());
        data.extend_from_slice(&row);
        horse_ids.push(summary.horse_id.clone());
    }

    let n_rows = joined.len();
    let x = Array2::from_shape_vec((n_rows, FEATURE_NAMES.len()), data)?;
    ensure!(
        x.iter().all(|v| v.is_finite()),
        "feature matrix contains non-finite values"
    );

    Ok((
        FeatureMatrix {
            x,
            y: targets,
            horse_ids,
        },
        encoders,
    ))
}
