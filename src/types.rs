//! Row types flowing through the training pipeline.
//!
//! Numeric fields that can legitimately be absent stay `Option<f64>` until
//! the feature assembler resolves them; the aggregation engine computes its
//! statistics over present values only.

use serde::Serialize;
use std::collections::BTreeMap;

/// One historical race participation, normalized from the raw CSV.
#[derive(Debug, Clone, Default)]
pub struct RaceRecord {
    pub horse_id: String,
    /// Finishing position. Missing when the horse did not finish or the
    /// result was not recorded; such records are excluded from aggregation.
    pub position: Option<f64>,
    /// Prize won in this race. Missing cells load as 0 (absence means no
    /// prize, not unknown prize).
    pub prize: f64,
    pub official_rating: Option<f64>,
    /// Starting price as a decimal.
    pub sp_dec: Option<f64>,
    pub weight_carried_lbs: Option<f64>,
    pub number_of_runners: Option<f64>,
    pub age: Option<f64>,
    /// Race distance in furlongs, normalized from the raw text field.
    pub distance_furlongs: Option<f64>,
    pub going: String,
    pub surface: String,
    pub race_class: String,
}

/// One lifetime summary row per horse, supplied externally.
#[derive(Debug, Clone, Default)]
pub struct HorseSummary {
    pub horse_id: String,
    pub sex: String,
    pub sire: String,
    pub damsire: String,
    /// Lifetime prize money: the prediction target. Missing loads as 0.
    pub total_prize: f64,
    pub peak_official_rating: Option<f64>,
    pub wins: f64,
    pub total_runs: f64,
}

/// Lifetime aggregates folded from one horse's ranked race records.
///
/// Built once per training run and never mutated. Rates and shares lie in
/// [0, 1]; count denominators are floored at 1 so they never divide by zero.
#[derive(Debug, Clone, Serialize)]
pub struct HorseAggregates {
    pub horse_id: String,
    pub race_count: usize,
    pub win_count: usize,
    pub place_count: usize,
    pub win_rate: f64,
    pub place_rate: f64,
    pub avg_position: f64,
    /// Population std of finishing position; 0 for a single-race horse.
    pub std_position: f64,
    pub best_position: f64,
    pub worst_position: f64,
    /// Mean of position / max(field size, 1) over records with a field size.
    pub avg_norm_position: Option<f64>,
    pub avg_field_size: Option<f64>,
    pub avg_sp: Option<f64>,
    pub min_sp: Option<f64>,
    pub avg_weight: Option<f64>,
    pub avg_distance: Option<f64>,
    /// Population std of distance; 0 when fewer than two distances known.
    pub std_distance: f64,
    /// Event-level prize aggregates. Kept for reporting; never features.
    pub total_prize_races: f64,
    pub avg_prize: f64,
    pub max_prize: f64,
    pub avg_official_rating: Option<f64>,
    pub max_official_rating: Option<f64>,
    pub age_last: Option<f64>,
    /// Mean numeric class (1 best .. 6 worst); 5.0 when no class observed.
    pub avg_class: f64,
    /// Best (minimum) numeric class; 6.0 when no class observed.
    pub best_class: f64,
    /// Share of races per going category; unobserved categories are 0.
    pub going_share: BTreeMap<String, f64>,
    /// Share of races per surface category; unobserved categories are 0.
    pub surface_share: BTreeMap<String, f64>,
}
