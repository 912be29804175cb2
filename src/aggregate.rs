//! Aggregation engine: folds race records into per-horse lifetime features.
//!
//! Records without a finishing position carry no signal and are dropped
//! before grouping; a horse with only unranked records produces no row.
//! The fold is commutative, so record order never changes the output.

use std::collections::BTreeMap;

use crate::config::{GOING_CATEGORIES, SURFACE_CATEGORIES};
use crate::types::{HorseAggregates, RaceRecord};

/// Numeric class sentinel used when a horse has no parsed class label.
const DEFAULT_AVG_CLASS: f64 = 5.0;
const DEFAULT_BEST_CLASS: f64 = 6.0;

/// Mean over present values; `None` when nothing is present.
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Population standard deviation; 0 for empty or single-value slices.
fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

fn min_of(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

fn max_of(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Map a class label ("Class 1" .. "Class 6") to its numeric scale.
fn class_value(label: &str) -> Option<f64> {
    match label.trim() {
        "Class 1" => Some(1.0),
        "Class 2" => Some(2.0),
        "Class 3" => Some(3.0),
        "Class 4" => Some(4.0),
        "Class 5" => Some(5.0),
        "Class 6" => Some(6.0),
        _ => None,
    }
}

fn going_of(record: &RaceRecord) -> &str {
    &record.going
}

fn surface_of(record: &RaceRecord) -> &str {
    &record.surface
}

/// Share of records matching each configured category.
fn category_shares(
    records: &[&RaceRecord],
    categories: &[&str],
    field: fn(&RaceRecord) -> &str,
) -> BTreeMap<String, f64> {
    let total = records.len().max(1) as f64;
    categories
        .iter()
        .map(|cat| {
            let count = records
                .iter()
                .filter(|r| field(r).trim() == *cat)
                .count();
            (cat.to_string(), count as f64 / total)
        })
        .collect()
}

fn fold_horse(horse_id: &str, records: &[&RaceRecord]) -> HorseAggregates {
    let race_count = records.len();
    let denom = race_count.max(1) as f64;

    let positions: Vec<f64> = records.iter().filter_map(|r| r.position).collect();
    let win_count = positions.iter().filter(|&&p| p == 1.0).count();
    let place_count = positions.iter().filter(|&&p| p <= 3.0).count();

    let norm_positions: Vec<f64> = records
        .iter()
        .filter_map(|r| {
            let pos = r.position?;
            let field = r.number_of_runners?;
            Some(pos / field.max(1.0))
        })
        .collect();

    let field_sizes: Vec<f64> = records.iter().filter_map(|r| r.number_of_runners).collect();
    let sps: Vec<f64> = records.iter().filter_map(|r| r.sp_dec).collect();
    let weights: Vec<f64> = records
        .iter()
        .filter_map(|r| r.weight_carried_lbs)
        .collect();
    let distances: Vec<f64> = records.iter().filter_map(|r| r.distance_furlongs).collect();
    let ratings: Vec<f64> = records.iter().filter_map(|r| r.official_rating).collect();
    let ages: Vec<f64> = records.iter().filter_map(|r| r.age).collect();
    let prizes: Vec<f64> = records.iter().map(|r| r.prize).collect();
    let classes: Vec<f64> = records
        .iter()
        .filter_map(|r| class_value(&r.race_class))
        .collect();

    HorseAggregates {
        horse_id: horse_id.to_string(),
        race_count,
        win_count,
        place_count,
        win_rate: win_count as f64 / denom,
        place_rate: place_count as f64 / denom,
        avg_position: mean(&positions).unwrap_or(0.0),
        std_position: population_std(&positions),
        best_position: min_of(&positions).unwrap_or(0.0),
        worst_position: max_of(&positions).unwrap_or(0.0),
        avg_norm_position: mean(&norm_positions),
        avg_field_size: mean(&field_sizes),
        avg_sp: mean(&sps),
        min_sp: min_of(&sps),
        avg_weight: mean(&weights),
        avg_distance: mean(&distances),
        std_distance: population_std(&distances),
        total_prize_races: prizes.iter().sum(),
        avg_prize: mean(&prizes).unwrap_or(0.0),
        max_prize: max_of(&prizes).unwrap_or(0.0),
        avg_official_rating: mean(&ratings),
        max_official_rating: max_of(&ratings),
        age_last: max_of(&ages),
        avg_class: mean(&classes).unwrap_or(DEFAULT_AVG_CLASS),
        best_class: min_of(&classes).unwrap_or(DEFAULT_BEST_CLASS),
        going_share: category_shares(records, &GOING_CATEGORIES, going_of),
        surface_share: category_shares(records, &SURFACE_CATEGORIES, surface_of),
    }
}

/// Fold all ranked race records into one aggregate row per horse.
///
/// Output is sorted by horse id for determinism.
pub fn aggregate(races: &[RaceRecord]) -> Vec<HorseAggregates> {
    let mut groups: BTreeMap<&str, Vec<&RaceRecord>> = BTreeMap::new();
    for race in races.iter().filter(|r| r.position.is_some()) {
        groups.entry(&race.horse_id).or_default().push(race);
    }

    groups
        .iter()
        .map(|(horse_id, records)| fold_horse(horse_id, records))
        .collect()
}
