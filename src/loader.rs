//! CSV ingestion and schema normalization.
//!
//! Declared numeric fields come out as either a finite number or `None`:
//! empty cells, non-numeric tokens, and non-finite values all map to missing,
//! never to zero, so downstream means are not biased. The exceptions are the
//! prize/win/run totals, where an absent cell means zero by definition.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

use crate::error::PipelineError;
use crate::types::{HorseSummary, RaceRecord};

/// Distance conversion constant for mile/furlong shorthand.
pub const FURLONGS_PER_MILE: f64 = 8.0;

/// Parse a cell as a finite number, or missing.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Normalize a distance string to furlongs.
///
/// Accepts `"5f"`, `"11.5f"`, `"1m"`, `"1m2f"`, and bare numbers (already
/// furlongs). Miles convert at [`FURLONGS_PER_MILE`]. Anything unparsable is
/// missing, not an error.
pub fn parse_furlongs(raw: &str) -> Option<f64> {
    let s: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if s.is_empty() {
        return None;
    }

    let total = if let Some(m_pos) = s.find('m') {
        let miles: f64 = s[..m_pos].parse().ok()?;
        let rest = &s[m_pos + 1..];
        let furlongs: f64 = if rest.is_empty() {
            0.0
        } else {
            rest.strip_suffix('f').unwrap_or(rest).parse().ok()?
        };
        miles * FURLONGS_PER_MILE + furlongs
    } else {
        s.strip_suffix('f').unwrap_or(&s).parse().ok()?
    };

    total.is_finite().then_some(total)
}

/// Header-name to column-index lookup for one table.
struct ColumnIndex<'a> {
    table: &'a str,
    by_name: HashMap<String, usize>,
}

impl<'a> ColumnIndex<'a> {
    fn new(table: &'a str, headers: &csv::StringRecord) -> Self {
        let by_name = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        Self { table, by_name }
    }

    /// Index of a required column, or a fatal schema error.
    fn require(&self, column: &str) -> Result<usize, PipelineError> {
        self.by_name
            .get(column)
            .copied()
            .ok_or_else(|| PipelineError::InputSchema {
                table: self.table.to_string(),
                column: column.to_string(),
            })
    }
}

fn cell<'r>(record: &'r csv::StringRecord, idx: usize) -> &'r str {
    record.get(idx).unwrap_or("")
}

/// Load and normalize the event-level race results table.
pub fn load_races(path: &Path) -> Result<Vec<RaceRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open races csv {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let idx = ColumnIndex::new("races", &headers);
    let horse_id = idx.require("horse_id")?;
    let position = idx.require("position")?;
    let prize = idx.require("prize")?;
    let official_rating = idx.require("official_rating")?;
    let sp_dec = idx.require("sp_dec")?;
    let weight_carried_lbs = idx.require("weight_carried_lbs")?;
    let number_of_runners = idx.require("number_of_runners")?;
    let age = idx.require("age")?;
    let distance_furlongs = idx.require("distance_furlongs")?;
    let going = idx.require("going")?;
    let surface = idx.require("surface")?;
    let race_class = idx.require("race_class")?;

    let mut races = Vec::new();
    for result in reader.records() {
        let record = result.context("failed to read races csv record")?;
        races.push(RaceRecord {
            horse_id: cell(&record, horse_id).trim().to_string(),
            position: parse_numeric(cell(&record, position)),
            prize: parse_numeric(cell(&record, prize)).unwrap_or(0.0),
            official_rating: parse_numeric(cell(&record, official_rating)),
            sp_dec: parse_numeric(cell(&record, sp_dec)),
            weight_carried_lbs: parse_numeric(cell(&record, weight_carried_lbs)),
            number_of_runners: parse_numeric(cell(&record, number_of_runners)),
            age: parse_numeric(cell(&record, age)),
            distance_furlongs: parse_furlongs(cell(&record, distance_furlongs)),
            going: cell(&record, going).trim().to_string(),
            surface: cell(&record, surface).trim().to_string(),
            race_class: cell(&record, race_class).trim().to_string(),
        });
    }

    Ok(races)
}

/// Load and normalize the per-horse lifetime summary table.
pub fn load_horses(path: &Path) -> Result<Vec<HorseSummary>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open horses csv {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let idx = ColumnIndex::new("horses", &headers);
    let horse_id = idx.require("horse_id")?;
    let sex = idx.require("sex")?;
    let sire = idx.require("sire")?;
    let damsire = idx.require("damsire")?;
    let total_prize = idx.require("total_prize")?;
    let peak_official_rating = idx.require("peak_official_rating")?;
    let wins = idx.require("wins")?;
    let total_runs = idx.require("total_runs")?;

    let mut horses = Vec::new();
    for result in reader.records() {
        let record = result.context("failed to read horses csv record")?;
        horses.push(HorseSummary {
            horse_id: cell(&record, horse_id).trim().to_string(),
            sex: cell(&record, sex).trim().to_string(),
            sire: cell(&record, sire).trim().to_string(),
            damsire: cell(&record, damsire).trim().to_string(),
            total_prize: parse_numeric(cell(&record, total_prize)).unwrap_or(0.0),
            peak_official_rating: parse_numeric(cell(&record, peak_official_rating)),
            wins: parse_numeric(cell(&record, wins)).unwrap_or(0.0),
            total_runs: parse_numeric(cell(&record, total_runs)).unwrap_or(0.0),
        });
    }

    Ok(horses)
}
