//! Configuration for the valuation trainer.

use serde::{Deserialize, Serialize};

/// Input data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_races_csv")]
    pub races_csv: String,
    #[serde(default = "default_horses_csv")]
    pub horses_csv: String,
}

fn default_races_csv() -> String {
    "data/raw/all_races_combined.csv".to_string()
}

fn default_horses_csv() -> String {
    "data/raw/unique_horses.csv".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            races_csv: default_races_csv(),
            horses_csv: default_horses_csv(),
        }
    }
}

/// Artifact output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_out_dir")]
    pub dir: String,
}

fn default_out_dir() -> String {
    "data/artifacts".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_out_dir(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl AppConfig {
    /// Load configuration from defaults, optional config file, and
    /// environment variables. Nesting uses a double underscore so keys with
    /// underscores survive: VALUATION_DATA__RACES_CSV, VALUATION_OUTPUT__DIR.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("VALUATION")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

/// Fixed training hyperparameters.
///
/// Values are deliberately constant between runs so the exported model is
/// reproducible from the same inputs. There is no hyperparameter search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainParams {
    pub n_trees: usize,
    pub learning_rate: f32,
    pub max_depth: usize,
    pub subsample: f32,
    pub colsample_bytree: f32,
    pub min_child_weight: f64,
    pub reg_alpha: f64,
    pub reg_lambda: f64,
    pub n_folds: usize,
    pub seed: u64,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            n_trees: 500,
            learning_rate: 0.05,
            max_depth: 6,
            subsample: 0.8,
            colsample_bytree: 0.8,
            min_child_weight: 5.0,
            reg_alpha: 1.0,
            reg_lambda: 5.0,
            n_folds: 5,
            seed: 42,
        }
    }
}

/// Feature names in model input order.
///
/// This order is the contract between the assembler, the trainer, and the
/// exported feature configuration. Event-level prize aggregates are
/// deliberately absent: they leak the lifetime-prize target.
pub const FEATURE_NAMES: [&str; 32] = [
    "race_count",
    "win_count",
    "place_count",
    "avg_position",
    "std_position",
    "best_position",
    "worst_position",
    "avg_norm_position",
    "avg_field_size",
    "avg_sp",
    "min_sp",
    "avg_weight",
    "avg_distance",
    "std_distance",
    "avg_official_rating",
    "max_official_rating",
    "age_last",
    "win_rate",
    "place_rate",
    "avg_class",
    "best_class",
    "going_pct_firm",
    "going_pct_good",
    "going_pct_good_to_firm",
    "going_pct_good_to_soft",
    "going_pct_soft",
    "surface_pct_turf",
    "sex_encoded",
    "sire_encoded",
    "damsire_encoded",
    "sire_avg_prize",
    "damsire_avg_prize",
];

/// Prediction target column in the horses table.
pub const TARGET_COLUMN: &str = "total_prize";

/// Monotonic transform applied to the target before fitting.
pub const TARGET_TRANSFORM: &str = "log1p";

/// Sex category encoding. Unknown sexes fall back to gelding (2).
pub const SEX_MAP: [(&str, i64); 6] = [
    ("C", 0),
    ("F", 1),
    ("G", 2),
    ("H", 3),
    ("M", 4),
    ("R", 5),
];

/// Fallback sex code for values outside SEX_MAP.
pub const SEX_FALLBACK: i64 = 2;

/// Going categories tracked as per-horse event shares.
pub const GOING_CATEGORIES: [&str; 7] = [
    "Firm",
    "Good",
    "Good to Firm",
    "Good to Soft",
    "Soft",
    "Heavy",
    "Yielding",
];

/// Surface categories tracked as per-horse event shares.
pub const SURFACE_CATEGORIES: [&str; 2] = ["Turf", "All Weather"];

/// Minimum occurrences for a sire/damsire to escape the OTHER bucket.
pub const SIRE_FREQ_THRESHOLD: usize = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_names_unique() {
        let mut names: Vec<&str> = FEATURE_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), FEATURE_NAMES.len());
    }

    #[test]
    fn test_feature_names_exclude_target_and_leaks() {
        assert!(!FEATURE_NAMES.contains(&TARGET_COLUMN));
        assert!(!FEATURE_NAMES.contains(&"total_prize_races"));
        assert!(!FEATURE_NAMES.contains(&"avg_prize"));
        assert!(!FEATURE_NAMES.contains(&"max_prize"));
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        std::env::set_var("VALUATION_DATA__RACES_CSV", "custom/races.csv");
        std::env::set_var("VALUATION_OUTPUT__DIR", "custom/out");

        let config = AppConfig::load().unwrap();
        assert_eq!(config.data.races_csv, "custom/races.csv");
        assert_eq!(config.data.horses_csv, default_horses_csv());
        assert_eq!(config.output.dir, "custom/out");

        std::env::remove_var("VALUATION_DATA__RACES_CSV");
        std::env::remove_var("VALUATION_OUTPUT__DIR");
    }

    #[test]
    fn test_default_params() {
        let params = TrainParams::default();
        assert_eq!(params.n_trees, 500);
        assert_eq!(params.n_folds, 5);
        assert_eq!(params.seed, 42);
    }
}
