//! Categorical encodings with an explicit fit/apply split.
//!
//! Each encoding is fitted once on the training rows and persisted verbatim
//! in the feature configuration, so a separate runtime can reproduce the
//! exact transform for a new horse. Applying a fitted encoding back to its
//! own fitting data reproduces the encoded training column bit for bit.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::config::{SEX_FALLBACK, SEX_MAP};

/// Bucket that absorbs categories below the frequency threshold.
pub const OTHER_BUCKET: &str = "OTHER";

/// Rare-category grouping: values below the threshold collapse to OTHER.
///
/// The kept list is frequency-derived and stored explicitly; re-deriving it
/// from new data would silently drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RareBucketing {
    pub kept: Vec<String>,
    pub threshold: usize,
}

impl RareBucketing {
    pub fn fit(values: &[String], threshold: usize) -> Self {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for value in values {
            *counts.entry(value.as_str()).or_insert(0) += 1;
        }

        let mut kept: Vec<String> = counts
            .into_iter()
            .filter(|&(_, count)| count >= threshold)
            .map(|(value, _)| value.to_string())
            .collect();
        kept.sort_unstable();

        Self { kept, threshold }
    }

    pub fn apply(&self, value: &str) -> String {
        if self.kept.binary_search_by(|k| k.as_str().cmp(value)).is_ok() {
            value.to_string()
        } else {
            OTHER_BUCKET.to_string()
        }
    }
}

/// Stable integer index per bucketed category.
///
/// Classes are persisted sorted lexicographically, so indices match between
/// training and later reuse regardless of input row order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdinalEncoding {
    pub classes: Vec<String>,
}

impl OrdinalEncoding {
    pub fn fit(buckets: &[String]) -> Self {
        let mut classes: Vec<String> = buckets.to_vec();
        classes.sort_unstable();
        classes.dedup();
        Self { classes }
    }

    /// Index of a bucketed value. Values unseen at fit time are treated as
    /// OTHER; if OTHER itself was never fitted, the index falls back to 0.
    pub fn apply(&self, bucket: &str) -> f64 {
        if let Ok(idx) = self.classes.binary_search_by(|c| c.as_str().cmp(bucket)) {
            return idx as f64;
        }
        self.classes
            .binary_search_by(|c| c.as_str().cmp(OTHER_BUCKET))
            .map(|idx| idx as f64)
            .unwrap_or(0.0)
    }
}

/// Mean training target per bucketed category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetMeanEncoding {
    pub means: BTreeMap<String, f64>,
    /// Fallback for buckets unseen at fit time: the global training-target
    /// mean. Never hit when re-applying to the fitting data itself.
    pub global_mean: f64,
}

impl TargetMeanEncoding {
    pub fn fit(buckets: &[String], targets: &[f64]) -> Self {
        debug_assert_eq!(buckets.len(), targets.len());

        let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for (bucket, target) in buckets.iter().zip(targets.iter()) {
            let entry = sums.entry(bucket.as_str()).or_insert((0.0, 0));
            entry.0 += target;
            entry.1 += 1;
        }

        let means = sums
            .into_iter()
            .map(|(bucket, (sum, count))| (bucket.to_string(), sum / count as f64))
            .collect();

        let global_mean = if targets.is_empty() {
            0.0
        } else {
            targets.iter().sum::<f64>() / targets.len() as f64
        };

        Self { means, global_mean }
    }

    pub fn apply(&self, bucket: &str) -> f64 {
        self.means.get(bucket).copied().unwrap_or(self.global_mean)
    }
}

/// The three coupled encodings fitted for one categorical attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedEncoder {
    pub bucketing: RareBucketing,
    pub ordinal: OrdinalEncoding,
    pub target_mean: TargetMeanEncoding,
}

impl FittedEncoder {
    pub fn fit(values: &[String], targets: &[f64], threshold: usize) -> Self {
        let bucketing = RareBucketing::fit(values, threshold);
        let buckets: Vec<String> = values.iter().map(|v| bucketing.apply(v)).collect();
        let ordinal = OrdinalEncoding::fit(&buckets);
        let target_mean = TargetMeanEncoding::fit(&buckets, targets);

        Self {
            bucketing,
            ordinal,
            target_mean,
        }
    }

    /// Encode a raw category value to (ordinal index, target-mean value).
    pub fn apply(&self, value: &str) -> (f64, f64) {
        let bucket = self.bucketing.apply(value);
        (self.ordinal.apply(&bucket), self.target_mean.apply(&bucket))
    }
}

/// Encode a sex category with the fixed map; unknown values fall back to
/// gelding.
pub fn encode_sex(sex: &str) -> f64 {
    SEX_MAP
        .iter()
        .find(|(code, _)| *code == sex.trim())
        .map(|&(_, num)| num as f64)
        .unwrap_or(SEX_FALLBACK as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rare_bucketing_threshold() {
        let values = strings(&["A", "A", "A", "B", "C", "C", "C"]);
        let bucketing = RareBucketing::fit(&values, 3);

        assert_eq!(bucketing.kept, vec!["A", "C"]);
        assert_eq!(bucketing.apply("A"), "A");
        assert_eq!(bucketing.apply("B"), OTHER_BUCKET);
        assert_eq!(bucketing.apply("unseen"), OTHER_BUCKET);
    }

    #[test]
    fn test_rare_bucketing_idempotent() {
        let values = strings(&["A", "A", "A", "B"]);
        let bucketing = RareBucketing::fit(&values, 3);

        for value in ["A", "B", "zzz"] {
            let once = bucketing.apply(value);
            let twice = bucketing.apply(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_ordinal_sorted_and_stable() {
        let buckets = strings(&["OTHER", "Galileo", "Frankel", "Galileo"]);
        let ordinal = OrdinalEncoding::fit(&buckets);

        assert_eq!(ordinal.classes, vec!["Frankel", "Galileo", "OTHER"]);
        assert_eq!(ordinal.apply("Frankel"), 0.0);
        assert_eq!(ordinal.apply("Galileo"), 1.0);
        // Unseen buckets resolve through OTHER.
        assert_eq!(ordinal.apply("Sadlers Wells"), 2.0);
    }

    #[test]
    fn test_ordinal_fallback_without_other() {
        let ordinal = OrdinalEncoding::fit(&strings(&["A", "B"]));
        assert_eq!(ordinal.apply("unseen"), 0.0);
    }

    #[test]
    fn test_target_mean_fit_and_fallback() {
        let buckets = strings(&["A", "A", "B"]);
        let targets = [100.0, 200.0, 60.0];
        let enc = TargetMeanEncoding::fit(&buckets, &targets);

        assert!((enc.apply("A") - 150.0).abs() < 1e-12);
        assert!((enc.apply("B") - 60.0).abs() < 1e-12);
        // Unseen bucket falls back to the global mean.
        assert!((enc.apply("C") - 120.0).abs() < 1e-12);
    }

    #[test]
    fn test_self_application_round_trip() {
        let values = strings(&["A", "A", "A", "B", "B", "B", "C"]);
        let targets = [10.0, 20.0, 30.0, 5.0, 5.0, 5.0, 99.0];
        let encoder = FittedEncoder::fit(&values, &targets, 3);

        // Re-apply the fitted encoder over its own fitting data: every
        // encoded value must equal the value used when fitting the tables.
        for (value, _) in values.iter().zip(targets.iter()) {
            let bucket = encoder.bucketing.apply(value);
            let (ordinal, mean) = encoder.apply(value);
            assert_eq!(ordinal, encoder.ordinal.apply(&bucket));
            assert_eq!(mean, encoder.target_mean.means[&bucket]);
        }

        // "C" collapsed to OTHER, so its target mean is C's own target.
        let (_, other_mean) = encoder.apply("C");
        assert!((other_mean - 99.0).abs() < 1e-12);
    }

    #[test]
    fn test_encode_sex() {
        assert_eq!(encode_sex("C"), 0.0);
        assert_eq!(encode_sex("F"), 1.0);
        assert_eq!(encode_sex("G"), 2.0);
        assert_eq!(encode_sex("M"), 4.0);
        assert_eq!(encode_sex("X"), 2.0);
        assert_eq!(encode_sex(""), 2.0);
    }
}
