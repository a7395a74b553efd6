use chrono::NaiveDate;

use crate::correlation::CorrelationSummary;

/// Percentile triple plus the deterministic estimate for one checkpoint
/// (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckpointSummary {
    pub date: NaiveDate,
    pub p20: f64,
    pub p50: f64,
    pub p80: f64,
    pub deterministic: f64,
}

/// A mitigation or risk-emergence impact attributed to a checkpoint: the new
/// P50, its percentage change from the previous checkpoint's P50, and the
/// actions or risks that triggered the re-simulation (spec §4.6
/// "Attribution").
#[derive(Debug, Clone)]
pub struct ImpactRecord {
    pub date: NaiveDate,
    pub new_p50: f64,
    pub pct_change_p50: f64,
    pub triggering_ids: Vec<i64>,
}

/// A run's full time series plus the two impact lists and a snapshot of the
/// correlation matrix from the first checkpoint that had any non-trivial
/// pairwise coefficient (spec §6 "Result shape").
#[derive(Debug, Clone, Default)]
pub struct SimulationResult {
    pub checkpoints: Vec<CheckpointSummary>,
    pub mitigation_impacts: Vec<ImpactRecord>,
    pub risk_impacts: Vec<ImpactRecord>,
    pub correlation_summary: Option<CorrelationSummary>,
}

/// Linearly interpolated percentile of a *sorted* sample, matching
/// `numpy.percentile`'s default `linear` method (spec §4.8).
pub fn percentile(sorted_samples: &[f64], p: f64) -> f64 {
    assert!(!sorted_samples.is_empty());
    if sorted_samples.len() == 1 {
        return sorted_samples[0];
    }
    let rank = p / 100.0 * (sorted_samples.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted_samples[lower];
    }
    let weight = rank - lower as f64;
    sorted_samples[lower] * (1.0 - weight) + sorted_samples[upper] * weight
}

/// Builds one checkpoint's percentile summary from the simulated per-draw
/// totals, plus the deterministic (ML-sum) total for the same checkpoint.
pub fn summarise_checkpoint(
    date: NaiveDate,
    totals: &mut [f64],
    deterministic: f64,
) -> CheckpointSummary {
    totals.sort_by(|a, b| a.partial_cmp(b).unwrap());
    CheckpointSummary {
        date,
        p20: percentile(totals, 20.0),
        p50: percentile(totals, 50.0),
        p80: percentile(totals, 80.0),
        deterministic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_matches_known_values() {
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&samples, 0.0), 1.0);
        assert_eq!(percentile(&samples, 100.0), 5.0);
        assert_eq!(percentile(&samples, 50.0), 3.0);
        assert_eq!(percentile(&samples, 25.0), 2.0);
    }

    #[test]
    fn single_sample_returns_itself() {
        assert_eq!(percentile(&[42.0], 20.0), 42.0);
    }

    #[test]
    fn summarise_checkpoint_sorts_before_interpolating() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let mut totals = vec![5.0, 1.0, 3.0, 2.0, 4.0];
        let summary = summarise_checkpoint(date, &mut totals, 3.0);
        assert_eq!(summary.p50, 3.0);
        assert_eq!(summary.deterministic, 3.0);
    }
}
