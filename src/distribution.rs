use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{EngineError, EngineResult};
use crate::model::Triple;

/// Fits and samples a lognormal distribution from a (p10, p90) percentile
/// pair (spec §4.1).
pub struct DistributionFitter {
    standard_normal: Normal,
}

impl Default for DistributionFitter {
    fn default() -> Self {
        Self::new()
    }
}

impl DistributionFitter {
    pub fn new() -> Self {
        Self {
            standard_normal: Normal::new(0.0, 1.0).expect("standard normal is always valid"),
        }
    }

    /// mu, sigma for log X ~ Normal(mu, sigma^2) such that the 10th/90th
    /// percentiles of X are `p_low`/`p_high`.
    pub fn fit(&self, p_low: f64, p_high: f64) -> EngineResult<(f64, f64)> {
        if p_low <= 0.0 || p_high <= 0.0 || p_low >= p_high {
            return Err(EngineError::InvalidDistribution(format!(
                "require 0 < p_low < p_high, got p_low={p_low}, p_high={p_high}"
            )));
        }

        let z_low = self.standard_normal.inverse_cdf(0.10);
        let z_high = self.standard_normal.inverse_cdf(0.90);

        let sigma = (p_high.ln() - p_low.ln()) / (z_high - z_low);
        let mu = p_low.ln() - z_low * sigma;
        Ok((mu, sigma))
    }

    /// Inverse-CDF sample: for u in (0, 1), returns exp(mu + sigma * Phi^-1(u)).
    pub fn sample(&self, mu: f64, sigma: f64, u: f64) -> f64 {
        (mu + sigma * self.standard_normal.inverse_cdf(u)).exp()
    }

    /// exp(mu + sigma^2 / 2), the expected value of the fitted lognormal.
    pub fn expected_value(&self, mu: f64, sigma: f64) -> f64 {
        (mu + sigma * sigma / 2.0).exp()
    }

    /// Deterministic estimate methods from the original system's
    /// `calculate_deterministic` (spec §9 supplement): the checkpoint driver
    /// itself only ever uses the ML-sum rule (§4.6j), but these remain
    /// available for callers that want the PERT or expected-value variants.
    pub fn deterministic_ml(&self, triple: &Triple) -> f64 {
        triple.ml
    }

    pub fn deterministic_pert(&self, triple: &Triple) -> f64 {
        (triple.min + 4.0 * triple.ml + triple.max) / 6.0
    }

    pub fn deterministic_expected(&self, triple: &Triple) -> EngineResult<f64> {
        let (mu, sigma) = self.fit(triple.min, triple.max)?;
        Ok(self.expected_value(mu, sigma))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fit_recovers_percentiles() {
        let fitter = DistributionFitter::new();
        let (mu, sigma) = fitter.fit(80_000.0, 130_000.0).unwrap();
        let z_low = Normal::new(0.0, 1.0).unwrap().inverse_cdf(0.10);
        let z_high = Normal::new(0.0, 1.0).unwrap().inverse_cdf(0.90);
        assert_relative_eq!((mu + z_low * sigma).exp(), 80_000.0, max_relative = 1e-9);
        assert_relative_eq!((mu + z_high * sigma).exp(), 130_000.0, max_relative = 1e-9);
    }

    #[test]
    fn rejects_non_positive_or_unordered_inputs() {
        let fitter = DistributionFitter::new();
        assert!(fitter.fit(0.0, 10.0).is_err());
        assert!(fitter.fit(-5.0, 10.0).is_err());
        assert!(fitter.fit(10.0, 10.0).is_err());
        assert!(fitter.fit(10.0, 5.0).is_err());
    }

    #[test]
    fn empirical_quantiles_recover_inputs() {
        let fitter = DistributionFitter::new();
        let (mu, sigma) = fitter.fit(80_000.0, 130_000.0).unwrap();
        use rand::Rng;
        use rand::SeedableRng;
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(7);
        let mut samples: Vec<f64> = (0..200_000)
            .map(|_| fitter.sample(mu, sigma, rng.gen_range(1e-9..1.0 - 1e-9)))
            .collect();
        samples.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let p10 = samples[(samples.len() as f64 * 0.10) as usize];
        let p90 = samples[(samples.len() as f64 * 0.90) as usize];
        assert!((p10 - 80_000.0).abs() / 80_000.0 < 0.02);
        assert!((p90 - 130_000.0).abs() / 130_000.0 < 0.02);
    }
}
