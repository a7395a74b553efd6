use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Checkpoint cadence (spec §6 run configuration table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    /// Advance `date` by one period of this frequency.
    pub fn advance(self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Daily => date + chrono::Duration::days(1),
            Frequency::Weekly => date + chrono::Duration::weeks(1),
            Frequency::Monthly => add_months(date, 1),
            Frequency::Quarterly => add_months(date, 3),
            Frequency::Yearly => add_months(date, 12),
        }
    }
}

fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    let total = date.year() * 12 + (date.month() as i32 - 1) + months;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) + 1;
    let day = date.day();
    // Clamp to the last valid day of the target month (e.g. Jan 31 + 1mo -> Feb 28/29).
    let mut d = day;
    loop {
        if let Some(candidate) = NaiveDate::from_ymd_opt(year, month as u32, d) {
            return candidate;
        }
        d -= 1;
    }
}

/// Correlation construction method (spec §4.4, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    None,
    Category,
}

pub const MIN_SIMULATIONS: usize = 100;
pub const MAX_SIMULATIONS: usize = 50_000;
pub const DEFAULT_SIMULATIONS: usize = 5_000;
pub const DEFAULT_SEED: u64 = 42;
pub const REGULARISATION_EPSILON: f64 = 1e-6;
pub const MAX_CORRELATION: f64 = 0.8;

/// Run configuration (spec §6). `n_simulations` is clamped silently into
/// `[MIN_SIMULATIONS, MAX_SIMULATIONS]` by `RunConfig::new` per §7's
/// "configuration errors are clamped silently" rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub data_date: NaiveDate,
    pub frequency: Frequency,
    pub horizon: Option<NaiveDate>,
    pub n_simulations: usize,
    pub enable_correlation: bool,
    pub correlation_method: CorrelationMethod,
    pub seed: u64,
}

impl RunConfig {
    pub fn new(data_date: NaiveDate) -> Self {
        let mut cfg = Self {
            data_date,
            frequency: Frequency::Weekly,
            horizon: None,
            n_simulations: DEFAULT_SIMULATIONS,
            enable_correlation: true,
            correlation_method: CorrelationMethod::Category,
            seed: DEFAULT_SEED,
        };
        cfg.clamp();
        cfg
    }

    /// Re-applies the silent clamping rule of spec §7. Call after mutating
    /// `n_simulations` directly (e.g. via deserialization).
    pub fn clamp(&mut self) {
        let clamped = self.n_simulations.clamp(MIN_SIMULATIONS, MAX_SIMULATIONS);
        if clamped != self.n_simulations {
            debug!(
                requested = self.n_simulations,
                clamped, "n_simulations out of range, clamped"
            );
            self.n_simulations = clamped;
        }
        if !self.enable_correlation {
            self.correlation_method = CorrelationMethod::None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_n_simulations_into_range() {
        let mut cfg = RunConfig::new(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        cfg.n_simulations = 1;
        cfg.clamp();
        assert_eq!(cfg.n_simulations, MIN_SIMULATIONS);
        cfg.n_simulations = 1_000_000;
        cfg.clamp();
        assert_eq!(cfg.n_simulations, MAX_SIMULATIONS);
    }

    #[test]
    fn monthly_advance_clamps_end_of_month() {
        let jan31 = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        let feb = Frequency::Monthly.advance(jan31);
        assert_eq!(feb, NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
    }
}
