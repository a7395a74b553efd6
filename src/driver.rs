use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::aggregator::{summarise_checkpoint, CheckpointSummary, ImpactRecord, SimulationResult};
use crate::config::{CorrelationMethod, RunConfig};
use crate::correlation::{build_correlation_matrix, identity_matrix, CorrelationSummary};
use crate::distribution::DistributionFitter;
use crate::error::{EngineError, EngineResult};
use crate::mitigation::{
    apply_capex_mitigation, apply_risk_mitigation, MitigatedCapex, MitigatedRisk,
};
use crate::model::{Correlatable, ProjectData};
use crate::sampler::draw_correlated_uniforms;
use crate::validator::{has_sufficient_data, validate};

/// Cooperative cancellation, checked at each checkpoint boundary (spec §6).
/// Cloning shares the same underlying flag, mirroring the teacher's
/// `Arc<AtomicBool>` shutdown-signal idiom.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Which kind of change occurred at a checkpoint relative to the previous
/// one (spec §4.6 "checkpoint state"). Drives whether the driver resamples
/// or carries the previous summary forward unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointState {
    InitialCheckpoint,
    Unchanged,
    ActionsEffective,
    RisksEmergent,
    Mixed,
}

const HORIZON_BUFFER_WEEKS: i64 = 4;

/// Builds the full checkpoint calendar for a run (spec §4.6a): from
/// `data_date`, stepping by `frequency`, up to either an explicit `horizon`
/// override or the latest action/risk due date/log date plus a 4 week
/// buffer.
pub fn build_checkpoint_calendar(data: &ProjectData, config: &RunConfig) -> Vec<NaiveDate> {
    let horizon = config
        .horizon
        .unwrap_or_else(|| derive_horizon(data, config.data_date));

    let mut calendar = Vec::new();
    let mut cursor = config.data_date;
    calendar.push(cursor);
    while cursor < horizon {
        cursor = config.frequency.advance(cursor);
        calendar.push(cursor);
    }
    calendar
}

fn derive_horizon(data: &ProjectData, data_date: NaiveDate) -> NaiveDate {
    let latest = data
        .actions
        .iter()
        .map(|a| a.due_date)
        .chain(data.risk_actions.iter().map(|a| a.due_date))
        .max()
        .unwrap_or(data_date);
    latest.max(data_date) + chrono::Duration::weeks(HORIZON_BUFFER_WEEKS)
}

/// Runs the full Monte Carlo cost evolution for a project (spec §4.6/§4.9).
pub fn simulate_cost_evolution(
    data: &ProjectData,
    config: &RunConfig,
    cancellation: &CancellationToken,
) -> EngineResult<SimulationResult> {
    if !has_sufficient_data(data) {
        return Err(EngineError::InsufficientData(
            "project has no CAPEX items".into(),
        ));
    }

    let report = validate(data);
    if report.has_errors() {
        return Err(EngineError::ValidationFailed { report });
    }

    let calendar = build_checkpoint_calendar(data, config);
    info!(checkpoints = calendar.len(), "checkpoint calendar built");

    let fitter = DistributionFitter::new();
    let mut rng = ChaCha20Rng::seed_from_u64(config.seed);

    let mut result = SimulationResult::default();
    let mut previous_summary: Option<CheckpointSummary> = None;
    let mut previous_mitigated_items: Option<Vec<MitigatedCapex>> = None;
    let mut previous_mitigated_risks: Option<Vec<MitigatedRisk>> = None;

    for (idx, &date) in calendar.iter().enumerate() {
        if cancellation.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let mitigated_items = apply_capex_mitigation(&data.items, &data.actions, date);
        let active_risks: Vec<_> = data
            .risks
            .iter()
            .filter(|r| r.log_date.map(|d| d <= date).unwrap_or(true))
            .collect();
        let active_risk_actions: Vec<_> = data
            .risk_actions
            .iter()
            .filter(|a| active_risks.iter().any(|r| r.risk_id == a.risk_id))
            .cloned()
            .collect();
        let active_risk_values: Vec<_> = active_risks.iter().map(|r| (*r).clone()).collect();
        let mitigated_risks =
            apply_risk_mitigation(&active_risk_values, &active_risk_actions, date);

        let state = classify_state(
            idx,
            &mitigated_items,
            &mitigated_risks,
            &previous_mitigated_items,
            &previous_mitigated_risks,
        );

        debug!(?date, ?state, "checkpoint");

        if state == CheckpointState::Unchanged {
            if let Some(prev) = previous_summary {
                result.checkpoints.push(CheckpointSummary { date, ..prev });
                previous_mitigated_items = Some(mitigated_items);
                previous_mitigated_risks = Some(mitigated_risks);
                continue;
            }
        }

        let triggering_action_ids =
            newly_effective_action_ids(&mitigated_items, previous_mitigated_items.as_deref());
        let triggering_risk_ids =
            newly_active_risk_ids(&mitigated_risks, previous_mitigated_risks.as_deref());

        let (summary, correlation_summary) = run_checkpoint_simulation(
            &fitter,
            &mut rng,
            config,
            data,
            &mitigated_items,
            &mitigated_risks,
            date,
            idx as u64,
        )?;

        if result.correlation_summary.is_none() && correlation_summary.non_trivial_pairs > 0 {
            result.correlation_summary = Some(correlation_summary);
        }

        let pct_change_p50 = previous_summary
            .map(|prev| (summary.p50 - prev.p50) / prev.p50 * 100.0)
            .unwrap_or(0.0);

        if !triggering_action_ids.is_empty() {
            result.mitigation_impacts.push(ImpactRecord {
                date,
                new_p50: summary.p50,
                pct_change_p50,
                triggering_ids: triggering_action_ids,
            });
        }
        if !triggering_risk_ids.is_empty() {
            result.risk_impacts.push(ImpactRecord {
                date,
                new_p50: summary.p50,
                pct_change_p50,
                triggering_ids: triggering_risk_ids,
            });
        }

        previous_summary = Some(summary);
        previous_mitigated_items = Some(mitigated_items);
        previous_mitigated_risks = Some(mitigated_risks);
        result.checkpoints.push(summary);
    }

    Ok(result)
}

fn classify_state(
    idx: usize,
    items: &[MitigatedCapex],
    risks: &[MitigatedRisk],
    prev_items: &Option<Vec<MitigatedCapex>>,
    prev_risks: &Option<Vec<MitigatedRisk>>,
) -> CheckpointState {
    if idx == 0 {
        return CheckpointState::InitialCheckpoint;
    }
    let actions_changed = match prev_items {
        Some(prev) => items
            .iter()
            .zip(prev.iter())
            .any(|(a, b)| a.applied_action_id != b.applied_action_id),
        None => true,
    };
    let risks_changed = match prev_risks {
        Some(prev) => {
            risks.len() != prev.len()
                || risks
                    .iter()
                    .zip(prev.iter())
                    .any(|(a, b)| a.applied_action_id != b.applied_action_id)
        }
        None => true,
    };

    match (actions_changed, risks_changed) {
        (false, false) => CheckpointState::Unchanged,
        (true, false) => CheckpointState::ActionsEffective,
        (false, true) => CheckpointState::RisksEmergent,
        (true, true) => CheckpointState::Mixed,
    }
}

/// Action ids whose mitigation newly took effect at this checkpoint: on the
/// first checkpoint, every already-applicable action (due date in
/// `(-inf, current]`); afterwards, only items whose applied action changed
/// (spec §4.6 "newly-due actions").
fn newly_effective_action_ids(
    items: &[MitigatedCapex],
    prev: Option<&[MitigatedCapex]>,
) -> Vec<i64> {
    match prev {
        None => items.iter().filter_map(|m| m.applied_action_id).collect(),
        Some(prev) => items
            .iter()
            .zip(prev.iter())
            .filter(|(current, before)| {
                current.applied_action_id.is_some()
                    && current.applied_action_id != before.applied_action_id
            })
            .filter_map(|(current, _)| current.applied_action_id)
            .collect(),
    }
}

/// Risk ids that newly became active at this checkpoint: on the first
/// checkpoint, every active risk; afterwards, only risks absent from the
/// previous checkpoint's active set (spec §4.6 "newly-active risks").
fn newly_active_risk_ids(risks: &[MitigatedRisk], prev: Option<&[MitigatedRisk]>) -> Vec<i64> {
    match prev {
        None => risks.iter().map(|r| r.risk_id).collect(),
        Some(prev) => risks
            .iter()
            .filter(|r| !prev.iter().any(|p| p.risk_id == r.risk_id))
            .map(|r| r.risk_id)
            .collect(),
    }
}

/// Deterministic splitmix64-style mix, used to derive an independent RNG
/// stream per simulation draw so the sample loop can be parallelised over
/// `rayon` without any shared mutable RNG state (spec §5: "the sample loop
/// is the natural parallel axis... with per-worker RNG streams seeded
/// deterministically from the run seed").
fn draw_seed(base_seed: u64, checkpoint_idx: u64, draw: u64) -> u64 {
    let mut x = base_seed
        ^ checkpoint_idx.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ draw.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

#[allow(clippy::too_many_arguments)]
fn run_checkpoint_simulation(
    fitter: &DistributionFitter,
    rng: &mut ChaCha20Rng,
    config: &RunConfig,
    data: &ProjectData,
    items: &[MitigatedCapex],
    risks: &[MitigatedRisk],
    date: NaiveDate,
    checkpoint_idx: u64,
) -> EngineResult<(CheckpointSummary, CorrelationSummary)> {
    let entities: Vec<Correlatable> = data
        .items
        .iter()
        .map(Correlatable::capex)
        .chain(
            data.risks
                .iter()
                .filter(|r| risks.iter().any(|m| m.risk_id == r.risk_id))
                .map(Correlatable::risk),
        )
        .collect();
    let k = entities.len();

    let (correlation, correlation_summary) = match config.correlation_method {
        CorrelationMethod::None => (identity_matrix(k), CorrelationSummary::default()),
        CorrelationMethod::Category => build_correlation_matrix(&entities, &data.lookups),
    };

    let uniforms = draw_correlated_uniforms(rng, &correlation, config.n_simulations);

    let item_params: Vec<(f64, f64)> = items
        .iter()
        .map(|m| fitter.fit(m.working.min, m.working.max))
        .collect::<EngineResult<_>>()?;

    // Matches the original system's `if min_impact > 0 and max_impact > 0`
    // guard: a risk whose post-mitigation impact triple touches zero (legal
    // per §3's `min_impact >= 0`) is not lognormal-fittable, so it
    // contributes no sampled impact rather than a degenerate, near-infinite
    // sigma from clamping zero up to a tiny positive value.
    let risk_params: Vec<Option<(f64, f64)>> = risks
        .iter()
        .map(|m| {
            if m.working_impact.min > 0.0 && m.working_impact.max > 0.0 {
                fitter
                    .fit(m.working_impact.min, m.working_impact.max)
                    .map(Some)
            } else {
                Ok(None)
            }
        })
        .collect::<EngineResult<_>>()?;

    let item_count = item_params.len();
    let mut totals: Vec<f64> = (0..config.n_simulations)
        .into_par_iter()
        .map(|draw| {
            let mut occurrence_rng =
                ChaCha20Rng::seed_from_u64(draw_seed(config.seed, checkpoint_idx, draw as u64));
            let mut total = 0.0;
            for (col, (mu, sigma)) in item_params.iter().enumerate() {
                total += fitter.sample(*mu, *sigma, uniforms[(draw, col)]);
            }
            for (offset, risk_fit) in risk_params.iter().enumerate() {
                let col = item_count + offset;
                let occurrence: f64 = occurrence_rng.gen();
                if occurrence < risks[offset].working_probability {
                    if let Some((mu, sigma)) = risk_fit {
                        total += fitter.sample(*mu, *sigma, uniforms[(draw, col)]);
                    }
                }
            }
            total
        })
        .collect();

    let deterministic = items.iter().map(|m| m.working.ml).sum::<f64>()
        + risks
            .iter()
            .map(|m| m.working_probability * m.working_impact.ml)
            .sum::<f64>();

    Ok((
        summarise_checkpoint(date, &mut totals, deterministic),
        correlation_summary,
    ))
}
