pub mod aggregator;
pub mod config;
pub mod correlation;
pub mod distribution;
pub mod driver;
pub mod error;
pub mod loader;
pub mod mitigation;
pub mod model;
pub mod normalizer;
pub mod sampler;
pub mod validator;

pub use aggregator::{CheckpointSummary, ImpactRecord, SimulationResult};
pub use config::{CorrelationMethod, Frequency, RunConfig};
pub use correlation::{CorrelationDetail, CorrelationSummary};
pub use driver::{
    build_checkpoint_calendar, simulate_cost_evolution, CancellationToken, CheckpointState,
};
pub use error::{EngineError, EngineResult};
pub use loader::LoadProject;
pub use model::{
    CapexAction, CapexItem, CategoricalKeys, LookupRow, LookupTables, ProjectData, Risk,
    RiskAction, Triple,
};
pub use normalizer::{
    normalize_actions, normalize_items, normalize_risk_actions, normalize_risks, RawRow, RawValue,
};
pub use validator::{has_sufficient_data, validate, ValidationReport};
