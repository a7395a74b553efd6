use anyhow::Result;
use chrono::NaiveDate;
use tracing::info;

use cost_evolution_engine::{
    simulate_cost_evolution, CancellationToken, CapexAction, CapexItem, CategoricalKeys,
    EngineError, LoadProject, ProjectData, Risk, RunConfig, Triple,
};

/// A toy in-memory loader standing in for whatever external project store a
/// real deployment would reach (spec §6). Returns `DataSourceUnavailable`
/// for unknown project ids, same as a networked implementation would for a
/// timeout or a 404.
struct InMemoryProjects {
    projects: Vec<(String, ProjectData)>,
}

impl LoadProject for InMemoryProjects {
    fn load(&self, project_id: &str) -> cost_evolution_engine::EngineResult<ProjectData> {
        self.projects
            .iter()
            .find(|(id, _)| id == project_id)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| {
                EngineError::DataSourceUnavailable(format!("unknown project: {project_id}"))
            })
    }
}

fn sample_project() -> ProjectData {
    ProjectData {
        items: vec![
            CapexItem {
                item_id: 1,
                name: "Substation upgrade".into(),
                base: Triple::new(80_000.0, 100_000.0, 130_000.0),
                keys: CategoricalKeys {
                    owner: Some("engineering".into()),
                    ..Default::default()
                },
            },
            CapexItem {
                item_id: 2,
                name: "Transmission line".into(),
                base: Triple::new(200_000.0, 250_000.0, 320_000.0),
                keys: CategoricalKeys {
                    owner: Some("engineering".into()),
                    ..Default::default()
                },
            },
        ],
        actions: vec![CapexAction {
            action_id: 1,
            item_id: 1,
            name: "value engineering".into(),
            due_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            post_mitigation: Triple::new(75_000.0, 90_000.0, 110_000.0),
            keys: CategoricalKeys::default(),
        }],
        risks: vec![Risk {
            risk_id: 1,
            name: "permit delay".into(),
            impact: Triple::new(10_000.0, 30_000.0, 60_000.0),
            probability: 0.35,
            log_date: None,
            keys: CategoricalKeys::default(),
        }],
        risk_actions: vec![],
        lookups: Default::default(),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("starting cost evolution engine demo run");

    let loader = InMemoryProjects {
        projects: vec![("demo-project".to_string(), sample_project())],
    };

    let data = loader.load("demo-project")?;

    let config = RunConfig::new(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
    let cancellation = CancellationToken::new();

    let result = simulate_cost_evolution(&data, &config, &cancellation)?;

    for checkpoint in &result.checkpoints {
        info!(
            date = %checkpoint.date,
            p20 = checkpoint.p20,
            p50 = checkpoint.p50,
            p80 = checkpoint.p80,
            deterministic = checkpoint.deterministic,
            "checkpoint summary"
        );
    }
    for impact in &result.mitigation_impacts {
        info!(?impact, "mitigation impact");
    }
    for impact in &result.risk_impacts {
        info!(?impact, "risk impact");
    }

    Ok(())
}
