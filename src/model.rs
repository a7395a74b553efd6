use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the `disciplines`, `phases`, `locations`, `risk_categories`, or
/// `risk_logs` lookup tables (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupRow {
    pub id: i64,
    pub name: String,
    /// Phase ordinal. Only meaningful for the `phases` table.
    pub ordinal: Option<i64>,
    /// Parent location id. Only meaningful for the `locations` table.
    pub parent_id: Option<i64>,
}

/// The five read-only lookup tables a project may reference.
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    pub disciplines: Vec<LookupRow>,
    pub phases: Vec<LookupRow>,
    pub locations: Vec<LookupRow>,
    pub risk_categories: Vec<LookupRow>,
    pub risk_logs: Vec<LookupRow>,
}

impl LookupTables {
    pub fn phase_ordinal(&self, phase_id: i64) -> Option<i64> {
        self.phases.iter().find(|p| p.id == phase_id)?.ordinal
    }

    pub fn location_parent(&self, location_id: i64) -> Option<i64> {
        self.locations
            .iter()
            .find(|l| l.id == location_id)?
            .parent_id
    }

    pub fn risk_category_name(&self, category_id: i64) -> Option<&str> {
        self.risk_categories
            .iter()
            .find(|c| c.id == category_id)
            .map(|c| c.name.as_str())
    }
}

/// A strictly positive `min <= ml <= max` triple, as required throughout §3.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    pub min: f64,
    pub ml: f64,
    pub max: f64,
}

impl Triple {
    pub fn new(min: f64, ml: f64, max: f64) -> Self {
        Self { min, ml, max }
    }
}

/// Optional categorical attributes shared by CAPEX items and risks, used by
/// the correlation builder (spec §4.4).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoricalKeys {
    pub owner: Option<String>,
    pub discipline_id: Option<i64>,
    pub phase_id: Option<i64>,
    pub location_id: Option<i64>,
    pub risk_category_id: Option<i64>,
    pub risk_log_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapexItem {
    pub item_id: i64,
    pub name: String,
    pub base: Triple,
    pub keys: CategoricalKeys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapexAction {
    pub action_id: i64,
    pub item_id: i64,
    pub name: String,
    pub due_date: NaiveDate,
    pub post_mitigation: Triple,
    pub keys: CategoricalKeys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub risk_id: i64,
    pub name: String,
    pub impact: Triple,
    pub probability: f64,
    pub log_date: Option<NaiveDate>,
    pub keys: CategoricalKeys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAction {
    pub action_id: i64,
    pub risk_id: i64,
    pub name: String,
    pub due_date: NaiveDate,
    pub post_mitigation_impact: Triple,
    pub post_mitigation_probability: f64,
    pub keys: CategoricalKeys,
}

/// The four tables a loader returns for a project (spec §3, §6).
#[derive(Debug, Clone, Default)]
pub struct ProjectData {
    pub items: Vec<CapexItem>,
    pub actions: Vec<CapexAction>,
    pub risks: Vec<Risk>,
    pub risk_actions: Vec<RiskAction>,
    pub lookups: LookupTables,
}

/// The variant tag for the "correlatable" capability (spec §9 design note:
/// the source duck-types across heterogeneous objects; here it's a small
/// enum instead).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityFamily {
    Capex,
    Risk,
}

/// Uniform view over whichever entity (CAPEX item or active risk) occupies a
/// given column of the correlation matrix / sample matrix.
#[derive(Debug, Clone)]
pub struct Correlatable<'a> {
    pub family: EntityFamily,
    pub id: i64,
    pub keys: &'a CategoricalKeys,
}

impl<'a> Correlatable<'a> {
    pub fn capex(item: &'a CapexItem) -> Self {
        Self {
            family: EntityFamily::Capex,
            id: item.item_id,
            keys: &item.keys,
        }
    }

    pub fn risk(risk: &'a Risk) -> Self {
        Self {
            family: EntityFamily::Risk,
            id: risk.risk_id,
            keys: &risk.keys,
        }
    }
}
