use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::ProjectData;

/// Structured validation errors grouped by table (spec §4.2), mirroring the
/// per-category error lists the original system's `validate_all_inputs`
/// produces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub items: Vec<String>,
    pub actions: Vec<String>,
    pub risks: Vec<String>,
    pub risk_actions: Vec<String>,
}

impl ValidationReport {
    pub fn error_count(&self) -> usize {
        self.items.len() + self.actions.len() + self.risks.len() + self.risk_actions.len()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

/// Validates structural and semantic invariants of the four input tables
/// (spec §3, §4.2) before simulation. Returns zero errors only when the
/// driver may proceed.
pub fn validate(data: &ProjectData) -> ValidationReport {
    let mut report = ValidationReport::default();

    let mut seen_item_ids = HashSet::new();
    for item in &data.items {
        if !seen_item_ids.insert(item.item_id) {
            report
                .items
                .push(format!("duplicate item_id {}", item.item_id));
        }
        if !(item.base.min <= item.base.ml && item.base.ml <= item.base.max) {
            report.items.push(format!(
                "item {}: costs not ordered (min={}, ml={}, max={})",
                item.item_id, item.base.min, item.base.ml, item.base.max
            ));
        }
        if item.base.min <= 0.0 {
            report
                .items
                .push(format!("item {}: min_cost must be positive", item.item_id));
        }
    }

    let mut seen_action_ids = HashSet::new();
    for action in &data.actions {
        if !seen_action_ids.insert(action.action_id) {
            report
                .actions
                .push(format!("duplicate action_id {}", action.action_id));
        }
        if !seen_item_ids.contains(&action.item_id) {
            report.actions.push(format!(
                "action {}: references non-existent item_id {}",
                action.action_id, action.item_id
            ));
        }
        let t = action.post_mitigation;
        if !(t.min <= t.ml && t.ml <= t.max) {
            report.actions.push(format!(
                "action {}: post-mitigation costs not ordered",
                action.action_id
            ));
        }
        if t.min <= 0.0 {
            report.actions.push(format!(
                "action {}: post-mitigation min_cost must be positive",
                action.action_id
            ));
        }
    }

    let mut seen_risk_ids = HashSet::new();
    for risk in &data.risks {
        if !seen_risk_ids.insert(risk.risk_id) {
            report
                .risks
                .push(format!("duplicate risk_id {}", risk.risk_id));
        }
        let t = risk.impact;
        if !(t.min <= t.ml && t.ml <= t.max) {
            report
                .risks
                .push(format!("risk {}: impacts not ordered", risk.risk_id));
        }
        if t.min < 0.0 {
            report.risks.push(format!(
                "risk {}: impacts must be non-negative",
                risk.risk_id
            ));
        }
        if !(0.0..=1.0).contains(&risk.probability) {
            report.risks.push(format!(
                "risk {}: probability {} outside [0,1]",
                risk.risk_id, risk.probability
            ));
        }
    }

    let mut seen_risk_action_ids = HashSet::new();
    for action in &data.risk_actions {
        if !seen_risk_action_ids.insert(action.action_id) {
            report
                .risk_actions
                .push(format!("duplicate action_id {}", action.action_id));
        }
        if !seen_risk_ids.contains(&action.risk_id) {
            report.risk_actions.push(format!(
                "action {}: references non-existent risk_id {}",
                action.action_id, action.risk_id
            ));
        }
        let t = action.post_mitigation_impact;
        if !(t.min <= t.ml && t.ml <= t.max) {
            report.risk_actions.push(format!(
                "action {}: post-mitigation impacts not ordered",
                action.action_id
            ));
        }
        if t.min < 0.0 {
            report.risk_actions.push(format!(
                "action {}: post-mitigation impacts must be non-negative",
                action.action_id
            ));
        }
        if !(0.0..=1.0).contains(&action.post_mitigation_probability) {
            report.risk_actions.push(format!(
                "action {}: post-mitigation probability outside [0,1]",
                action.action_id
            ));
        }
    }

    report
}

/// An empty items table always blocks simulation regardless of error count
/// (spec §4.2: "an empty items table blocks simulation with InsufficientData").
pub fn has_sufficient_data(data: &ProjectData) -> bool {
    !data.items.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CapexItem, CategoricalKeys, Triple};

    fn item(id: i64, min: f64, ml: f64, max: f64) -> CapexItem {
        CapexItem {
            item_id: id,
            name: format!("item-{id}"),
            base: Triple::new(min, ml, max),
            keys: CategoricalKeys::default(),
        }
    }

    #[test]
    fn flags_unordered_costs() {
        let data = ProjectData {
            items: vec![item(1, 100.0, 50.0, 200.0)],
            ..Default::default()
        };
        let report = validate(&data);
        assert_eq!(report.items.len(), 1);
        assert!(report.has_errors());
    }

    #[test]
    fn accepts_valid_single_item() {
        let data = ProjectData {
            items: vec![item(1, 80_000.0, 100_000.0, 130_000.0)],
            ..Default::default()
        };
        let report = validate(&data);
        assert!(!report.has_errors());
        assert!(has_sufficient_data(&data));
    }

    #[test]
    fn empty_items_is_insufficient() {
        let data = ProjectData::default();
        assert!(!has_sufficient_data(&data));
    }
}
