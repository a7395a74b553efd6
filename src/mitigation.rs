use std::collections::HashMap;

use chrono::NaiveDate;

use crate::model::{CapexAction, CapexItem, Risk, RiskAction, Triple};

/// The result of folding every applicable action into an item's or risk's
/// working figures (spec §4.7).
#[derive(Debug, Clone)]
pub struct MitigatedCapex {
    pub item_id: i64,
    pub working: Triple,
    pub applied_action_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct MitigatedRisk {
    pub risk_id: i64,
    pub working_impact: Triple,
    pub working_probability: f64,
    pub applied_action_id: Option<i64>,
}

/// For each item, keeps the action with the greatest `due_date` at or before
/// `as_of`, ties broken by the greatest `action_id` (spec §4.7). Items with
/// no qualifying action keep their pre-mitigation figures.
pub fn apply_capex_mitigation(
    items: &[CapexItem],
    actions: &[CapexAction],
    as_of: NaiveDate,
) -> Vec<MitigatedCapex> {
    let mut latest: HashMap<i64, &CapexAction> = HashMap::new();
    for action in actions {
        if action.due_date > as_of {
            continue;
        }
        latest
            .entry(action.item_id)
            .and_modify(|current| {
                if is_later(action, current) {
                    *current = action;
                }
            })
            .or_insert(action);
    }

    items
        .iter()
        .map(|item| match latest.get(&item.item_id) {
            Some(action) => MitigatedCapex {
                item_id: item.item_id,
                working: action.post_mitigation,
                applied_action_id: Some(action.action_id),
            },
            None => MitigatedCapex {
                item_id: item.item_id,
                working: item.base,
                applied_action_id: None,
            },
        })
        .collect()
}

fn is_later(candidate: &CapexAction, current: &CapexAction) -> bool {
    (candidate.due_date, candidate.action_id) > (current.due_date, current.action_id)
}

/// Same rule as [`apply_capex_mitigation`], for risk actions (spec §4.7).
pub fn apply_risk_mitigation(
    risks: &[Risk],
    actions: &[RiskAction],
    as_of: NaiveDate,
) -> Vec<MitigatedRisk> {
    let mut latest: HashMap<i64, &RiskAction> = HashMap::new();
    for action in actions {
        if action.due_date > as_of {
            continue;
        }
        latest
            .entry(action.risk_id)
            .and_modify(|current| {
                if (action.due_date, action.action_id) > (current.due_date, current.action_id) {
                    *current = action;
                }
            })
            .or_insert(action);
    }

    risks
        .iter()
        .map(|risk| match latest.get(&risk.risk_id) {
            Some(action) => MitigatedRisk {
                risk_id: risk.risk_id,
                working_impact: action.post_mitigation_impact,
                working_probability: action.post_mitigation_probability,
                applied_action_id: Some(action.action_id),
            },
            None => MitigatedRisk {
                risk_id: risk.risk_id,
                working_impact: risk.impact,
                working_probability: risk.probability,
                applied_action_id: None,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CategoricalKeys;

    fn item(id: i64) -> CapexItem {
        CapexItem {
            item_id: id,
            name: format!("item-{id}"),
            base: Triple::new(100.0, 150.0, 200.0),
            keys: CategoricalKeys::default(),
        }
    }

    fn action(action_id: i64, item_id: i64, due: &str, ml: f64) -> CapexAction {
        CapexAction {
            action_id,
            item_id,
            name: format!("action-{action_id}"),
            due_date: NaiveDate::parse_from_str(due, "%Y-%m-%d").unwrap(),
            post_mitigation: Triple::new(ml - 20.0, ml, ml + 20.0),
            keys: CategoricalKeys::default(),
        }
    }

    #[test]
    fn keeps_latest_due_action() {
        let items = vec![item(1)];
        let actions = vec![
            action(1, 1, "2026-01-01", 90.0),
            action(2, 1, "2026-02-01", 80.0),
        ];
        let result = apply_capex_mitigation(
            &items,
            &actions,
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        );
        assert_eq!(result[0].applied_action_id, Some(2));
        assert_eq!(result[0].working.ml, 80.0);
    }

    #[test]
    fn ties_broken_by_greatest_action_id() {
        let items = vec![item(1)];
        let actions = vec![
            action(1, 1, "2026-01-01", 90.0),
            action(5, 1, "2026-01-01", 70.0),
        ];
        let result = apply_capex_mitigation(
            &items,
            &actions,
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        );
        assert_eq!(result[0].applied_action_id, Some(5));
    }

    #[test]
    fn future_actions_are_ignored() {
        let items = vec![item(1)];
        let actions = vec![action(1, 1, "2099-01-01", 10.0)];
        let result = apply_capex_mitigation(
            &items,
            &actions,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        );
        assert_eq!(result[0].applied_action_id, None);
        assert_eq!(result[0].working, item(1).base);
    }
}
