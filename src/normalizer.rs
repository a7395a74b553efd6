use std::collections::HashMap;

use chrono::NaiveDate;

use crate::model::{CapexAction, CapexItem, CategoricalKeys, Risk, RiskAction, Triple};

/// A single untyped field value as a loader would hand it over, before the
/// normalizer coerces it into the canonical schema (spec §4.3, §9: "the
/// source treats input tables as untyped row dictionaries").
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Missing,
}

impl RawValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) => Some(*n),
            RawValue::Text(s) => s.trim().parse().ok(),
            RawValue::Missing => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        self.as_f64().map(|n| n.round() as i64)
    }

    fn as_string(&self) -> Option<String> {
        match self {
            RawValue::Text(s) if !s.trim().is_empty() => Some(s.clone()),
            RawValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Parses a date-like string or ISO timestamp into a day-granularity
    /// date, coercing anything unparseable to "missing" (spec §4.3).
    fn as_date(&self) -> Option<NaiveDate> {
        let text = match self {
            RawValue::Text(s) => s.as_str(),
            _ => return None,
        };
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Some(date);
        }
        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
            return Some(dt.naive_utc().date());
        }
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
            return Some(naive.date());
        }
        None
    }
}

pub type RawRow = HashMap<String, RawValue>;

/// Column-name aliases the normalizer recognizes, grounded in the
/// original system's two inconsistent naming families (`mc_models.py`'s
/// `p10_cost`/`item_id` vs. `mc_engine.py`'s `min_cost`/`item_id`).
fn aliased<'a>(row: &'a RawRow, canonical: &str, aliases: &[&str]) -> Option<&'a RawValue> {
    if let Some(v) = row.get(canonical) {
        return Some(v);
    }
    aliases.iter().find_map(|a| row.get(*a))
}

fn categorical_keys(row: &RawRow) -> CategoricalKeys {
    CategoricalKeys {
        owner: aliased(row, "owner", &["item_owner", "risk_owner"]).and_then(RawValue::as_string),
        discipline_id: aliased(row, "discipline_id", &["discipline"]).and_then(RawValue::as_i64),
        phase_id: aliased(row, "phase_id", &["phase"]).and_then(RawValue::as_i64),
        location_id: aliased(row, "location_id", &["location"]).and_then(RawValue::as_i64),
        risk_category_id: aliased(row, "risk_category_id", &["risk_category"])
            .and_then(RawValue::as_i64),
        risk_log_id: aliased(row, "risk_log_id", &["risk_log"]).and_then(RawValue::as_i64),
    }
}

/// Errors encountered while coercing a single raw row; each becomes an entry
/// in the validation report per §4.9 ("a single malformed row that cannot
/// be normalised is reported as a validation error").
pub struct NormalizeErrors(pub Vec<String>);

pub fn normalize_items(rows: &[RawRow]) -> (Vec<CapexItem>, Vec<String>) {
    let mut items = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        let item_id = aliased(row, "item_id", &["id"]).and_then(RawValue::as_i64);
        let name = aliased(row, "name", &["item_name"]).and_then(RawValue::as_string);
        let min = aliased(row, "min_cost", &["min", "p10_cost"]).and_then(RawValue::as_f64);
        let ml = aliased(row, "ml_cost", &["ml", "base_cost"]).and_then(RawValue::as_f64);
        let max = aliased(row, "max_cost", &["max", "p90_cost"]).and_then(RawValue::as_f64);

        match (item_id, name, min, ml, max) {
            (Some(item_id), Some(name), Some(min), Some(ml), Some(max)) => {
                items.push(CapexItem {
                    item_id,
                    name,
                    base: Triple::new(min, ml, max),
                    keys: categorical_keys(row),
                });
            }
            _ => errors.push(format!("capex item row {idx}: missing required fields")),
        }
    }
    (items, errors)
}

pub fn normalize_actions(rows: &[RawRow]) -> (Vec<CapexAction>, Vec<String>) {
    let mut actions = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        let action_id =
            aliased(row, "action_id", &["cost_action_id", "id"]).and_then(RawValue::as_i64);
        let item_id = aliased(row, "item_id", &["capex_item_id"]).and_then(RawValue::as_i64);
        let name = aliased(row, "name", &["cost_action_name"]).and_then(RawValue::as_string);
        let due = aliased(row, "due_date", &["cost_action_due"]).and_then(RawValue::as_date);
        let min = aliased(row, "pm_min_cost", &["pm_min"]).and_then(RawValue::as_f64);
        let ml = aliased(row, "pm_ml_cost", &["pm_ml"]).and_then(RawValue::as_f64);
        let max = aliased(row, "pm_max_cost", &["pm_max"]).and_then(RawValue::as_f64);

        match (action_id, item_id, name, due, min, ml, max) {
            (
                Some(action_id),
                Some(item_id),
                Some(name),
                Some(due),
                Some(min),
                Some(ml),
                Some(max),
            ) => {
                actions.push(CapexAction {
                    action_id,
                    item_id,
                    name,
                    due_date: due,
                    post_mitigation: Triple::new(min, ml, max),
                    keys: categorical_keys(row),
                });
            }
            _ => errors.push(format!(
                "capex action row {idx}: missing or unparseable required fields"
            )),
        }
    }
    (actions, errors)
}

pub fn normalize_risks(rows: &[RawRow]) -> (Vec<Risk>, Vec<String>) {
    let mut risks = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        let risk_id = aliased(row, "risk_id", &["id"]).and_then(RawValue::as_i64);
        let name = aliased(row, "name", &["risk_name"]).and_then(RawValue::as_string);
        let min = aliased(row, "min_impact", &["min", "p10_impact"]).and_then(RawValue::as_f64);
        let ml = aliased(row, "ml_impact", &["ml"]).and_then(RawValue::as_f64);
        let max = aliased(row, "max_impact", &["max", "p90_impact"]).and_then(RawValue::as_f64);
        let probability =
            aliased(row, "probability", &["prob", "risk_probability"]).and_then(RawValue::as_f64);
        let log_date = aliased(row, "log_date", &["risk_log_date"]).and_then(RawValue::as_date);

        match (risk_id, name, min, ml, max, probability) {
            (Some(risk_id), Some(name), Some(min), Some(ml), Some(max), Some(probability)) => {
                risks.push(Risk {
                    risk_id,
                    name,
                    impact: Triple::new(min, ml, max),
                    probability,
                    log_date,
                    keys: categorical_keys(row),
                });
            }
            _ => errors.push(format!(
                "risk row {idx}: missing or unparseable required fields"
            )),
        }
    }
    (risks, errors)
}

pub fn normalize_risk_actions(rows: &[RawRow]) -> (Vec<RiskAction>, Vec<String>) {
    let mut actions = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        let action_id =
            aliased(row, "action_id", &["risk_action_id", "id"]).and_then(RawValue::as_i64);
        let risk_id = aliased(row, "risk_id", &[]).and_then(RawValue::as_i64);
        let name = aliased(row, "name", &["risk_action_name"]).and_then(RawValue::as_string);
        let due = aliased(row, "due_date", &["risk_action_due"]).and_then(RawValue::as_date);
        let min = aliased(row, "pm_min_impact", &[]).and_then(RawValue::as_f64);
        let ml = aliased(row, "pm_ml_impact", &[]).and_then(RawValue::as_f64);
        let max = aliased(row, "pm_max_impact", &[]).and_then(RawValue::as_f64);
        let probability =
            aliased(row, "pm_probability", &["pm_risk_probability"]).and_then(RawValue::as_f64);

        match (action_id, risk_id, name, due, min, ml, max, probability) {
            (
                Some(action_id),
                Some(risk_id),
                Some(name),
                Some(due),
                Some(min),
                Some(ml),
                Some(max),
                Some(probability),
            ) => {
                actions.push(RiskAction {
                    action_id,
                    risk_id,
                    name,
                    due_date: due,
                    post_mitigation_impact: Triple::new(min, ml, max),
                    post_mitigation_probability: probability,
                    keys: categorical_keys(row),
                });
            }
            _ => errors.push(format!(
                "risk action row {idx}: missing or unparseable required fields"
            )),
        }
    }
    (actions, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, RawValue)]) -> RawRow {
        pairs
            .iter()
            .cloned()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn aliases_legacy_column_names() {
        let rows = vec![row(&[
            ("id", RawValue::Number(1.0)),
            ("item_name", RawValue::Text("Substation".into())),
            ("min", RawValue::Number(80_000.0)),
            ("ml", RawValue::Number(100_000.0)),
            ("max", RawValue::Number(130_000.0)),
        ])];
        let (items, errors) = normalize_items(&rows);
        assert!(errors.is_empty());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_id, 1);
        assert_eq!(items[0].base.ml, 100_000.0);
    }

    #[test]
    fn unparseable_row_becomes_an_error() {
        let rows = vec![row(&[("id", RawValue::Number(1.0))])];
        let (items, errors) = normalize_items(&rows);
        assert!(items.is_empty());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn parses_iso_dates() {
        let rows = vec![row(&[
            ("action_id", RawValue::Number(1.0)),
            ("item_id", RawValue::Number(1.0)),
            ("name", RawValue::Text("Fix".into())),
            ("due_date", RawValue::Text("2026-03-01".into())),
            ("pm_min_cost", RawValue::Number(1.0)),
            ("pm_ml_cost", RawValue::Number(2.0)),
            ("pm_max_cost", RawValue::Number(3.0)),
        ])];
        let (actions, errors) = normalize_actions(&rows);
        assert!(errors.is_empty());
        assert_eq!(
            actions[0].due_date,
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
    }
}
