use nalgebra::{Cholesky, DMatrix, SymmetricEigen};
use tracing::warn;

use crate::config::{MAX_CORRELATION, REGULARISATION_EPSILON};
use crate::model::{Correlatable, EntityFamily, LookupTables};

/// One off-diagonal coefficient contribution, kept for the observability
/// summary (spec §4.4 "Reporting").
#[derive(Debug, Clone)]
pub struct CorrelationDetail {
    pub i: usize,
    pub j: usize,
    pub coefficient: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct CorrelationSummary {
    pub non_trivial_pairs: usize,
    pub mean_off_diagonal: f64,
    pub max_off_diagonal: f64,
    pub details: Vec<CorrelationDetail>,
}

/// Builds a K x K positive-semidefinite correlation matrix over the union of
/// active CAPEX items and active risks (spec §4.4).
pub fn build_correlation_matrix(
    entities: &[Correlatable],
    lookups: &LookupTables,
) -> (DMatrix<f64>, CorrelationSummary) {
    let k = entities.len();
    let mut matrix = DMatrix::identity(k, k);
    let mut details = Vec::new();

    for i in 0..k {
        for j in (i + 1)..k {
            let (coefficient, reason) = pairwise_coefficient(&entities[i], &entities[j], lookups);
            if coefficient > 0.0 {
                matrix[(i, j)] = coefficient;
                matrix[(j, i)] = coefficient;
                details.push(CorrelationDetail {
                    i,
                    j,
                    coefficient,
                    reason,
                });
            }
        }
    }

    let matrix = regularise(matrix);

    let off_diagonal: Vec<f64> = details.iter().map(|d| d.coefficient).collect();
    let summary = CorrelationSummary {
        non_trivial_pairs: off_diagonal.len(),
        mean_off_diagonal: if off_diagonal.is_empty() {
            0.0
        } else {
            off_diagonal.iter().sum::<f64>() / off_diagonal.len() as f64
        },
        max_off_diagonal: off_diagonal.iter().cloned().fold(0.0, f64::max),
        details,
    };

    (matrix, summary)
}

/// Identity matrix used when correlation is disabled (spec §4.6d).
pub fn identity_matrix(k: usize) -> DMatrix<f64> {
    DMatrix::identity(k, k)
}

fn pairwise_coefficient(
    a: &Correlatable,
    b: &Correlatable,
    lookups: &LookupTables,
) -> (f64, String) {
    let mut best = 0.0f64;
    let mut reason = String::new();
    let mut consider = |coefficient: f64, label: &str| {
        if coefficient > best {
            best = coefficient;
            reason = label.to_string();
        }
    };

    if let (Some(oa), Some(ob)) = (&a.keys.owner, &b.keys.owner) {
        if oa == ob {
            let same_family = a.family == b.family;
            let coefficient = if same_family { 0.5 } else { 0.2 };
            consider(coefficient, &format!("same owner: {oa}"));
        }
    }

    if let (Some(da), Some(db)) = (a.keys.discipline_id, b.keys.discipline_id) {
        if da == db {
            consider(0.4, "same discipline");
        }
    }

    if let (Some(pa), Some(pb)) = (a.keys.phase_id, b.keys.phase_id) {
        if pa == pb {
            consider(0.3, "same phase");
        } else if let (Some(oa), Some(ob)) = (lookups.phase_ordinal(pa), lookups.phase_ordinal(pb))
        {
            match (oa - ob).abs() {
                1 => consider(0.2, "adjacent phase"),
                2 => consider(0.1, "near phase"),
                _ => {}
            }
        }
    }

    if let (Some(la), Some(lb)) = (a.keys.location_id, b.keys.location_id) {
        if la == lb {
            consider(0.3, "same location");
        } else {
            let a_parent = lookups.location_parent(la);
            let b_parent = lookups.location_parent(lb);
            if a_parent == Some(lb) || b_parent == Some(la) {
                consider(0.2, "parent/child location");
            } else if let (Some(pa), Some(pb)) = (a_parent, b_parent) {
                if pa == pb {
                    consider(0.15, "sibling location");
                }
            }
        }
    }

    if a.family == EntityFamily::Risk && b.family == EntityFamily::Risk {
        if let (Some(ca), Some(cb)) = (a.keys.risk_category_id, b.keys.risk_category_id) {
            if ca == cb {
                let coefficient = lookups
                    .risk_category_name(ca)
                    .map(|name| match name.to_ascii_lowercase().as_str() {
                        "regulatory" => 0.6,
                        "weather" => 0.7,
                        "supply_chain" => 0.5,
                        "technical" => 0.4,
                        "financial" => 0.5,
                        _ => 0.4,
                    })
                    .unwrap_or(0.4);
                consider(coefficient, "same risk category");
            }
        }
        if let (Some(la), Some(lb)) = (a.keys.risk_log_id, b.keys.risk_log_id) {
            if la == lb {
                consider(0.2, "same risk log");
            }
        }
    }

    (best.min(MAX_CORRELATION), reason)
}

/// Regularises `matrix` to positive-semidefinite with a unit diagonal if it
/// isn't already (spec §4.4 "Regularisation"): eigenvalue-clamp then
/// diagonal renormalisation.
fn regularise(matrix: DMatrix<f64>) -> DMatrix<f64> {
    if Cholesky::new(matrix.clone()).is_some() {
        return matrix;
    }

    warn!("correlation matrix not positive-semidefinite, regularising");
    let eigen = SymmetricEigen::new(matrix);
    let mut eigenvalues = eigen.eigenvalues;
    for v in eigenvalues.iter_mut() {
        if *v < REGULARISATION_EPSILON {
            *v = REGULARISATION_EPSILON;
        }
    }
    let reconstructed =
        &eigen.eigenvectors * DMatrix::from_diagonal(&eigenvalues) * eigen.eigenvectors.transpose();

    let n = reconstructed.nrows();
    let mut inv_sqrt_diag = vec![1.0; n];
    for i in 0..n {
        let d = reconstructed[(i, i)];
        inv_sqrt_diag[i] = if d > 0.0 { 1.0 / d.sqrt() } else { 0.0 };
    }

    let mut out = reconstructed;
    for i in 0..n {
        for j in 0..n {
            out[(i, j)] *= inv_sqrt_diag[i] * inv_sqrt_diag[j];
        }
    }
    for i in 0..n {
        out[(i, i)] = 1.0;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CapexItem, CategoricalKeys, Triple};

    fn item_with_owner(id: i64, owner: &str) -> CapexItem {
        CapexItem {
            item_id: id,
            name: format!("item-{id}"),
            base: Triple::new(1.0, 2.0, 3.0),
            keys: CategoricalKeys {
                owner: Some(owner.to_string()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn same_owner_correlates_capex_pair() {
        let items = [item_with_owner(1, "alice"), item_with_owner(2, "alice")];
        let entities: Vec<Correlatable> = items.iter().map(Correlatable::capex).collect();
        let lookups = LookupTables::default();
        let (matrix, summary) = build_correlation_matrix(&entities, &lookups);
        assert_eq!(matrix[(0, 1)], 0.5);
        assert_eq!(summary.non_trivial_pairs, 1);
    }

    #[test]
    fn output_is_always_psd_with_unit_diagonal() {
        // Force a regularisation case: three items pairwise "same owner"
        // pairs but manufactured incompatible raw coefficients are not
        // reachable through the public rule set, so this exercises the
        // happy path through Cholesky directly, confirming unit diagonal.
        let items = [
            item_with_owner(1, "alice"),
            item_with_owner(2, "alice"),
            item_with_owner(3, "bob"),
        ];
        let entities: Vec<Correlatable> = items.iter().map(Correlatable::capex).collect();
        let lookups = LookupTables::default();
        let (matrix, _) = build_correlation_matrix(&entities, &lookups);
        for i in 0..matrix.nrows() {
            assert!((matrix[(i, i)] - 1.0).abs() < 1e-9);
        }
        let eigen = SymmetricEigen::new(matrix);
        for v in eigen.eigenvalues.iter() {
            assert!(*v >= -1e-9);
        }
    }

    #[test]
    fn regularisation_restores_psd_and_unit_diagonal() {
        // A matrix that is symmetric, unit-diagonal, but not PSD.
        let mut raw = DMatrix::<f64>::identity(3, 3);
        raw[(0, 1)] = 0.8;
        raw[(1, 0)] = 0.8;
        raw[(0, 2)] = 0.8;
        raw[(2, 0)] = 0.8;
        raw[(1, 2)] = -0.8;
        raw[(2, 1)] = -0.8;
        let fixed = regularise(raw);
        for i in 0..3 {
            assert!((fixed[(i, i)] - 1.0).abs() < 1e-6);
        }
        let eigen = SymmetricEigen::new(fixed);
        for v in eigen.eigenvalues.iter() {
            assert!(*v >= -1e-6);
        }
    }
}
