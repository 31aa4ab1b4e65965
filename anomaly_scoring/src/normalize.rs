use log::debug;

use std::collections::BTreeMap;

use crate::config::*;
use crate::grouping::{AnalysisUnit, Selection, SELECTIONS_PER_UNIT};

/// The votes of one reporting unit, one column per selection.
#[derive(PartialEq, Debug, Clone)]
pub struct VoteShareRow {
    pub reporting_unit: ReportingUnitId,
    /// Aligned with the selections of the unit.
    pub counts: Vec<u64>,
    pub total: u64,
    /// `counts` divided by `total`. Sums to 1.
    pub shares: Vec<f64>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct NormalizedUnit {
    pub unit_id: UnitId,
    pub selections: Vec<Selection>,
    /// Sorted by reporting unit.
    pub rows: Vec<VoteShareRow>,
}

/// Pivots the counts of an analysis unit into vote-share vectors.
///
/// Returns `None` when the unit cannot be scored: fewer than two selections, or
/// fewer than `rules.min_reporting_units` reporting units above the noise floor.
pub fn normalize_unit(unit: &AnalysisUnit, rules: &AnalysisRules) -> Option<NormalizedUnit> {
    if unit.selections.len() < SELECTIONS_PER_UNIT {
        debug!(
            "normalize_unit: unit {}: only {} selection(s), skipping",
            unit.unit_id,
            unit.selections.len()
        );
        return None;
    }

    let mut pivot: BTreeMap<ReportingUnitId, Vec<u64>> = BTreeMap::new();
    for c in unit.counts.iter() {
        let col = match unit.selections.iter().position(|s| s.candidate == c.candidate) {
            Some(col) => col,
            None => continue,
        };
        let row = pivot
            .entry(c.reporting_unit)
            .or_insert_with(|| vec![0; unit.selections.len()]);
        row[col] += c.count;
    }

    let num_units = pivot.len();
    let rows: Vec<VoteShareRow> = pivot
        .into_iter()
        .filter_map(|(reporting_unit, counts)| {
            let total: u64 = counts.iter().sum();
            if total <= rules.noise_floor {
                return None;
            }
            let shares = counts.iter().map(|c| *c as f64 / total as f64).collect();
            Some(VoteShareRow {
                reporting_unit,
                counts,
                total,
                shares,
            })
        })
        .collect();

    debug!(
        "normalize_unit: unit {}: {} of {} reporting units above the noise floor of {}",
        unit.unit_id,
        rows.len(),
        num_units,
        rules.noise_floor
    );
    if rows.len() < rules.min_reporting_units {
        return None;
    }

    Some(NormalizedUnit {
        unit_id: unit.unit_id,
        selections: unit.selections.clone(),
        rows,
    })
}
