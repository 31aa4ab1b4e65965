use log::{debug, info};

use std::collections::HashSet;

use crate::config::*;
use crate::scoring::{ScoredObservation, ScoredUnit};
use crate::stake::VotesAtStakeResult;

/// An analysis unit chosen for display.
#[derive(PartialEq, Debug, Clone)]
pub struct SelectedUnit {
    pub unit_id: UnitId,
    pub max_votes_at_stake: f64,
    /// At most `display_cap` reporting units, by decreasing reporting unit id and
    /// then by decreasing score.
    pub observations: Vec<ScoredObservation>,
}

// The distinct values of `values`, largest first.
fn distinct_descending(values: &[f64]) -> Vec<f64> {
    let mut res: Vec<f64> = values.to_vec();
    res.sort_by(|a, b| b.total_cmp(a));
    res.dedup();
    res
}

/// Picks the analysis units with the `rules.top_n` largest distinct votes-at-stake
/// values. Every unit tied with a selected value is selected as well.
///
/// Degraded votes-at-stake values rank as 0. The result is ordered by decreasing
/// votes at stake, then by unit id.
pub fn select_top_units(
    scored: &[(ScoredUnit, VotesAtStakeResult)],
    rules: &AnalysisRules,
) -> Vec<SelectedUnit> {
    let mut candidates: Vec<(&ScoredUnit, f64)> = Vec::new();
    for (unit, stake) in scored.iter() {
        // Reporting units without any vote are an absence of data, not a split.
        let present: Vec<&ScoredObservation> =
            unit.observations.iter().filter(|o| o.total() > 0).collect();
        if present.is_empty() {
            debug!("select_top_units: unit {} has no votes", unit.unit_id);
            continue;
        }
        candidates.push((unit, stake.votes_at_stake.value()));
    }

    let values: Vec<f64> = candidates.iter().map(|(_, v)| *v).collect();
    let kept_values: Vec<f64> = distinct_descending(&values)
        .into_iter()
        .take(rules.top_n)
        .collect();
    let threshold = match kept_values.last() {
        Some(t) => *t,
        None => return vec![],
    };

    let mut selected: Vec<(&ScoredUnit, f64)> = candidates
        .into_iter()
        .filter(|(_, v)| *v >= threshold)
        .collect();
    selected.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.unit_id.cmp(&b.0.unit_id)));

    info!(
        "select_top_units: {} units selected for the top {} values {:?}",
        selected.len(),
        rules.top_n,
        kept_values
    );

    selected
        .into_iter()
        .map(|(unit, v)| SelectedUnit {
            unit_id: unit.unit_id,
            max_votes_at_stake: v,
            observations: displayed_observations(unit, rules.display_cap),
        })
        .collect()
}

// The first reporting units encountered when going down the scores.
fn displayed_observations(unit: &ScoredUnit, display_cap: usize) -> Vec<ScoredObservation> {
    let mut encounter: Vec<&ScoredObservation> =
        unit.observations.iter().filter(|o| o.total() > 0).collect();
    encounter.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.reporting_unit.cmp(&b.reporting_unit))
    });

    let mut seen: HashSet<ReportingUnitId> = HashSet::new();
    let mut res: Vec<ScoredObservation> = Vec::new();
    for o in encounter.into_iter() {
        if seen.contains(&o.reporting_unit) {
            res.push(o.clone());
        } else if seen.len() < display_cap {
            seen.insert(o.reporting_unit);
            res.push(o.clone());
        }
    }
    res.sort_by(|a, b| {
        b.reporting_unit
            .cmp(&a.reporting_unit)
            .then(b.score.total_cmp(&a.score))
    });
    res
}
