use log::debug;

use crate::config::*;
use crate::grouping::Selection;
use crate::normalize::NormalizedUnit;

// Standard deviations below this (relative to the mean distance) are rounding noise.
const ZERO_VARIANCE_TOLERANCE: f64 = 1e-12;

#[derive(PartialEq, Debug, Clone)]
pub struct ScoredObservation {
    pub unit_id: UnitId,
    pub reporting_unit: ReportingUnitId,
    /// Votes of each selection of the unit, in the order of the selections.
    pub candidate_votes: Vec<(CandidateId, u64)>,
    pub shares: Vec<f64>,
    pub score: f64,
}

impl ScoredObservation {
    pub fn votes(&self, candidate: CandidateId) -> Option<u64> {
        self.candidate_votes
            .iter()
            .find(|(cid, _)| *cid == candidate)
            .map(|(_, c)| *c)
    }

    pub fn total(&self) -> u64 {
        self.candidate_votes.iter().map(|(_, c)| c).sum()
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct ScoredUnit {
    pub unit_id: UnitId,
    pub selections: Vec<Selection>,
    /// Sorted by reporting unit.
    pub observations: Vec<ScoredObservation>,
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Takes a list of vectors, all of the same dimension, and returns for each of them
/// the z-score of its summed distance to all the vectors of the list.
///
/// When all the summed distances are the same, all the scores are 0.
pub fn euclidean_zscore(vectors: &[Vec<f64>]) -> Vec<f64> {
    if vectors.is_empty() {
        return vec![];
    }
    let distances: Vec<f64> = vectors
        .iter()
        .map(|v| vectors.iter().map(|w| euclidean(v, w)).sum())
        .collect();
    let n = distances.len() as f64;
    let mean = distances.iter().sum::<f64>() / n;
    let variance = distances.iter().map(|d| (d - mean) * (d - mean)).sum::<f64>() / n;
    let std = variance.sqrt();
    if !std.is_finite() || std <= ZERO_VARIANCE_TOLERANCE * mean.abs().max(1.0) {
        return vec![0.0; vectors.len()];
    }
    distances.iter().map(|d| (d - mean) / std).collect()
}

/// Scores every reporting unit of an analysis unit against its peers.
pub fn score_unit(unit: &NormalizedUnit) -> ScoredUnit {
    let vectors: Vec<Vec<f64>> = unit.rows.iter().map(|r| r.shares.clone()).collect();
    let scores = euclidean_zscore(&vectors);
    let observations: Vec<ScoredObservation> = unit
        .rows
        .iter()
        .zip(scores)
        .map(|(r, score)| ScoredObservation {
            unit_id: unit.unit_id,
            reporting_unit: r.reporting_unit,
            candidate_votes: unit
                .selections
                .iter()
                .map(|s| s.candidate)
                .zip(r.counts.iter().cloned())
                .collect(),
            shares: r.shares.clone(),
            score,
        })
        .collect();
    debug!(
        "score_unit: unit {}: scores {:?}",
        unit.unit_id,
        observations
            .iter()
            .map(|o| (o.reporting_unit.0, o.score))
            .collect::<Vec<_>>()
    );
    ScoredUnit {
        unit_id: unit.unit_id,
        selections: unit.selections.clone(),
        observations,
    }
}
