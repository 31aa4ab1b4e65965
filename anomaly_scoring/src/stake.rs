use log::{debug, warn};

use std::cmp::Ordering;

use crate::config::*;
use crate::scoring::ScoredUnit;

/// Number of candidate rows in the anomalous pair and in the next-anomalous pair.
const PAIR_SIZE: usize = 2;

#[derive(PartialEq, Debug, Clone)]
pub struct VotesAtStakeResult {
    pub unit_id: UnitId,
    pub votes_at_stake: VotesAtStake,
    /// The signed score of the most anomalous row, 0 when nothing was scored.
    pub score: f64,
    pub anomalous_units: Vec<ReportingUnitId>,
    pub next_units: Vec<ReportingUnitId>,
    pub candidates: Option<(CandidateId, CandidateId)>,
}

// The votes of one candidate in one reporting unit, with the score of the unit.
#[derive(PartialEq, Debug, Clone, Copy)]
struct CandidateRow {
    reporting_unit: ReportingUnitId,
    candidate: CandidateId,
    count: u64,
    score: f64,
}

// Rows of the same reporting unit share a score: breaking ties by reporting unit
// keeps them next to each other.
fn tie_break(a: &CandidateRow, b: &CandidateRow) -> Ordering {
    a.reporting_unit
        .cmp(&b.reporting_unit)
        .then(a.candidate.cmp(&b.candidate))
}

fn distinct_units(rows: &[CandidateRow]) -> Vec<ReportingUnitId> {
    let mut res: Vec<ReportingUnitId> = Vec::new();
    for r in rows.iter() {
        if !res.contains(&r.reporting_unit) {
            res.push(r.reporting_unit);
        }
    }
    res
}

fn votes_of(rows: &[CandidateRow], candidate: CandidateId) -> Option<u64> {
    let mut found = false;
    let mut total = 0;
    for r in rows.iter().filter(|r| r.candidate == candidate) {
        found = true;
        total += r.count;
    }
    if found {
        Some(total)
    } else {
        None
    }
}

/// Moves the most anomalous pair of rows to the split of the next most anomalous
/// pair on the same side, and counts how many votes change on the way.
pub fn estimate_votes_at_stake(unit: &ScoredUnit, margin_divisor: f64) -> VotesAtStakeResult {
    let rows: Vec<CandidateRow> = unit
        .observations
        .iter()
        .flat_map(|o| {
            o.candidate_votes.iter().map(move |(candidate, count)| CandidateRow {
                reporting_unit: o.reporting_unit,
                candidate: *candidate,
                count: *count,
                score: o.score,
            })
        })
        .collect();

    let candidates = match unit.selections.as_slice() {
        [a, b, ..] => Some((a.candidate, b.candidate)),
        _ => None,
    };

    let mut res = VotesAtStakeResult {
        unit_id: unit.unit_id,
        votes_at_stake: VotesAtStake::InsufficientData,
        score: 0.0,
        anomalous_units: vec![],
        next_units: vec![],
        candidates,
    };

    if rows.len() <= PAIR_SIZE {
        debug!(
            "estimate_votes_at_stake: unit {}: only {} rows",
            unit.unit_id,
            rows.len()
        );
        return res;
    }

    let mut by_abs = rows.clone();
    by_abs.sort_by(|a, b| {
        b.score
            .abs()
            .total_cmp(&a.score.abs())
            .then_with(|| tie_break(a, b))
    });
    let anomalous: Vec<CandidateRow> = by_abs.into_iter().take(PAIR_SIZE).collect();
    let anomalous_score = anomalous[0].score;
    res.score = anomalous_score;
    res.anomalous_units = distinct_units(&anomalous);

    // Nobody deviates from anybody: there is nothing at stake.
    if anomalous_score == 0.0 {
        res.votes_at_stake = VotesAtStake::Computed(0.0);
        return res;
    }

    let mut same_side: Vec<CandidateRow> = if anomalous_score > 0.0 {
        let mut v: Vec<CandidateRow> = rows
            .iter()
            .filter(|r| r.score < anomalous_score)
            .cloned()
            .collect();
        v.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| tie_break(a, b)));
        v
    } else {
        let mut v: Vec<CandidateRow> = rows
            .iter()
            .filter(|r| r.score > anomalous_score)
            .cloned()
            .collect();
        v.sort_by(|a, b| a.score.total_cmp(&b.score).then_with(|| tie_break(a, b)));
        v
    };
    same_side.truncate(PAIR_SIZE);
    let next = same_side;
    res.next_units = distinct_units(&next);

    res.votes_at_stake = match compute_stake(&anomalous, &next, candidates, margin_divisor) {
        Ok(v) => {
            debug!(
                "estimate_votes_at_stake: unit {}: anomalous {:?} next {:?} votes at stake {}",
                unit.unit_id, res.anomalous_units, res.next_units, v
            );
            VotesAtStake::Computed(v)
        }
        Err(failure) => {
            warn!(
                "estimate_votes_at_stake: unit {}: could not compute the votes at stake ({:?}), reporting 0",
                unit.unit_id, failure
            );
            VotesAtStake::ComputationFailed(failure)
        }
    };
    res
}

fn compute_stake(
    anomalous: &[CandidateRow],
    next: &[CandidateRow],
    candidates: Option<(CandidateId, CandidateId)>,
    margin_divisor: f64,
) -> Result<f64, StakeFailure> {
    if next.is_empty() {
        return Err(StakeFailure::MissingNextPair);
    }
    let (c1, c2) = candidates.ok_or(StakeFailure::MissingNextPair)?;
    let anomalous_total: u64 = anomalous.iter().map(|r| r.count).sum();
    let next_total: u64 = next.iter().map(|r| r.count).sum();
    if next_total == 0 {
        return Err(StakeFailure::ZeroNextTotal);
    }

    let mut stake = 0.0;
    for c in [c1, c2] {
        let next_votes = votes_of(next, c).ok_or(StakeFailure::MissingCandidate(c))?;
        let anomalous_votes = votes_of(anomalous, c).ok_or(StakeFailure::MissingCandidate(c))?;
        let next_proportion = next_votes as f64 / next_total as f64;
        stake += (next_proportion * anomalous_total as f64 - anomalous_votes as f64).abs();
    }

    if !(margin_divisor.is_finite() && margin_divisor > 0.0) {
        return Err(StakeFailure::NonFinite);
    }
    let v = stake / margin_divisor;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(StakeFailure::NonFinite)
    }
}
