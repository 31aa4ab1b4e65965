mod config;
pub mod builder;
pub mod grouping;
pub mod hierarchy;
pub mod manual;
pub mod normalize;
pub mod scoring;
pub mod selection;
pub mod source;
pub mod stake;

use log::{debug, info};

use std::collections::{BTreeSet, HashMap};

pub use crate::config::*;
use crate::grouping::{group_analysis_units, AnalysisUnit};
use crate::hierarchy::Hierarchy;
use crate::normalize::normalize_unit;
use crate::scoring::{score_unit, ScoredUnit};
use crate::selection::{select_top_units, SelectedUnit};
pub use crate::source::{CancelHandle, FetchControl, InMemorySource, ObservationSource, Snapshot};
use crate::stake::{estimate_votes_at_stake, VotesAtStakeResult};

// The reporting units whose roll-up is compared.
fn resolve_parents(
    hierarchy: &Hierarchy,
    request: &AnalysisRequest,
) -> Result<BTreeSet<ReportingUnitId>, AnalysisErrors> {
    match &request.subdivision_type {
        Some(rut) => hierarchy.descendants(&[request.jurisdiction], Some(rut)),
        None => {
            // The jurisdiction as a whole is not compared with its own subunits.
            let mut res = hierarchy.descendants(&[request.jurisdiction], None)?;
            res.remove(&request.jurisdiction);
            Ok(res)
        }
    }
}

/// Runs the anomaly analysis for one request.
///
/// Arguments:
/// * `source` where the reporting units and the vote counts are read from
/// * `request` the jurisdiction, subdivision type and contest to analyze
/// * `rules` the thresholds of the analysis
/// * `control` the deadline and cancellation flag of the request
///
/// Analysis units that cannot be scored are skipped silently. The only errors are
/// invalid inputs, a jurisdiction without subunits of the requested type, and
/// failures or expiry of the request itself.
pub fn run_anomaly_analysis(
    source: &dyn ObservationSource,
    request: &AnalysisRequest,
    rules: &AnalysisRules,
    control: &FetchControl,
) -> Result<Vec<AnomalyReport>, AnalysisErrors> {
    info!("Processing request {:?} with rules {:?}", request, rules);
    rules.validate()?;
    control.checkpoint()?;

    let snapshot = source.fetch(request, control)?;
    info!(
        "Fetched {} reporting units and {} vote counts",
        snapshot.reporting_units.len(),
        snapshot.vote_counts.len()
    );
    control.checkpoint()?;

    let hierarchy = Hierarchy::new(&snapshot.reporting_units)?;
    let parents = resolve_parents(&hierarchy, request)?;
    debug!(
        "run_anomaly_analysis: {} reporting units compared below {}",
        parents.len(),
        hierarchy.name(request.jurisdiction)
    );

    let counts: Vec<VoteCount> = snapshot
        .vote_counts
        .into_iter()
        .filter(|vc| request.contest.map_or(true, |c| vc.contest == c))
        .collect();
    let rows: Vec<ObservationRow> = hierarchy
        .compose(&counts)?
        .into_iter()
        .filter(|r| parents.contains(&r.parent_reporting_unit))
        .collect();
    info!(
        "Composed {} observation rows from {} vote counts",
        rows.len(),
        counts.len()
    );
    control.checkpoint()?;

    let units = group_analysis_units(&rows, &hierarchy)?;
    info!("Enumerated {} analysis units", units.len());

    let mut scored: Vec<(ScoredUnit, VotesAtStakeResult)> = Vec::new();
    for unit in units.iter() {
        control.checkpoint()?;
        let normalized = match normalize_unit(unit, rules) {
            Some(n) => n,
            None => continue,
        };
        let s = score_unit(&normalized);
        let stake = estimate_votes_at_stake(&s, rules.margin_divisor);
        scored.push((s, stake));
    }
    info!("Scored {} of {} analysis units", scored.len(), units.len());
    control.checkpoint()?;

    let selected = select_top_units(&scored, rules);
    let units_by_id: HashMap<UnitId, &AnalysisUnit> =
        units.iter().map(|u| (u.unit_id, u)).collect();
    let stakes_by_id: HashMap<UnitId, &VotesAtStakeResult> =
        scored.iter().map(|(s, v)| (s.unit_id, v)).collect();

    let mut res: Vec<AnomalyReport> = Vec::new();
    for sel in selected.iter() {
        if let (Some(unit), Some(stake)) =
            (units_by_id.get(&sel.unit_id), stakes_by_id.get(&sel.unit_id))
        {
            res.push(package(sel, unit, stake, request, rules, &hierarchy));
        }
    }
    info!("Reporting {} analysis units", res.len());
    Ok(res)
}

fn package(
    selected: &SelectedUnit,
    unit: &AnalysisUnit,
    stake: &VotesAtStakeResult,
    request: &AnalysisRequest,
    rules: &AnalysisRules,
    hierarchy: &Hierarchy,
) -> AnomalyReport {
    let name_of = |idx: usize| {
        unit.selections
            .get(idx)
            .map(|s| s.name.clone())
            .unwrap_or_default()
    };
    let counts: Vec<ReportedCount> = selected
        .observations
        .iter()
        .map(|o| ReportedCount {
            reporting_unit: o.reporting_unit,
            name: hierarchy.name(o.reporting_unit),
            x: o.candidate_votes.first().map(|(_, c)| *c).unwrap_or(0),
            y: o.candidate_votes.get(1).map(|(_, c)| *c).unwrap_or(0),
            score: o.score,
        })
        .collect();
    AnomalyReport {
        unit_id: unit.unit_id,
        election: request.election.clone(),
        jurisdiction: hierarchy.name(request.jurisdiction),
        contest: unit.contest_name.clone(),
        subdivision_type: unit.key.reporting_unit_type.clone(),
        vote_category: unit.key.vote_category.clone(),
        candidates: (name_of(0), name_of(1)),
        score: stake.score,
        votes_at_stake: stake.votes_at_stake.clone(),
        max_votes_at_stake: selected.max_votes_at_stake,
        margin: rules.margin_divisor,
        anomalous_units: stake.anomalous_units.clone(),
        anomalous_unit_names: stake
            .anomalous_units
            .iter()
            .map(|id| hierarchy.name(*id))
            .collect(),
        counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;

    const SPLITS: [(u64, u64); 6] = [
        (900, 100),
        (452, 48),
        (179, 21),
        (270, 30),
        (183, 17),
        (80, 120),
    ];

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    // A state, one county and six precincts. Each contest has the same splits,
    // multiplied by its factor.
    fn georgia(factors: &[(&str, u64)]) -> (Builder, Vec<ReportingUnitId>) {
        let mut b = Builder::new();
        let state = b
            .reporting_unit("Georgia", ReportingUnitType::State, None)
            .unwrap();
        let county = b
            .reporting_unit("Fulton", ReportingUnitType::County, Some(state))
            .unwrap();
        let precincts: Vec<ReportingUnitId> = (1..=SPLITS.len())
            .map(|i| {
                b.reporting_unit(
                    &format!("Fulton;P{}", i),
                    ReportingUnitType::Precinct,
                    Some(county),
                )
                .unwrap()
            })
            .collect();
        for (name, factor) in factors.iter() {
            let contest = b.contest(name);
            for (p, (a, c)) in precincts.iter().zip(SPLITS.iter()) {
                b.add_count_simple(*p, contest, "Anna", a * factor).unwrap();
                b.add_count_simple(*p, contest, "Bob", c * factor).unwrap();
            }
        }
        (b, precincts)
    }

    fn request(subdivision_type: Option<ReportingUnitType>) -> AnalysisRequest {
        AnalysisRequest {
            election: "2020 General".to_string(),
            jurisdiction: ReportingUnitId(1),
            subdivision_type,
            contest: None,
        }
    }

    #[test]
    fn reversed_precinct_is_reported() {
        init();
        let (b, precincts) = georgia(&[("Governor", 1)]);
        let res = run_anomaly_analysis(
            &b.build_source(),
            &request(Some(ReportingUnitType::Precinct)),
            &AnalysisRules::DEFAULT_RULES,
            &FetchControl::unbounded(),
        )
        .unwrap();
        assert_eq!(res.len(), 1);
        let r = &res[0];
        assert_eq!(r.jurisdiction, "Georgia");
        assert_eq!(r.contest, "Governor");
        assert_eq!(r.election, "2020 General");
        assert_eq!(r.subdivision_type, ReportingUnitType::Precinct);
        assert_eq!(r.vote_category, VoteCategory::Total);
        assert_eq!(r.candidates, ("Anna".to_string(), "Bob".to_string()));
        assert_eq!(r.anomalous_units, vec![precincts[5]]);
        assert_eq!(r.anomalous_unit_names, vec!["Fulton;P6".to_string()]);
        assert!(r.score > 2.0);
        assert!((r.votes_at_stake.value() - 206.0).abs() < 1e-9);
        assert_eq!(r.max_votes_at_stake, r.votes_at_stake.value());
        assert_eq!(r.margin, 1.0);
        assert_eq!(r.counts.len(), 6);
        // By decreasing reporting unit.
        assert_eq!(r.counts[0].reporting_unit, precincts[5]);
        assert_eq!(r.counts[0].name, "Fulton;P6");
        assert_eq!((r.counts[0].x, r.counts[0].y), (80, 120));
    }

    #[test]
    fn jurisdiction_is_not_compared_with_its_subunits() {
        init();
        let (b, _) = georgia(&[("Governor", 1)]);
        let res = run_anomaly_analysis(
            &b.build_source(),
            &request(None),
            &AnalysisRules::DEFAULT_RULES,
            &FetchControl::unbounded(),
        )
        .unwrap();
        // The county level has a single unit and cannot be scored.
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].subdivision_type, ReportingUnitType::Precinct);
    }

    #[test]
    fn top_contests_with_ties() {
        init();
        let (b, _) = georgia(&[
            ("Governor", 1),
            ("Senate", 2),
            ("House", 3),
            ("Mayor", 4),
            ("Sheriff", 2),
        ]);
        let res = run_anomaly_analysis(
            &b.build_source(),
            &request(Some(ReportingUnitType::Precinct)),
            &AnalysisRules::DEFAULT_RULES,
            &FetchControl::unbounded(),
        )
        .unwrap();
        let contests: Vec<&str> = res.iter().map(|r| r.contest.as_str()).collect();
        assert_eq!(contests, vec!["Mayor", "House", "Senate", "Sheriff"]);
        assert!((res[0].max_votes_at_stake - 824.0).abs() < 1e-6);
    }

    #[test]
    fn contest_filter() {
        init();
        let (b, _) = georgia(&[("Governor", 1), ("Mayor", 4)]);
        let mut req = request(Some(ReportingUnitType::Precinct));
        req.contest = Some(ContestId(1));
        let res = run_anomaly_analysis(
            &b.build_source(),
            &req,
            &AnalysisRules::DEFAULT_RULES,
            &FetchControl::unbounded(),
        )
        .unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].contest, "Governor");
    }

    #[test]
    fn noise_floor_can_empty_the_results() {
        init();
        let (b, _) = georgia(&[("Governor", 1)]);
        let rules = AnalysisRules {
            noise_floor: 250,
            ..AnalysisRules::DEFAULT_RULES
        };
        let res = run_anomaly_analysis(
            &b.build_source(),
            &request(Some(ReportingUnitType::Precinct)),
            &rules,
            &FetchControl::unbounded(),
        )
        .unwrap();
        assert!(res.is_empty());
    }

    #[test]
    fn no_matching_subunits_is_fatal() {
        init();
        let (b, _) = georgia(&[("Governor", 1)]);
        let err = run_anomaly_analysis(
            &b.build_source(),
            &request(Some(ReportingUnitType::Ward)),
            &AnalysisRules::DEFAULT_RULES,
            &FetchControl::unbounded(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            AnalysisErrors::NoMatchingSubunits {
                jurisdiction: "Georgia".to_string(),
                subdivision_type: "ward".to_string(),
            }
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn cancelled_request() {
        init();
        let (b, _) = georgia(&[("Governor", 1)]);
        let control = FetchControl::unbounded();
        control.cancel_handle().cancel();
        let err = run_anomaly_analysis(
            &b.build_source(),
            &request(None),
            &AnalysisRules::DEFAULT_RULES,
            &control,
        )
        .unwrap_err();
        assert_eq!(err, AnalysisErrors::Cancelled);
    }

    #[test]
    fn invalid_rules() {
        let (b, _) = georgia(&[("Governor", 1)]);
        let rules = AnalysisRules {
            margin_divisor: 0.0,
            ..AnalysisRules::DEFAULT_RULES
        };
        let err = run_anomaly_analysis(
            &b.build_source(),
            &request(None),
            &rules,
            &FetchControl::unbounded(),
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisErrors::InvalidRules(_)));
    }

    struct FailingSource;

    impl ObservationSource for FailingSource {
        fn fetch(
            &self,
            _request: &AnalysisRequest,
            _control: &FetchControl,
        ) -> Result<Snapshot, AnalysisErrors> {
            Err(AnalysisErrors::Fetch("connection reset".to_string()))
        }
    }

    #[test]
    fn fetch_failures_are_retryable() {
        let err = run_anomaly_analysis(
            &FailingSource,
            &request(None),
            &AnalysisRules::DEFAULT_RULES,
            &FetchControl::unbounded(),
        )
        .unwrap_err();
        assert!(err.is_retryable());
    }
}
