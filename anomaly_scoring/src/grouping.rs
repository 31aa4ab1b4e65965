use log::debug;

use std::collections::HashMap;

use crate::config::*;
use crate::hierarchy::Hierarchy;

/// Only two selections can be compared by the distance-based score.
pub const SELECTIONS_PER_UNIT: usize = 2;

/// A comparable population of reporting units.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct AnalysisUnitKey {
    pub contest: ContestId,
    pub reporting_unit_type: ReportingUnitType,
    pub vote_category: VoteCategory,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Selection {
    pub candidate: CandidateId,
    pub name: String,
}

/// All the votes for one candidate in one (rolled-up) reporting unit.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct UnitCount {
    pub reporting_unit: ReportingUnitId,
    pub candidate: CandidateId,
    pub count: u64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AnalysisUnit {
    pub unit_id: UnitId,
    pub key: AnalysisUnitKey,
    pub contest_name: String,
    /// At most two selections. When a unit had more, the two kept are in the order
    /// of the global ranking. Otherwise they are in the order of first appearance.
    pub selections: Vec<Selection>,
    /// The counts of the kept selections only.
    pub counts: Vec<UnitCount>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
struct RolledUp {
    reporting_unit: ReportingUnitId,
    unit_type: ReportingUnitType,
    contest: ContestId,
    contest_name: String,
    candidate: CandidateId,
    selection_name: String,
    vote_category: VoteCategory,
    count: u64,
}

type RollupKey = (ReportingUnitId, ContestId, CandidateId, VoteCategory);

// Sums the counts of every child into its parent. Since every unit is its own
// parent at depth 0, this also gives the total of each unit on its own.
fn roll_up(
    rows: &[ObservationRow],
    hierarchy: &Hierarchy,
) -> Result<Vec<RolledUp>, AnalysisErrors> {
    let mut res: Vec<RolledUp> = Vec::new();
    let mut index: HashMap<RollupKey, usize> = HashMap::new();
    for r in rows.iter() {
        let key: RollupKey = (
            r.parent_reporting_unit,
            r.contest,
            r.candidate,
            r.vote_category.clone(),
        );
        if let Some(idx) = index.get(&key) {
            res[*idx].count += r.count;
        } else {
            let parent = hierarchy
                .unit(r.parent_reporting_unit)
                .ok_or(AnalysisErrors::UnknownReportingUnit(r.parent_reporting_unit))?;
            index.insert(key, res.len());
            res.push(RolledUp {
                reporting_unit: r.parent_reporting_unit,
                unit_type: parent.unit_type.clone(),
                contest: r.contest,
                contest_name: r.contest_name.clone(),
                candidate: r.candidate,
                selection_name: r.selection_name.clone(),
                vote_category: r.vote_category.clone(),
                count: r.count,
            });
        }
    }
    Ok(res)
}

// Ranks the candidates of a contest by their total votes over all the reporting
// units of one type. Ties are broken by candidate id.
fn global_ranking(
    rolled: &[RolledUp],
    contest: ContestId,
    unit_type: &ReportingUnitType,
) -> Vec<CandidateId> {
    let mut totals: HashMap<CandidateId, u64> = HashMap::new();
    for r in rolled.iter().filter(|r| {
        r.contest == contest && r.unit_type == *unit_type && r.vote_category == VoteCategory::Total
    }) {
        *totals.entry(r.candidate).or_insert(0) += r.count;
    }
    let mut ranked: Vec<(CandidateId, u64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().map(|(cid, _)| cid).collect()
}

/// Rolls the observations up to their parents and splits them into analysis units.
///
/// Unit ids are assigned in the order in which the units first appear in `rows`.
/// Units that keep fewer than two selections are still returned; they are not
/// scored further down.
pub fn group_analysis_units(
    rows: &[ObservationRow],
    hierarchy: &Hierarchy,
) -> Result<Vec<AnalysisUnit>, AnalysisErrors> {
    let rolled = roll_up(rows, hierarchy)?;
    debug!(
        "group_analysis_units: {} rows rolled up into {}",
        rows.len(),
        rolled.len()
    );

    let mut keys: Vec<AnalysisUnitKey> = Vec::new();
    let mut members: HashMap<AnalysisUnitKey, Vec<&RolledUp>> = HashMap::new();
    for r in rolled.iter() {
        let key = AnalysisUnitKey {
            contest: r.contest,
            reporting_unit_type: r.unit_type.clone(),
            vote_category: r.vote_category.clone(),
        };
        members
            .entry(key.clone())
            .or_insert_with(|| {
                keys.push(key);
                Vec::new()
            })
            .push(r);
    }

    let mut res: Vec<AnalysisUnit> = Vec::new();
    for (idx, key) in keys.into_iter().enumerate() {
        let unit_rows = members.remove(&key).unwrap_or_default();

        let mut selections: Vec<Selection> = Vec::new();
        for r in unit_rows.iter() {
            if !selections.iter().any(|s| s.candidate == r.candidate) {
                selections.push(Selection {
                    candidate: r.candidate,
                    name: r.selection_name.clone(),
                });
            }
        }

        if selections.len() > SELECTIONS_PER_UNIT {
            let ranking = global_ranking(&rolled, key.contest, &key.reporting_unit_type);
            let kept: Vec<Selection> = ranking
                .iter()
                .take(SELECTIONS_PER_UNIT)
                .filter_map(|cid| selections.iter().find(|s| s.candidate == *cid).cloned())
                .collect();
            debug!(
                "group_analysis_units: unit {} {:?}: keeping {:?} out of {} selections",
                idx,
                key,
                kept,
                selections.len()
            );
            selections = kept;
        }

        let counts: Vec<UnitCount> = unit_rows
            .iter()
            .filter(|r| selections.iter().any(|s| s.candidate == r.candidate))
            .map(|r| UnitCount {
                reporting_unit: r.reporting_unit,
                candidate: r.candidate,
                count: r.count,
            })
            .collect();

        let contest_name = unit_rows
            .first()
            .map(|r| r.contest_name.clone())
            .unwrap_or_default();

        res.push(AnalysisUnit {
            unit_id: UnitId(idx as u32),
            key,
            contest_name,
            selections,
            counts,
        });
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy() -> Hierarchy {
        let mut units = vec![
            ReportingUnit {
                id: ReportingUnitId(1),
                name: "State".to_string(),
                unit_type: ReportingUnitType::State,
                parent: None,
            },
            ReportingUnit {
                id: ReportingUnitId(2),
                name: "County".to_string(),
                unit_type: ReportingUnitType::County,
                parent: Some(ReportingUnitId(1)),
            },
        ];
        for p in 10..13 {
            units.push(ReportingUnit {
                id: ReportingUnitId(p),
                name: format!("P{}", p),
                unit_type: ReportingUnitType::Precinct,
                parent: Some(ReportingUnitId(2)),
            });
        }
        Hierarchy::new(&units).unwrap()
    }

    fn vc(ru: u64, cand: u64, cat: VoteCategory, count: u64) -> VoteCount {
        VoteCount {
            reporting_unit: ReportingUnitId(ru),
            contest: ContestId(7),
            contest_name: "Mayor".to_string(),
            candidate: CandidateId(cand),
            selection_name: format!("C{}", cand),
            vote_category: cat,
            count,
        }
    }

    fn unit<'a>(
        units: &'a [AnalysisUnit],
        t: ReportingUnitType,
        c: VoteCategory,
    ) -> &'a AnalysisUnit {
        units
            .iter()
            .find(|u| u.key.reporting_unit_type == t && u.key.vote_category == c)
            .unwrap()
    }

    #[test]
    fn roll_up_sums_children_and_self() {
        let h = hierarchy();
        let counts = vec![
            vc(10, 1, VoteCategory::Total, 5),
            vc(11, 1, VoteCategory::Total, 7),
            vc(10, 2, VoteCategory::Total, 3),
        ];
        let rows = h.compose(&counts).unwrap();
        let units = group_analysis_units(&rows, &h).unwrap();

        // precinct, county and state level, in order of appearance
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].unit_id, UnitId(0));
        assert_eq!(units[0].key.reporting_unit_type, ReportingUnitType::Precinct);
        assert_eq!(units[1].key.reporting_unit_type, ReportingUnitType::County);
        assert_eq!(units[2].key.reporting_unit_type, ReportingUnitType::State);

        let county = unit(&units, ReportingUnitType::County, VoteCategory::Total);
        let c1: u64 = county
            .counts
            .iter()
            .filter(|c| c.candidate == CandidateId(1))
            .map(|c| c.count)
            .sum();
        assert_eq!(c1, 12);
        assert_eq!(county.contest_name, "Mayor");

        let precincts = unit(&units, ReportingUnitType::Precinct, VoteCategory::Total);
        assert_eq!(precincts.counts.len(), 3);
    }

    #[test]
    fn categories_make_distinct_units() {
        let h = hierarchy();
        let counts = vec![
            vc(10, 1, VoteCategory::Total, 5),
            vc(10, 1, VoteCategory::AbsenteeMail, 2),
        ];
        let rows = h.compose(&counts).unwrap();
        let units = group_analysis_units(&rows, &h).unwrap();
        assert_eq!(units.len(), 6);
        let ids: Vec<u32> = units.iter().map(|u| u.unit_id.0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn third_candidate_is_dropped() {
        let h = hierarchy();
        let mut counts = Vec::new();
        for p in 10..13 {
            counts.push(vc(p, 1, VoteCategory::Total, 500));
            counts.push(vc(p, 2, VoteCategory::Total, 400));
            counts.push(vc(p, 3, VoteCategory::Total, 45));
            counts.push(vc(p, 1, VoteCategory::ElectionDay, 10));
            counts.push(vc(p, 2, VoteCategory::ElectionDay, 10));
            // The third candidate leads on election day, but not in the totals.
            counts.push(vc(p, 3, VoteCategory::ElectionDay, 40));
        }
        let rows = h.compose(&counts).unwrap();
        let units = group_analysis_units(&rows, &h).unwrap();

        for cat in [VoteCategory::Total, VoteCategory::ElectionDay] {
            let u = unit(&units, ReportingUnitType::Precinct, cat);
            let kept: Vec<CandidateId> = u.selections.iter().map(|s| s.candidate).collect();
            assert_eq!(kept, vec![CandidateId(1), CandidateId(2)]);
            assert!(u.counts.iter().all(|c| c.candidate != CandidateId(3)));
            assert_eq!(u.counts.len(), 6);
        }
    }

    #[test]
    fn single_selection_is_kept_as_is() {
        let h = hierarchy();
        let rows = h.compose(&[vc(10, 1, VoteCategory::Total, 500)]).unwrap();
        let units = group_analysis_units(&rows, &h).unwrap();
        assert!(units.iter().all(|u| u.selections.len() == 1));
    }
}
