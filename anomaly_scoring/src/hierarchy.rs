use log::debug;

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::config::*;

/// One edge of the composition relation.
///
/// Every reporting unit is its own ancestor at depth 0, so summing the rows of a
/// parent also produces the total of each unit on its own.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct CompositionEdge {
    pub child: ReportingUnitId,
    pub parent: ReportingUnitId,
    pub depth: u32,
}

/// The reporting units of a jurisdiction, organized as a tree.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    units: HashMap<ReportingUnitId, ReportingUnit>,
    // Insertion order of the units, for deterministic iteration.
    order: Vec<ReportingUnitId>,
    // For each unit, itself and then its ancestors by increasing depth.
    ancestors: HashMap<ReportingUnitId, Vec<CompositionEdge>>,
}

impl Hierarchy {
    pub fn new(units: &[ReportingUnit]) -> Result<Hierarchy, AnalysisErrors> {
        let mut by_id: HashMap<ReportingUnitId, ReportingUnit> = HashMap::new();
        let mut order: Vec<ReportingUnitId> = Vec::new();
        for ru in units.iter() {
            if by_id.insert(ru.id, ru.clone()).is_some() {
                return Err(AnalysisErrors::InvalidHierarchy(format!(
                    "reporting unit {} is listed twice",
                    ru.id
                )));
            }
            order.push(ru.id);
        }

        let mut ancestors: HashMap<ReportingUnitId, Vec<CompositionEdge>> = HashMap::new();
        for id in order.iter() {
            let mut chain = vec![CompositionEdge {
                child: *id,
                parent: *id,
                depth: 0,
            }];
            let mut seen: HashSet<ReportingUnitId> = HashSet::new();
            seen.insert(*id);
            let mut cur = by_id[id].parent;
            while let Some(parent) = cur {
                if !seen.insert(parent) {
                    return Err(AnalysisErrors::InvalidHierarchy(format!(
                        "reporting unit {} is its own ancestor",
                        parent
                    )));
                }
                let parent_ru = by_id
                    .get(&parent)
                    .ok_or(AnalysisErrors::UnknownReportingUnit(parent))?;
                chain.push(CompositionEdge {
                    child: *id,
                    parent,
                    depth: chain.len() as u32,
                });
                cur = parent_ru.parent;
            }
            ancestors.insert(*id, chain);
        }

        debug!("Hierarchy::new: {} reporting units", order.len());
        Ok(Hierarchy {
            units: by_id,
            order,
            ancestors,
        })
    }

    pub fn unit(&self, id: ReportingUnitId) -> Option<&ReportingUnit> {
        self.units.get(&id)
    }

    pub fn name(&self, id: ReportingUnitId) -> String {
        self.units
            .get(&id)
            .map(|ru| ru.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// The unit itself at depth 0, followed by its ancestors.
    pub fn ancestors(&self, id: ReportingUnitId) -> &[CompositionEdge] {
        self.ancestors.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// All the edges of the composition relation, self-edges included.
    pub fn edges(&self) -> impl Iterator<Item = &CompositionEdge> {
        self.order
            .iter()
            .flat_map(move |id| self.ancestors(*id).iter())
    }

    /// Returns all the units nested inside any of `parents`, the parents included.
    ///
    /// If `unit_type` is given, only the units of exactly that type are returned, and
    /// finding none of them is an error: it means the jurisdiction and the type do not
    /// go together.
    pub fn descendants(
        &self,
        parents: &[ReportingUnitId],
        unit_type: Option<&ReportingUnitType>,
    ) -> Result<BTreeSet<ReportingUnitId>, AnalysisErrors> {
        for p in parents.iter() {
            if !self.units.contains_key(p) {
                return Err(AnalysisErrors::UnknownReportingUnit(*p));
            }
        }
        let parents: HashSet<ReportingUnitId> = parents.iter().cloned().collect();
        let mut res: BTreeSet<ReportingUnitId> = self
            .edges()
            .filter(|e| parents.contains(&e.parent))
            .map(|e| e.child)
            .collect();

        if let Some(rut) = unit_type {
            res.retain(|id| self.units[id].unit_type == *rut);
            if res.is_empty() {
                let mut names: Vec<String> = parents.iter().map(|p| self.name(*p)).collect();
                names.sort();
                return Err(AnalysisErrors::NoMatchingSubunits {
                    jurisdiction: names.join(", "),
                    subdivision_type: rut.to_string(),
                });
            }
        }
        debug!(
            "descendants: {} units below {:?} (type filter {:?})",
            res.len(),
            parents,
            unit_type
        );
        Ok(res)
    }

    /// Joins each vote count with every ancestor of its reporting unit, itself
    /// included.
    pub fn compose(&self, counts: &[VoteCount]) -> Result<Vec<ObservationRow>, AnalysisErrors> {
        let mut rows: Vec<ObservationRow> = Vec::new();
        for vc in counts.iter() {
            let chain = self
                .ancestors
                .get(&vc.reporting_unit)
                .ok_or(AnalysisErrors::UnknownReportingUnit(vc.reporting_unit))?;
            for e in chain.iter() {
                rows.push(ObservationRow {
                    reporting_unit: vc.reporting_unit,
                    parent_reporting_unit: e.parent,
                    contest: vc.contest,
                    contest_name: vc.contest_name.clone(),
                    candidate: vc.candidate,
                    selection_name: vc.selection_name.clone(),
                    vote_category: vc.vote_category.clone(),
                    count: vc.count,
                });
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ru(id: u64, name: &str, t: ReportingUnitType, parent: Option<u64>) -> ReportingUnit {
        ReportingUnit {
            id: ReportingUnitId(id),
            name: name.to_string(),
            unit_type: t,
            parent: parent.map(ReportingUnitId),
        }
    }

    fn georgia() -> Hierarchy {
        Hierarchy::new(&[
            ru(1, "Georgia", ReportingUnitType::State, None),
            ru(2, "Fulton", ReportingUnitType::County, Some(1)),
            ru(3, "Cobb", ReportingUnitType::County, Some(1)),
            ru(4, "Fulton;P1", ReportingUnitType::Precinct, Some(2)),
            ru(5, "Fulton;P2", ReportingUnitType::Precinct, Some(2)),
            ru(6, "Cobb;P1", ReportingUnitType::Precinct, Some(3)),
            ru(
                7,
                "Cobb;Zone A",
                ReportingUnitType::Other("zone".to_string()),
                Some(3),
            ),
        ])
        .unwrap()
    }

    fn ids(v: &[u64]) -> BTreeSet<ReportingUnitId> {
        v.iter().map(|x| ReportingUnitId(*x)).collect()
    }

    #[test]
    fn self_edge_at_depth_zero() {
        let h = georgia();
        let chain = h.ancestors(ReportingUnitId(4));
        assert_eq!(
            chain.iter().map(|e| (e.parent.0, e.depth)).collect::<Vec<_>>(),
            vec![(4, 0), (2, 1), (1, 2)]
        );
        assert_eq!(h.edges().count(), 1 + 2 + 2 + 3 + 3 + 3 + 3);
    }

    #[test]
    fn descendants_are_self_inclusive() {
        let h = georgia();
        let res = h.descendants(&[ReportingUnitId(2)], None).unwrap();
        assert_eq!(res, ids(&[2, 4, 5]));
    }

    #[test]
    fn descendants_of_sibling_counties() {
        let h = georgia();
        let both = [ReportingUnitId(2), ReportingUnitId(3)];
        assert_eq!(h.descendants(&both, None).unwrap(), ids(&[2, 3, 4, 5, 6, 7]));
        assert_eq!(
            h.descendants(&both, Some(&ReportingUnitType::Precinct)).unwrap(),
            ids(&[4, 5, 6])
        );
        let err = h.descendants(&both, Some(&ReportingUnitType::Ward)).unwrap_err();
        assert_eq!(
            err,
            AnalysisErrors::NoMatchingSubunits {
                jurisdiction: "Cobb, Fulton".to_string(),
                subdivision_type: "ward".to_string(),
            }
        );
    }

    #[test]
    fn descendants_filtered_by_type() {
        let h = georgia();
        let res = h
            .descendants(&[ReportingUnitId(1)], Some(&ReportingUnitType::Precinct))
            .unwrap();
        assert_eq!(res, ids(&[4, 5, 6]));
        let res = h
            .descendants(
                &[ReportingUnitId(1)],
                Some(&ReportingUnitType::Other("zone".to_string())),
            )
            .unwrap();
        assert_eq!(res, ids(&[7]));
    }

    #[test]
    fn other_types_match_on_text() {
        let h = georgia();
        let res = h.descendants(
            &[ReportingUnitId(1)],
            Some(&ReportingUnitType::Other("district".to_string())),
        );
        assert!(matches!(
            res,
            Err(AnalysisErrors::NoMatchingSubunits { .. })
        ));
    }

    #[test]
    fn no_matching_subunits_names_jurisdiction() {
        let h = georgia();
        let err = h
            .descendants(&[ReportingUnitId(2)], Some(&ReportingUnitType::Ward))
            .unwrap_err();
        assert_eq!(
            err,
            AnalysisErrors::NoMatchingSubunits {
                jurisdiction: "Fulton".to_string(),
                subdivision_type: "ward".to_string(),
            }
        );
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "No reporting units of type ward nested inside Fulton"
        );
    }

    #[test]
    fn unknown_parent() {
        let res = Hierarchy::new(&[ru(2, "Fulton", ReportingUnitType::County, Some(1))]);
        assert_eq!(
            res.unwrap_err(),
            AnalysisErrors::UnknownReportingUnit(ReportingUnitId(1))
        );
    }

    #[test]
    fn cycles_are_rejected() {
        let res = Hierarchy::new(&[
            ru(1, "A", ReportingUnitType::County, Some(2)),
            ru(2, "B", ReportingUnitType::County, Some(1)),
        ]);
        assert!(matches!(res, Err(AnalysisErrors::InvalidHierarchy(_))));
    }

    #[test]
    fn compose_joins_every_ancestor() {
        let h = georgia();
        let vc = VoteCount {
            reporting_unit: ReportingUnitId(6),
            contest: ContestId(10),
            contest_name: "Governor".to_string(),
            candidate: CandidateId(100),
            selection_name: "Alice".to_string(),
            vote_category: VoteCategory::Total,
            count: 42,
        };
        let rows = h.compose(&[vc]).unwrap();
        let parents: Vec<u64> = rows.iter().map(|r| r.parent_reporting_unit.0).collect();
        assert_eq!(parents, vec![6, 3, 1]);
        assert!(rows.iter().all(|r| r.reporting_unit == ReportingUnitId(6)));
        assert!(rows.iter().all(|r| r.count == 42));
    }
}
