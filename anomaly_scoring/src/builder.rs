pub use crate::config::*;
use crate::source::{InMemorySource, Snapshot};

/// A builder for assembling reporting units and vote counts in code.
///
/// Names are resolved to ids as they are added, so counts can only refer to
/// reporting units and contests declared before them.
///
/// ```
/// pub use anomaly_scoring::builder::Builder;
/// pub use anomaly_scoring::ReportingUnitType;
/// # use anomaly_scoring::AnalysisErrors;
///
/// let mut builder = Builder::new();
/// let state = builder.reporting_unit("Georgia", ReportingUnitType::State, None)?;
/// let county = builder.reporting_unit("Fulton", ReportingUnitType::County, Some(state))?;
/// let contest = builder.contest("Governor");
///
/// builder.add_count_simple(county, contest, "Anna", 1200)?;
/// builder.add_count_simple(county, contest, "Bob", 800)?;
///
/// let source = builder.build_source();
///
/// # Ok::<(), AnalysisErrors>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Builder {
    pub(crate) _units: Vec<ReportingUnit>,
    pub(crate) _contests: Vec<(ContestId, String)>,
    pub(crate) _candidates: Vec<(ContestId, CandidateId, String)>,
    pub(crate) _counts: Vec<VoteCount>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Declares a reporting unit. Its id is the order of declaration, starting at 1.
    pub fn reporting_unit(
        &mut self,
        name: &str,
        unit_type: ReportingUnitType,
        parent: Option<ReportingUnitId>,
    ) -> Result<ReportingUnitId, AnalysisErrors> {
        if let Some(p) = parent {
            if !self._units.iter().any(|ru| ru.id == p) {
                return Err(AnalysisErrors::UnknownReportingUnit(p));
            }
        }
        let id = ReportingUnitId(self._units.len() as u64 + 1);
        self._units.push(ReportingUnit {
            id,
            name: name.to_string(),
            unit_type,
            parent,
        });
        Ok(id)
    }

    pub fn contest(&mut self, name: &str) -> ContestId {
        if let Some((cid, _)) = self._contests.iter().find(|(_, n)| n == name) {
            return *cid;
        }
        let cid = ContestId(self._contests.len() as u64 + 1);
        self._contests.push((cid, name.to_string()));
        cid
    }

    // Candidates are numbered across all the contests.
    fn candidate(&mut self, contest: ContestId, name: &str) -> CandidateId {
        if let Some((_, cid, _)) = self
            ._candidates
            .iter()
            .find(|(c, _, n)| *c == contest && n == name)
        {
            return *cid;
        }
        let cid = CandidateId(self._candidates.len() as u64 + 1);
        self._candidates.push((contest, cid, name.to_string()));
        cid
    }

    /// Adds the total count of a selection in a reporting unit.
    pub fn add_count_simple(
        &mut self,
        reporting_unit: ReportingUnitId,
        contest: ContestId,
        selection: &str,
        count: u64,
    ) -> Result<(), AnalysisErrors> {
        self.add_count(reporting_unit, contest, selection, VoteCategory::Total, count)
    }

    /// Adds a count for one vote category.
    pub fn add_count(
        &mut self,
        reporting_unit: ReportingUnitId,
        contest: ContestId,
        selection: &str,
        vote_category: VoteCategory,
        count: u64,
    ) -> Result<(), AnalysisErrors> {
        if !self._units.iter().any(|ru| ru.id == reporting_unit) {
            return Err(AnalysisErrors::UnknownReportingUnit(reporting_unit));
        }
        let contest_name = self
            ._contests
            .iter()
            .find(|(cid, _)| *cid == contest)
            .map(|(_, n)| n.clone())
            .ok_or_else(|| {
                AnalysisErrors::InvalidHierarchy(format!("contest {} is not declared", contest.0))
            })?;
        let candidate = self.candidate(contest, selection);
        self._counts.push(VoteCount {
            reporting_unit,
            contest,
            contest_name,
            candidate,
            selection_name: selection.to_string(),
            vote_category,
            count,
        });
        Ok(())
    }

    pub fn build_snapshot(&self) -> Snapshot {
        Snapshot {
            reporting_units: self._units.clone(),
            vote_counts: self._counts.clone(),
        }
    }

    pub fn build_source(&self) -> InMemorySource {
        InMemorySource::new(self.build_snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_declaration() {
        let mut b = Builder::new();
        let s = b.reporting_unit("S", ReportingUnitType::State, None).unwrap();
        let c = b
            .reporting_unit("C", ReportingUnitType::County, Some(s))
            .unwrap();
        assert_eq!((s, c), (ReportingUnitId(1), ReportingUnitId(2)));
        let g = b.contest("Governor");
        assert_eq!(b.contest("Governor"), g);
        b.add_count_simple(c, g, "Anna", 3).unwrap();
        b.add_count(c, g, "Anna", VoteCategory::Early, 1).unwrap();
        b.add_count_simple(c, g, "Bob", 2).unwrap();
        let snap = b.build_snapshot();
        let cands: Vec<u64> = snap.vote_counts.iter().map(|vc| vc.candidate.0).collect();
        assert_eq!(cands, vec![1, 1, 2]);
        assert_eq!(snap.vote_counts[0].contest_name, "Governor");
    }

    #[test]
    fn unknown_references() {
        let mut b = Builder::new();
        assert_eq!(
            b.reporting_unit("C", ReportingUnitType::County, Some(ReportingUnitId(4))),
            Err(AnalysisErrors::UnknownReportingUnit(ReportingUnitId(4)))
        );
        let s = b.reporting_unit("S", ReportingUnitType::State, None).unwrap();
        assert!(b.add_count_simple(s, ContestId(9), "Anna", 1).is_err());
    }
}
