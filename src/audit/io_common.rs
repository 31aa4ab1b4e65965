use std::path::Path;

use anomaly_scoring::*;
use serde::{Deserialize, Serialize};

/// One reporting unit, as written in the input files.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct UnitRecord {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub unit_type: String,
    pub parent: Option<u64>,
}

impl UnitRecord {
    pub fn to_reporting_unit(&self) -> ReportingUnit {
        ReportingUnit {
            id: ReportingUnitId(self.id),
            name: self.name.clone(),
            unit_type: ReportingUnitType::from_label(&self.unit_type),
            parent: self.parent.map(ReportingUnitId),
        }
    }
}

/// One vote count, as written in the input files. The JSON snapshots use the
/// camelCase names.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CountRecord {
    #[serde(alias = "reportingUnit")]
    pub reporting_unit: u64,
    #[serde(alias = "contestId")]
    pub contest_id: u64,
    pub contest: String,
    #[serde(alias = "candidateId")]
    pub candidate_id: u64,
    pub selection: String,
    #[serde(alias = "countItemType")]
    pub count_item_type: String,
    pub count: u64,
}

impl CountRecord {
    pub fn to_vote_count(&self) -> VoteCount {
        VoteCount {
            reporting_unit: ReportingUnitId(self.reporting_unit),
            contest: ContestId(self.contest_id),
            contest_name: self.contest.clone(),
            candidate: CandidateId(self.candidate_id),
            selection_name: self.selection.clone(),
            vote_category: VoteCategory::from_label(&self.count_item_type),
            count: self.count,
        }
    }
}

/// The columns of a vote count file, in order.
pub const COUNT_COLUMNS: [&str; 7] = [
    "reporting_unit",
    "contest_id",
    "contest",
    "candidate_id",
    "selection",
    "count_item_type",
    "count",
];

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

/// Paths in a configuration file are relative to the directory of that file.
pub fn resolve_path(root: Option<&Path>, file: &str) -> String {
    match root {
        Some(r) if Path::new(file).is_relative() => r.join(file).to_string_lossy().to_string(),
        _ => file.to_string(),
    }
}
