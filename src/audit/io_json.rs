// Complete snapshots of reporting units and vote counts, in JSON.

use serde::{Deserialize, Serialize};

use crate::audit::io_common::{CountRecord, UnitRecord};
use crate::audit::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct JsonSnapshot {
    pub election: Option<String>,
    #[serde(rename = "reportingUnits", default)]
    pub reporting_units: Vec<UnitRecord>,
    #[serde(rename = "voteCounts", default)]
    pub vote_counts: Vec<CountRecord>,
}

pub fn read_json_snapshot(path: &str, control: &FetchControl) -> AuditResult<Snapshot> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    control.checkpoint().context(AnalysisSnafu {})?;
    let js: JsonSnapshot = serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    debug!(
        "read_json_snapshot: {:?}: {} reporting units, {} vote counts",
        path,
        js.reporting_units.len(),
        js.vote_counts.len()
    );
    Ok(Snapshot {
        reporting_units: js
            .reporting_units
            .iter()
            .map(|r| r.to_reporting_unit())
            .collect(),
        vote_counts: js.vote_counts.iter().map(|r| r.to_vote_count()).collect(),
    })
}

/// The name of the election recorded in a snapshot, if any.
pub fn read_election_name(path: &str) -> AuditResult<Option<String>> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JsonSnapshot = serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    Ok(js.election)
}
