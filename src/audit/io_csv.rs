// Primitives for reading CSV files.

use std::fs::File;

use csv::DeserializeRecordsIntoIter;
use serde::de::DeserializeOwned;

use crate::audit::io_common::{simplify_file_name, CountRecord, UnitRecord};
use crate::audit::*;

fn get_records<T: DeserializeOwned>(path: &str) -> AuditResult<DeserializeRecordsIntoIter<File, T>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    Ok(rdr.into_deserialize())
}

fn read_all<T: DeserializeOwned + std::fmt::Debug>(
    path: &str,
    control: &FetchControl,
) -> AuditResult<Vec<T>> {
    let mut res: Vec<T> = Vec::new();
    for (idx, line_r) in get_records::<T>(path)?.enumerate() {
        // The header is the first line.
        let lineno = idx + 2;
        if idx % CHECKPOINT_ROWS == 0 {
            control.checkpoint().context(AnalysisSnafu {})?;
        }
        let line = line_r.with_context(|_| CsvLineParseSnafu {
            path: simplify_file_name(path),
            lineno,
        })?;
        res.push(line);
    }
    debug!("read_csv: {:?}: {} records", path, res.len());
    Ok(res)
}

pub fn read_reporting_units(path: &str, control: &FetchControl) -> AuditResult<Vec<ReportingUnit>> {
    let records: Vec<UnitRecord> = read_all(path, control)?;
    Ok(records.iter().map(|r| r.to_reporting_unit()).collect())
}

pub fn read_vote_counts(path: &str, control: &FetchControl) -> AuditResult<Vec<VoteCount>> {
    let records: Vec<CountRecord> = read_all(path, control)?;
    Ok(records.iter().map(|r| r.to_vote_count()).collect())
}
