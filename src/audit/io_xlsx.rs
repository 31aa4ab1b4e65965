// Vote counts stored in Excel spreadsheets.

use std::collections::HashMap;

use calamine::{open_workbook, DataType, Range, Reader, Xlsx};

use crate::audit::io_common::{simplify_file_name, CountRecord, COUNT_COLUMNS};
use crate::audit::*;

fn get_range(path: &str, worksheet_name_o: Option<&str>) -> AuditResult<Range<DataType>> {
    debug!(
        "read_excel_file: path: {:?} worksheet: {:?}",
        path, worksheet_name_o
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    if let Some(worksheet) = worksheet_name_o {
        let wrange = workbook
            .worksheet_range(worksheet)
            .context(MissingWorksheetSnafu { path, worksheet })?
            .context(OpeningExcelSnafu { path })?;
        return Ok(wrange);
    }

    let all_worksheets = workbook.worksheets();
    match all_worksheets.as_slice() {
        [(worksheet_name, wrange)] => {
            debug!(
                "read_excel_file: path: {:?} worksheet: {:?}",
                path, worksheet_name
            );
            Ok(wrange.clone())
        }
        _ => AmbiguousWorksheetSnafu {
            path,
            count: all_worksheets.len(),
        }
        .fail(),
    }
}

fn cell_string(v: &DataType) -> Option<String> {
    match v {
        DataType::String(s) => Some(s.trim().to_string()),
        DataType::Int(i) => Some(i.to_string()),
        DataType::Float(f) => Some(f.to_string()),
        _ => None,
    }
}

fn cell_u64(v: &DataType) -> Option<u64> {
    match v {
        DataType::Int(i) if *i >= 0 => Some(*i as u64),
        DataType::Float(f) if *f >= 0.0 && f.fract() == 0.0 => Some(*f as u64),
        DataType::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

// Finds the position of every expected column in the header.
fn column_positions(path: &str, header: &[DataType]) -> AuditResult<HashMap<&'static str, usize>> {
    let names: Vec<Option<String>> = header.iter().map(cell_string).collect();
    let mut res: HashMap<&'static str, usize> = HashMap::new();
    for col in COUNT_COLUMNS.iter() {
        let idx = names
            .iter()
            .position(|n| n.as_deref() == Some(*col))
            .context(MissingColumnSnafu {
                path: simplify_file_name(path),
                column: *col,
            })?;
        res.insert(*col, idx);
    }
    Ok(res)
}

pub fn read_excel_counts(
    path: &str,
    worksheet_name_o: Option<&str>,
    control: &FetchControl,
) -> AuditResult<Vec<VoteCount>> {
    let wrange = get_range(path, worksheet_name_o)?;
    let mut rows = wrange.rows();
    let header = rows.next().context(EmptyExcelSnafu { path })?;
    let positions = column_positions(path, header)?;

    let empty = DataType::Empty;
    let mut res: Vec<VoteCount> = Vec::new();
    for (idx, row) in rows.enumerate() {
        // The header is the first row, and rows start at 1.
        let lineno = idx + 2;
        if idx % CHECKPOINT_ROWS == 0 {
            control.checkpoint().context(AnalysisSnafu {})?;
        }
        if row.iter().all(|c| matches!(c, DataType::Empty)) {
            continue;
        }
        let cell = |col: &str| {
            positions
                .get(col)
                .and_then(|i| row.get(*i))
                .unwrap_or(&empty)
        };
        let wrong_cell = |col: &'static str| ExcelWrongCellTypeSnafu {
            path: simplify_file_name(path),
            lineno,
            column: col,
            value: format!("{:?}", cell(col)),
        };
        let record = CountRecord {
            reporting_unit: cell_u64(cell("reporting_unit")).context(wrong_cell("reporting_unit"))?,
            contest_id: cell_u64(cell("contest_id")).context(wrong_cell("contest_id"))?,
            contest: cell_string(cell("contest")).context(wrong_cell("contest"))?,
            candidate_id: cell_u64(cell("candidate_id")).context(wrong_cell("candidate_id"))?,
            selection: cell_string(cell("selection")).context(wrong_cell("selection"))?,
            count_item_type: cell_string(cell("count_item_type"))
                .context(wrong_cell("count_item_type"))?,
            count: cell_u64(cell("count")).context(wrong_cell("count"))?,
        };
        res.push(record.to_vote_count());
    }
    debug!("read_excel_counts: {:?}: {} vote counts", path, res.len());
    Ok(res)
}
