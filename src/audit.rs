use log::{debug, info, warn};

use anomaly_scoring::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::audit::config_reader::*;

mod config_reader;
mod io_common;
mod io_csv;
mod io_json;
mod io_xlsx;

/// How many rows are read between two checks of the deadline.
const CHECKPOINT_ROWS: usize = 1000;

#[derive(Debug, Snafu)]
pub enum AuditError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing the summary"))]
    WritingJson { source: serde_json::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Excel file {path} is empty"))]
    EmptyExcel { path: String },
    #[snafu(display("No worksheet named {worksheet} in {path}"))]
    MissingWorksheet { path: String, worksheet: String },
    #[snafu(display("Excel file {path} has {count} worksheets, the worksheet name must be provided"))]
    AmbiguousWorksheet { path: String, count: usize },
    #[snafu(display("Missing column {column} in {path}"))]
    MissingColumn { path: String, column: String },
    #[snafu(display("Unexpected value {value} in {path}, line {lineno}, column {column}"))]
    ExcelWrongCellType {
        path: String,
        lineno: usize,
        column: String,
        value: String,
    },
    #[snafu(display("Unknown provider {provider} for {path}"))]
    UnknownProvider { provider: String, path: String },
    #[snafu(display("{source}"))]
    Analysis { source: AnalysisErrors },
    #[snafu(display("Difference detected between calculated summary and reference summary"))]
    ReferenceMismatch {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AuditResult<T> = Result<T, AuditError>;

// ******** Settings *********

/// The configuration file and the command line, merged.
#[derive(PartialEq, Debug, Clone)]
struct AuditSettings {
    request: AnalysisRequest,
    rules: AnalysisRules,
    reporting_units_file: Option<String>,
    sources: Vec<VoteCountSource>,
    timeout: Option<Duration>,
    output_file: Option<String>,
}

fn build_settings(args: &Args) -> AuditResult<AuditSettings> {
    let (config, root) = match &args.config {
        Some(p) => {
            let c = read_config(p)?;
            (Some(c), Path::new(p).parent().map(|r| r.to_path_buf()))
        }
        None => (None, None),
    };
    let root = root.as_deref();

    let output_settings = config.as_ref().map(|c| c.output_settings.clone());
    let mut sources: Vec<VoteCountSource> = config
        .as_ref()
        .map(|c| c.vote_count_sources.clone())
        .unwrap_or_default()
        .into_iter()
        .map(|s| VoteCountSource {
            file_path: io_common::resolve_path(root, &s.file_path),
            ..s
        })
        .collect();
    let mut reporting_units_file = config
        .as_ref()
        .and_then(|c| c.reporting_units_file.clone())
        .map(|f| io_common::resolve_path(root, &f));

    // A snapshot given on the command line replaces the inputs of the configuration.
    if let Some(input) = &args.input {
        sources = vec![VoteCountSource {
            provider: "json".to_string(),
            file_path: input.clone(),
            excel_worksheet_name: None,
        }];
        reporting_units_file = None;
    }
    if sources.is_empty() {
        whatever!("No input: provide a configuration file with vote count sources, or --input");
    }

    let jurisdiction = match args
        .jurisdiction
        .or_else(|| output_settings.as_ref().and_then(|o| o.jurisdiction))
    {
        Some(j) => ReportingUnitId(j),
        None => whatever!("No jurisdiction: set outputSettings.jurisdiction or --jurisdiction"),
    };

    let subdivision_type = args
        .subdivision_type
        .clone()
        .or_else(|| output_settings.as_ref().and_then(|o| o.subdivision_type.clone()))
        .map(|s| ReportingUnitType::from_label(&s));

    let contest = args
        .contest
        .or_else(|| output_settings.as_ref().and_then(|o| o.contest))
        .map(ContestId);

    let mut election = output_settings.as_ref().and_then(|o| o.election_name.clone());
    if election.is_none() {
        for s in sources.iter().filter(|s| s.provider == "json") {
            if let Some(e) = io_json::read_election_name(&s.file_path)? {
                election = Some(e);
                break;
            }
        }
    }

    let mut rules = config
        .as_ref()
        .and_then(|c| c.rules.clone())
        .unwrap_or_default()
        .to_rules();
    if let Some(n) = args.top_n {
        rules.top_n = n;
    }

    let timeout = args
        .timeout
        .or_else(|| config.as_ref().and_then(|c| c.fetch_timeout_seconds))
        .map(Duration::from_secs);

    let output_file = args
        .out
        .clone()
        .or_else(|| output_settings.as_ref().and_then(|o| o.output_file.clone()))
        .map(|f| match args.out {
            Some(_) => f,
            None => io_common::resolve_path(root, &f),
        });

    Ok(AuditSettings {
        request: AnalysisRequest {
            election: election.unwrap_or_default(),
            jurisdiction,
            subdivision_type,
            contest,
        },
        rules,
        reporting_units_file,
        sources,
        timeout,
        output_file,
    })
}

// ******** Observation source *********

/// Reads the reporting units and the vote counts from files when fetched.
struct FileSource {
    reporting_units_file: Option<String>,
    sources: Vec<VoteCountSource>,
}

impl FileSource {
    fn read(&self, control: &FetchControl) -> AuditResult<Snapshot> {
        let mut snapshot = Snapshot::default();
        if let Some(p) = &self.reporting_units_file {
            snapshot.reporting_units = io_csv::read_reporting_units(p, control)?;
        }
        for s in self.sources.iter() {
            info!("Reading {} file {}", s.provider, s.file_path);
            match s.provider.as_str() {
                "csv" => {
                    let mut counts = io_csv::read_vote_counts(&s.file_path, control)?;
                    snapshot.vote_counts.append(&mut counts);
                }
                "xlsx" => {
                    let mut counts = io_xlsx::read_excel_counts(
                        &s.file_path,
                        s.excel_worksheet_name.as_deref(),
                        control,
                    )?;
                    snapshot.vote_counts.append(&mut counts);
                }
                "json" => {
                    let mut snap = io_json::read_json_snapshot(&s.file_path, control)?;
                    snapshot.reporting_units.append(&mut snap.reporting_units);
                    snapshot.vote_counts.append(&mut snap.vote_counts);
                }
                _ => {
                    return UnknownProviderSnafu {
                        provider: s.provider.clone(),
                        path: s.file_path.clone(),
                    }
                    .fail()
                }
            }
        }
        Ok(snapshot)
    }
}

impl ObservationSource for FileSource {
    fn fetch(
        &self,
        _request: &AnalysisRequest,
        control: &FetchControl,
    ) -> Result<Snapshot, AnalysisErrors> {
        self.read(control).map_err(|e| match e {
            AuditError::Analysis { source } => source,
            e @ (AuditError::CsvLineParse { .. }
            | AuditError::ParsingJson { .. }
            | AuditError::EmptyExcel { .. }
            | AuditError::MissingWorksheet { .. }
            | AuditError::AmbiguousWorksheet { .. }
            | AuditError::MissingColumn { .. }
            | AuditError::ExcelWrongCellType { .. }
            | AuditError::UnknownProvider { .. }) => AnalysisErrors::InvalidInput(e.to_string()),
            e => AnalysisErrors::Fetch(e.to_string()),
        })
    }
}

// ******** Summary *********

fn report_to_json(r: &AnomalyReport) -> JSValue {
    let counts: Vec<JSValue> = r
        .counts
        .iter()
        .map(|c| {
            json!({
                "reportingUnit": c.name,
                "x": c.x,
                "y": c.y,
                "score": format!("{:.4}", c.score),
            })
        })
        .collect();
    let mut js = json!({
        "unitId": r.unit_id.0,
        "election": r.election,
        "jurisdiction": r.jurisdiction,
        "contest": r.contest,
        "subdivisionType": r.subdivision_type.label(),
        "voteCategory": r.vote_category.label(),
        "candidates": [r.candidates.0, r.candidates.1],
        "score": format!("{:.4}", r.score),
        "votesAtStake": format!("{:.2}", r.votes_at_stake.value()),
        "votesAtStakeStatus": r.votes_at_stake.status(),
        "maxVotesAtStake": format!("{:.2}", r.max_votes_at_stake),
        "margin": format!("{:.2}", r.margin),
        "anomalousUnits": r.anomalous_unit_names,
        "counts": counts,
    });
    if let VotesAtStake::ComputationFailed(f) = &r.votes_at_stake {
        js["votesAtStakeFailure"] = json!(format!("{:?}", f));
    }
    js
}

fn build_summary_js(settings: &AuditSettings, reports: &[AnomalyReport]) -> JSValue {
    let rules = &settings.rules;
    json!({
        "config": {
            "election": settings.request.election,
            "jurisdiction": settings.request.jurisdiction.0,
            "subdivisionType": settings.request.subdivision_type.as_ref().map(|t| t.label().to_string()),
            "contest": settings.request.contest.map(|c| c.0),
            "rules": {
                "noiseFloor": rules.noise_floor,
                "minReportingUnits": rules.min_reporting_units,
                "topN": rules.top_n,
                "displayCap": rules.display_cap,
                "marginDivisor": format!("{:.2}", rules.margin_divisor),
            },
        },
        "results": reports.iter().map(report_to_json).collect::<Vec<JSValue>>(),
    })
}

// ******** Driver *********

fn write_summary(pretty_js: &str, output_file: &Option<String>) -> AuditResult<()> {
    match output_file.as_deref() {
        None | Some("stdout") => {
            println!("{}", pretty_js);
        }
        Some("") => {
            debug!("write_summary: no output requested");
        }
        Some(p) => {
            fs::write(p, pretty_js).context(WritingOutputSnafu { path: p })?;
            info!("Summary written to {}", p);
        }
    }
    Ok(())
}

fn check_reference(pretty_js_stats: &str, reference_path: &str) -> AuditResult<()> {
    let summary_ref = read_summary(reference_path)?;
    let pretty_js_summary_ref =
        serde_json::to_string_pretty(&summary_ref).context(WritingJsonSnafu {})?;
    if pretty_js_summary_ref != pretty_js_stats {
        warn!("Found differences with the reference summary");
        print_diff(pretty_js_summary_ref.as_str(), pretty_js_stats, "\n");
        return ReferenceMismatchSnafu {}.fail();
    }
    Ok(())
}

/// Runs the analysis and returns the summary.
fn compute_summary(args: &Args) -> AuditResult<(AuditSettings, JSValue)> {
    let settings = build_settings(args)?;
    info!("settings: {:?}", settings);

    let control = match settings.timeout {
        Some(t) => FetchControl::with_timeout(t),
        None => FetchControl::unbounded(),
    };
    let source = FileSource {
        reporting_units_file: settings.reporting_units_file.clone(),
        sources: settings.sources.clone(),
    };

    let reports = run_anomaly_analysis(&source, &settings.request, &settings.rules, &control)
        .context(AnalysisSnafu {})?;
    for r in reports.iter() {
        debug!("report: {:?}", r);
    }
    let summary = build_summary_js(&settings, &reports);
    Ok((settings, summary))
}

pub fn run_audit(args: &Args) -> AuditResult<()> {
    let (settings, result_js) = compute_summary(args)?;
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(WritingJsonSnafu {})?;
    write_summary(&pretty_js_stats, &settings.output_file)?;

    // The reference summary, if provided for comparison
    if let Some(reference_path) = &args.reference {
        check_reference(&pretty_js_stats, reference_path)?;
    }
    Ok(())
}
