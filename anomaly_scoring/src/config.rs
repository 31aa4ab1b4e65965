// ********* Identifiers ***********

use std::error::Error;
use std::fmt::Display;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct ReportingUnitId(pub u64);

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct ContestId(pub u64);

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct CandidateId(pub u64);

/// The ordinal of an analysis unit.
///
/// Only meaningful within the result set of a single call to
/// [`crate::run_anomaly_analysis`]. It is recomputed on every run.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct UnitId(pub u32);

impl Display for ReportingUnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ********* Enumerations **********

/// The type of a reporting unit.
///
/// The labels follow the NIST common data format. Anything else is kept as
/// free text under `Other`, and two `Other` types only match when their text matches.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub enum ReportingUnitType {
    Country,
    State,
    County,
    City,
    Town,
    Township,
    Municipality,
    Ward,
    Precinct,
    CombinedPrecinct,
    Congressional,
    StateHouse,
    StateSenate,
    Judicial,
    Other(String),
}

impl ReportingUnitType {
    pub fn from_label(label: &str) -> ReportingUnitType {
        match label.trim().to_lowercase().as_str() {
            "country" => ReportingUnitType::Country,
            "state" => ReportingUnitType::State,
            "county" => ReportingUnitType::County,
            "city" => ReportingUnitType::City,
            "town" => ReportingUnitType::Town,
            "township" => ReportingUnitType::Township,
            "municipality" => ReportingUnitType::Municipality,
            "ward" => ReportingUnitType::Ward,
            "precinct" => ReportingUnitType::Precinct,
            "combined-precinct" => ReportingUnitType::CombinedPrecinct,
            "congressional" => ReportingUnitType::Congressional,
            "state-house" => ReportingUnitType::StateHouse,
            "state-senate" => ReportingUnitType::StateSenate,
            "judicial" => ReportingUnitType::Judicial,
            _ => ReportingUnitType::Other(label.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ReportingUnitType::Country => "country",
            ReportingUnitType::State => "state",
            ReportingUnitType::County => "county",
            ReportingUnitType::City => "city",
            ReportingUnitType::Town => "town",
            ReportingUnitType::Township => "township",
            ReportingUnitType::Municipality => "municipality",
            ReportingUnitType::Ward => "ward",
            ReportingUnitType::Precinct => "precinct",
            ReportingUnitType::CombinedPrecinct => "combined-precinct",
            ReportingUnitType::Congressional => "congressional",
            ReportingUnitType::StateHouse => "state-house",
            ReportingUnitType::StateSenate => "state-senate",
            ReportingUnitType::Judicial => "judicial",
            ReportingUnitType::Other(s) => s.as_str(),
        }
    }
}

impl Display for ReportingUnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The method by which a count was cast (CountItemType in the common data format).
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub enum VoteCategory {
    Total,
    AbsenteeMail,
    AbsenteeInPerson,
    Early,
    ElectionDay,
    Provisional,
    Uocava,
    WriteIn,
    Other(String),
}

impl VoteCategory {
    pub fn from_label(label: &str) -> VoteCategory {
        match label.trim().to_lowercase().as_str() {
            "total" => VoteCategory::Total,
            "absentee-mail" => VoteCategory::AbsenteeMail,
            "absentee-in-person" => VoteCategory::AbsenteeInPerson,
            "early" => VoteCategory::Early,
            "election-day" => VoteCategory::ElectionDay,
            "provisional" => VoteCategory::Provisional,
            "uocava" => VoteCategory::Uocava,
            "write-in" => VoteCategory::WriteIn,
            _ => VoteCategory::Other(label.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            VoteCategory::Total => "total",
            VoteCategory::AbsenteeMail => "absentee-mail",
            VoteCategory::AbsenteeInPerson => "absentee-in-person",
            VoteCategory::Early => "early",
            VoteCategory::ElectionDay => "election-day",
            VoteCategory::Provisional => "provisional",
            VoteCategory::Uocava => "uocava",
            VoteCategory::WriteIn => "write-in",
            VoteCategory::Other(s) => s.as_str(),
        }
    }
}

impl Display for VoteCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ********* Input data structures ***********

/// A geographic or administrative unit at which votes are tallied.
///
/// `parent` is `None` only for the root of the hierarchy.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReportingUnit {
    pub id: ReportingUnitId,
    pub name: String,
    pub unit_type: ReportingUnitType,
    pub parent: Option<ReportingUnitId>,
}

/// One vote count, as produced by the ingestion layer. Never mutated here.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteCount {
    pub reporting_unit: ReportingUnitId,
    pub contest: ContestId,
    pub contest_name: String,
    pub candidate: CandidateId,
    pub selection_name: String,
    pub vote_category: VoteCategory,
    pub count: u64,
}

/// A vote count joined with one of the ancestors (or the unit itself) of its
/// reporting unit. Summing these rows by parent is the roll-up.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ObservationRow {
    pub reporting_unit: ReportingUnitId,
    pub parent_reporting_unit: ReportingUnitId,
    pub contest: ContestId,
    pub contest_name: String,
    pub candidate: CandidateId,
    pub selection_name: String,
    pub vote_category: VoteCategory,
    pub count: u64,
}

/// What to analyze.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AnalysisRequest {
    /// Display name of the election, passed through to the reports.
    pub election: String,
    pub jurisdiction: ReportingUnitId,
    /// If set, only reporting units of this type beneath the jurisdiction are compared.
    pub subdivision_type: Option<ReportingUnitType>,
    /// If set, only this contest is analyzed.
    pub contest: Option<ContestId>,
}

// ******** Output data structures *********

/// Why a votes-at-stake value could not be computed.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum StakeFailure {
    /// No rows on the same side of the distribution as the anomalous pair.
    MissingNextPair,
    /// The next-anomalous pair has no votes at all.
    ZeroNextTotal,
    /// A candidate of the pair has no row in the anomalous or next-anomalous pair.
    MissingCandidate(CandidateId),
    /// The margin divisor or the result is not a finite positive number.
    NonFinite,
}

/// The outcome of the votes-at-stake estimation for one analysis unit.
///
/// A genuine zero is `Computed(0.0)`. The two other states report a zero through
/// [`VotesAtStake::value`] but stay distinguishable for downstream consumers.
#[derive(PartialEq, Debug, Clone)]
pub enum VotesAtStake {
    Computed(f64),
    /// Two scored rows or fewer.
    InsufficientData,
    ComputationFailed(StakeFailure),
}

impl VotesAtStake {
    pub fn value(&self) -> f64 {
        match self {
            VotesAtStake::Computed(v) => *v,
            _ => 0.0,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            VotesAtStake::Computed(_) => "computed",
            VotesAtStake::InsufficientData => "insufficientData",
            VotesAtStake::ComputationFailed(_) => "computationFailed",
        }
    }
}

/// The vote counts of one reporting unit, for display.
#[derive(PartialEq, Debug, Clone)]
pub struct ReportedCount {
    pub reporting_unit: ReportingUnitId,
    pub name: String,
    /// Votes for the first candidate of the pair.
    pub x: u64,
    /// Votes for the second candidate of the pair.
    pub y: u64,
    pub score: f64,
}

/// One noteworthy analysis unit, ready for a grouped bar chart.
#[derive(PartialEq, Debug, Clone)]
pub struct AnomalyReport {
    pub unit_id: UnitId,
    pub election: String,
    pub jurisdiction: String,
    pub contest: String,
    pub subdivision_type: ReportingUnitType,
    pub vote_category: VoteCategory,
    /// Display names of the representative candidate pair.
    pub candidates: (String, String),
    /// The signed score of the most anomalous reporting unit.
    pub score: f64,
    pub votes_at_stake: VotesAtStake,
    pub max_votes_at_stake: f64,
    /// The divisor applied to the votes at stake.
    pub margin: f64,
    pub anomalous_units: Vec<ReportingUnitId>,
    /// Display names of `anomalous_units`, in the same order.
    pub anomalous_unit_names: Vec<String>,
    pub counts: Vec<ReportedCount>,
}

/// Errors that prevent the analysis from completing.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AnalysisErrors {
    /// The jurisdiction has no reporting unit of the requested type beneath it.
    NoMatchingSubunits {
        jurisdiction: String,
        subdivision_type: String,
    },
    UnknownReportingUnit(ReportingUnitId),
    InvalidHierarchy(String),
    /// The observation source failed. Safe to retry.
    Fetch(String),
    /// The inputs could be read but are malformed. Retrying will not help.
    InvalidInput(String),
    /// The deadline passed before the analysis completed. Safe to retry.
    TimedOut,
    Cancelled,
    InvalidRules(String),
}

impl AnalysisErrors {
    /// True for transient, request-level failures.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalysisErrors::Fetch(_) | AnalysisErrors::TimedOut)
    }
}

impl Error for AnalysisErrors {}

impl Display for AnalysisErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisErrors::NoMatchingSubunits {
                jurisdiction,
                subdivision_type,
            } => write!(
                f,
                "No reporting units of type {} nested inside {}",
                subdivision_type, jurisdiction
            ),
            AnalysisErrors::UnknownReportingUnit(id) => {
                write!(f, "Unknown reporting unit {}", id)
            }
            AnalysisErrors::InvalidHierarchy(msg) => {
                write!(f, "Invalid reporting unit hierarchy: {}", msg)
            }
            AnalysisErrors::Fetch(msg) => write!(f, "Could not fetch vote counts: {}", msg),
            AnalysisErrors::InvalidInput(msg) => write!(f, "Invalid vote count input: {}", msg),
            AnalysisErrors::TimedOut => write!(f, "Analysis timed out"),
            AnalysisErrors::Cancelled => write!(f, "Analysis cancelled"),
            AnalysisErrors::InvalidRules(msg) => write!(f, "Invalid analysis rules: {}", msg),
        }
    }
}

// ********* Configuration **********

// These values are heuristics carried over from the first analyses of
// state results. None of them has been validated by a statistician.

/// Policy values of the pipeline.
#[derive(PartialEq, Debug, Clone)]
pub struct AnalysisRules {
    /// Reporting units whose two-candidate total is at or below this value are dropped.
    pub noise_floor: u64,
    /// Analysis units with fewer reporting units above the noise floor are not scored.
    pub min_reporting_units: usize,
    /// Number of distinct votes-at-stake values to report.
    pub top_n: usize,
    /// Maximum number of reporting units shown for each reported analysis unit.
    pub display_cap: usize,
    /// Divides the votes at stake. The normalisation by the contest margin is not
    /// defined yet, so this stays at 1 unless a caller has a better value.
    pub margin_divisor: f64,
}

impl AnalysisRules {
    pub const DEFAULT_RULES: AnalysisRules = AnalysisRules {
        noise_floor: 100,
        min_reporting_units: 5,
        top_n: 3,
        display_cap: 8,
        margin_divisor: 1.0,
    };

    pub fn validate(&self) -> Result<(), AnalysisErrors> {
        if !(self.margin_divisor.is_finite() && self.margin_divisor > 0.0) {
            return Err(AnalysisErrors::InvalidRules(format!(
                "margin divisor must be a positive number, got {}",
                self.margin_divisor
            )));
        }
        if self.min_reporting_units == 0 {
            return Err(AnalysisErrors::InvalidRules(
                "the minimum number of reporting units must be positive".to_string(),
            ));
        }
        if self.top_n == 0 || self.display_cap == 0 {
            return Err(AnalysisErrors::InvalidRules(
                "top N and the display cap must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AnalysisRules {
    fn default() -> Self {
        AnalysisRules::DEFAULT_RULES
    }
}
