use crate::audit::*;

use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "electionName")]
    pub election_name: Option<String>,
    pub jurisdiction: Option<u64>,
    #[serde(rename = "subdivisionType")]
    pub subdivision_type: Option<String>,
    pub contest: Option<u64>,
    #[serde(rename = "outputFile")]
    pub output_file: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VoteCountSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(rename = "noiseFloor")]
    pub noise_floor: Option<u64>,
    #[serde(rename = "minReportingUnits")]
    pub min_reporting_units: Option<usize>,
    #[serde(rename = "topN")]
    pub top_n: Option<usize>,
    #[serde(rename = "displayCap")]
    pub display_cap: Option<usize>,
    #[serde(rename = "marginDivisor")]
    pub margin_divisor: Option<f64>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    #[serde(rename = "reportingUnitsFile")]
    pub reporting_units_file: Option<String>,
    #[serde(rename = "voteCountSources")]
    pub vote_count_sources: Vec<VoteCountSource>,
    pub rules: Option<RulesConfig>,
    #[serde(rename = "fetchTimeoutSeconds")]
    pub fetch_timeout_seconds: Option<u64>,
}

impl RulesConfig {
    pub fn to_rules(&self) -> AnalysisRules {
        let d = AnalysisRules::DEFAULT_RULES;
        AnalysisRules {
            noise_floor: self.noise_floor.unwrap_or(d.noise_floor),
            min_reporting_units: self.min_reporting_units.unwrap_or(d.min_reporting_units),
            top_n: self.top_n.unwrap_or(d.top_n),
            display_cap: self.display_cap.unwrap_or(d.display_cap),
            margin_divisor: self.margin_divisor.unwrap_or(d.margin_divisor),
        }
    }
}

pub fn read_config(path: &str) -> AuditResult<AuditConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: AuditConfig =
        serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

pub fn read_summary(path: &str) -> AuditResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(js)
}
