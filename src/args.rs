use clap::Parser;

/// Flags the reporting units whose vote splits deviate from comparable units, and
/// estimates the votes at stake.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON configuration of the analysis. It lists the input files,
    /// the jurisdiction and the rules. See the manual of anomaly_scoring for the format.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path, optional) A JSON snapshot of reporting units and vote counts. Setting this
    /// option replaces the input files listed in the configuration.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (reporting unit id) The jurisdiction to analyze. Overrides outputSettings.jurisdiction.
    #[clap(short, long, value_parser)]
    pub jurisdiction: Option<u64>,

    /// (county, precinct, ward, ... or any other type label) Only compare the reporting units
    /// of this type beneath the jurisdiction.
    #[clap(long, value_parser)]
    pub subdivision_type: Option<String>,

    /// (contest id) Only analyze this contest.
    #[clap(long, value_parser)]
    pub contest: Option<u64>,

    /// (default 3) The number of distinct votes-at-stake values to report.
    #[clap(long, value_parser)]
    pub top_n: Option<usize>,

    /// (seconds) Abort the analysis if it takes longer than this.
    #[clap(long, value_parser)]
    pub timeout: Option<u64>,

    /// (file path, 'stdout' or empty) If specified, the summary of the analysis will be written in JSON format to the given
    /// location. Setting this option overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file containing the summary of an analysis in JSON format. If provided, electanom will
    /// check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
