use clap::{Parser, Subcommand};

/// Explorer of precinct election results: turnout, vote shares and margins,
/// filtered by county and legislative districts.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, global = true, takes_value = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Loads the data, applies a selection and prints the resulting view in JSON format.
    View {
        #[clap(flatten)]
        sources: SourceArgs,
        #[clap(flatten)]
        selection: SelectionArgs,

        /// (file path, 'stdout' or empty) Where to write the view. Defaults to the standard output.
        #[clap(short, long, value_parser)]
        out: Option<String>,

        /// (file path) A reference view in JSON format. If provided, the computed view must match it.
        #[clap(short, long, value_parser)]
        reference: Option<String>,

        /// If passed as an argument, the fill color of every precinct is included in the view.
        #[clap(long, takes_value = false)]
        colors: bool,
    },
    /// Converts a wide raw results file (CSV or Excel) into a tall results file.
    Melt {
        /// (file path) The raw results file, with the VTDID, COUNTYNAME, PCTNAME, REG7AM and
        /// TOTVOTING columns and one column per office and party.
        #[clap(short, long, value_parser)]
        input: String,

        /// The election year of the raw file.
        #[clap(short, long, value_parser)]
        year: u32,

        /// (file path) Where to write the tall results file.
        #[clap(short, long, value_parser)]
        out: String,

        /// (default: the PrecinctResults worksheet, else the first one with a VTDID column) When using
        /// an Excel file (xlsx, xlsm, xlsb or xls), indicates the name of the worksheet to use.
        #[clap(long, value_parser)]
        excel_worksheet_name: Option<String>,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct SourceArgs {
    /// (file path or URL) The GeoJSON feature collection of the precincts.
    #[clap(long, value_parser)]
    pub geo: String,

    /// (file path or URL, repeated) The tall results files, usually one per year.
    #[clap(long = "results", value_parser, required = true)]
    pub results: Vec<String>,

    /// (file path or URL, optional) The UI configuration: filtering mode and field names.
    #[clap(long, value_parser)]
    pub ui_config: Option<String>,

    /// (default 30) Timeout in seconds for every remote fetch.
    #[clap(long, value_parser, default_value_t = 30)]
    pub timeout_secs: u64,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SelectionArgs {
    /// A deep link fragment (`year=...&metric=...&county=...&p=...`) to restore.
    /// The other selection options take precedence over it.
    #[clap(long = "hash", value_parser)]
    pub fragment: Option<String>,

    #[clap(long, value_parser)]
    pub year: Option<u32>,

    /// (default POTUS) The office, for example POTUS, US_SENATE or US_HOUSE.
    #[clap(long, value_parser)]
    pub office: Option<String>,

    /// (default margin) One of turnout_pct, dem_share, gop_share, margin.
    #[clap(long, value_parser)]
    pub metric: Option<String>,

    #[clap(long, value_parser)]
    pub county: Option<String>,

    /// The state senate district.
    #[clap(long, value_parser)]
    pub senate: Option<String>,

    /// The state house district.
    #[clap(long, value_parser)]
    pub house: Option<String>,

    /// The identifier of the precinct to show in the details panel.
    #[clap(long, value_parser)]
    pub precinct: Option<String>,

    /// Selects the first precinct whose name contains this text (at least 2 characters).
    #[clap(long, value_parser)]
    pub search: Option<String>,
}
