use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{
    aggregate::Grouping, export::ExportMode, record::PositionGroup, schema::ScoringFormat,
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Derived statistics tables for NFL player seasons",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the columns a position view offers
    Columns(ColumnsArgs),
    /// Filter, sort and print a heat-mapped stat table
    Table(TableArgs),
    /// Write the current view as CSV
    Export(ExportArgs),
    /// Summary statistics for the visible numeric columns
    Stats(StatsArgs),
}

/// Settings shared by every command that builds a table.
#[derive(Debug, Clone, Args)]
pub struct ViewArgs {
    /// Player-season records (.json, .csv, .tsv, or `-` for JSON on stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// YAML view file; flags given on the command line take precedence
    #[arg(long = "view")]
    pub view: Option<PathBuf>,
    /// Position group to show
    #[arg(short = 'p', long = "position", value_enum, ignore_case = true)]
    pub position: Option<PositionGroup>,
    /// Restrict records to these seasons (repeatable or comma-separated)
    #[arg(long = "season", action = clap::ArgAction::Append, value_delimiter = ',')]
    pub seasons: Vec<i32>,
    /// Combine rows per player, team or position before filtering
    #[arg(long = "group-by", value_enum)]
    pub group_by: Option<Grouping>,
    /// Include NextGen Stats columns
    #[arg(long = "ngs")]
    pub next_gen: bool,
    /// Fantasy scoring used for the essential columns and default sort
    #[arg(long, value_enum)]
    pub scoring: Option<ScoringFormat>,
    /// Comma-separated column ids to show after the essential columns
    #[arg(short = 'C', long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,
    /// Sort directive of the form `column[:asc|desc]`
    #[arg(long)]
    pub sort: Option<String>,
    /// Minimum value of the position's threshold metric
    #[arg(short = 't', long)]
    pub threshold: Option<f64>,
    /// Keep only these teams (repeatable or comma-separated)
    #[arg(long = "team", action = clap::ArgAction::Append, value_delimiter = ',')]
    pub teams: Vec<String>,
    /// Conditions such as `targets>=80` or `display_name contains Smith`
    #[arg(long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// Additional columns using `name=expression`
    #[arg(long = "derive", action = clap::ArgAction::Append)]
    pub derives: Vec<String>,
    /// Limit number of rows shown or exported
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// Position group to describe
    #[arg(short = 'p', long = "position", value_enum, ignore_case = true, default_value = "ALL")]
    pub position: PositionGroup,
    /// Include NextGen Stats columns
    #[arg(long = "ngs")]
    pub next_gen: bool,
    /// Fantasy scoring used for the essential columns
    #[arg(long, value_enum, default_value_t = ScoringFormat::Ppr)]
    pub scoring: ScoringFormat,
    /// Records used to decide whether the ALL view has NextGen data
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct TableArgs {
    #[command(flatten)]
    pub view: ViewArgs,
    /// When to color cells by rank
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub view: ViewArgs,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output", conflicts_with = "output_dir")]
    pub output: Option<PathBuf>,
    /// Directory to write `<dataset>-<season>-<position>.csv` into
    #[arg(long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    /// Formatted display strings or raw values
    #[arg(long, value_enum, default_value_t = ExportMode::Formatted)]
    pub mode: ExportMode,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    #[command(flatten)]
    pub view: ViewArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}
