use clap::Parser;
use std::path::PathBuf;

use dumpscope::analysis::counter::Dimension;
use dumpscope::transcript::endpoint::NumericSuffixPolicy;
use dumpscope::transcript::format::CaptureFormat;

/// dumpscope: tcpdump transcript analyzer
#[derive(Parser, Debug)]
#[command(name = "dumpscope", version, about)]
pub struct Cli {
    /// tcpdump text output to analyze
    pub input: PathBuf,

    /// Path to a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Transcript layout ("auto" samples the input)
    #[arg(short, long, value_enum)]
    pub format: Option<CaptureFormat>,

    /// Counter to report (repeatable)
    #[arg(short, long, value_enum)]
    pub dimension: Vec<Dimension>,

    /// Handling of numeric endpoint suffixes that do not fit a port
    #[arg(long, value_enum)]
    pub numeric_suffix: Option<NumericSuffixPolicy>,

    /// Parse threads (0 = auto)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Rows per counter table (0 = all)
    #[arg(long)]
    pub top: Option<usize>,

    /// Write parsed records as CSV
    #[arg(long)]
    pub export_csv: Option<PathBuf>,

    /// Write the full run as JSON
    #[arg(long)]
    pub export_json: Option<PathBuf>,

    /// Write a Markdown summary
    #[arg(long)]
    pub export_markdown: Option<PathBuf>,

    /// Write alerts as JSON lines
    #[arg(long)]
    pub alerts_jsonl: Option<PathBuf>,

    /// Suppress the terminal report
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
