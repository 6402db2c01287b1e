//! One analysis invocation: transcript file in, records, counters and alerts
//! out.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::analysis::anomaly::{AlertSet, AnomalyDetector};
use crate::analysis::counter::{count, Dimension, FrequencyCounter};
use crate::config::Config;
use crate::pipeline;
use crate::record::TrafficRecord;
use crate::transcript::format::CaptureFormat;
use crate::transcript::{LineParser, ParseStats};

#[derive(Debug)]
pub enum RunError {
    /// The input file is missing or unreadable.
    SourceUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The input was read but no line matched the capture format.
    NoRecords { skipped: u64 },
    /// A capture-format pattern failed to compile.
    Pattern(regex::Error),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::SourceUnavailable { path, source } => {
                write!(f, "cannot read {}: {}", path.display(), source)
            }
            RunError::NoRecords { skipped } => {
                write!(f, "no packet lines recognized ({} lines skipped)", skipped)
            }
            RunError::Pattern(err) => write!(f, "capture pattern error: {}", err),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::SourceUnavailable { source, .. } => Some(source),
            RunError::NoRecords { .. } => None,
            RunError::Pattern(err) => Some(err),
        }
    }
}

impl From<regex::Error> for RunError {
    fn from(err: regex::Error) -> Self {
        RunError::Pattern(err)
    }
}

/// Everything one run produced.
#[derive(Debug)]
pub struct RunOutput {
    /// Profile actually used after auto-detection.
    pub format: CaptureFormat,
    pub records: Vec<TrafficRecord>,
    pub stats: ParseStats,
    /// One counter per configured dimension, in configuration order.
    pub counters: Vec<(Dimension, FrequencyCounter)>,
    pub alerts: AlertSet,
}

impl RunOutput {
    pub fn counter(&self, dimension: Dimension) -> Option<&FrequencyCounter> {
        self.counters
            .iter()
            .find(|(dim, _)| *dim == dimension)
            .map(|(_, counter)| counter)
    }
}

/// Configuration for one invocation. Holds no state between runs.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    config: Config,
}

impl RunContext {
    pub fn new(config: Config) -> Self {
        RunContext { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read `path` and analyze it. Invalid UTF-8 is replaced, never rejected.
    pub fn run(&self, path: &Path) -> Result<RunOutput, RunError> {
        let bytes = std::fs::read(path).map_err(|source| RunError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = text.lines().collect();
        tracing::info!(path = %path.display(), lines = lines.len(), "transcript loaded");
        self.analyze_lines(&lines)
    }

    /// Parse, count and evaluate already-split lines.
    pub fn analyze_lines<S>(&self, lines: &[S]) -> Result<RunOutput, RunError>
    where
        S: AsRef<str> + Sync,
    {
        let parser_config = &self.config.parser;
        let format = parser_config
            .format
            .resolve(lines, parser_config.sample_lines)?;
        if parser_config.format == CaptureFormat::Auto {
            tracing::info!(format = %format, "capture format detected");
        }

        let parser = LineParser::new(format, parser_config.normalizer())?;
        let (records, stats) = pipeline::build_records(lines, &parser, parser_config.workers);
        tracing::info!(
            parsed = stats.parsed,
            skipped = stats.skipped,
            "parse complete"
        );

        if records.is_empty() {
            return Err(RunError::NoRecords {
                skipped: stats.skipped,
            });
        }

        let mut counters: Vec<(Dimension, FrequencyCounter)> = Vec::new();
        for &dimension in &self.config.analysis.dimensions {
            if counters.iter().any(|(dim, _)| *dim == dimension) {
                continue;
            }
            counters.push((dimension, count(&records, dimension)));
        }

        let threshold_dim = self.config.analysis.threshold.dimension;
        let threshold_counter = counters
            .iter()
            .find(|(dim, _)| *dim == threshold_dim)
            .map(|(_, counter)| counter);

        let detector = AnomalyDetector::new(self.config.analysis.clone());
        let alerts = detector.evaluate(&records, threshold_counter);
        tracing::info!(alerts = alerts.alerts().len(), "analysis complete");

        Ok(RunOutput {
            format,
            records,
            stats,
            counters,
            alerts,
        })
    }
}
