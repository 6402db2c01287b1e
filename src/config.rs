use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::analysis::counter::Dimension;
use crate::record::TrafficRecord;
use crate::transcript::endpoint::{EndpointNormalizer, NumericSuffixPolicy, DEFAULT_SERVICES};
use crate::transcript::format::CaptureFormat;

fn empty_path_none<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<PathBuf>::deserialize(deserializer)?;
    Ok(opt.and_then(|path| {
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    }))
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "config io error: {}", err),
            ConfigError::Parse(err) => write!(f, "config parse error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub parser: ParserConfig,
    pub analysis: AnalysisConfig,
    pub output: OutputConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(ConfigError::Parse)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub format: CaptureFormat,
    pub numeric_suffix: NumericSuffixPolicy,
    /// Service names stripped from endpoint tokens.
    pub services: Vec<String>,
    /// Lines sampled when `format = "auto"`.
    pub sample_lines: usize,
    /// Parse threads (0 = auto, 1 = sequential).
    pub workers: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            format: CaptureFormat::Canonical,
            numeric_suffix: NumericSuffixPolicy::StripAlways,
            services: DEFAULT_SERVICES.iter().map(|s| s.to_string()).collect(),
            sample_lines: 200,
            workers: 1,
        }
    }
}

impl ParserConfig {
    pub fn normalizer(&self) -> EndpointNormalizer {
        EndpointNormalizer::new(self.numeric_suffix, &self.services)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Counters to derive and report.
    pub dimensions: Vec<Dimension>,
    /// Flag string that marks a SYN-only segment.
    pub syn_flags: String,
    pub threshold: ThresholdConfig,
    pub syn_scan: SynScanConfig,
    pub volumetric: VolumetricConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            dimensions: vec![Dimension::SrcAddr, Dimension::DstAddr],
            syn_flags: crate::record::SYN_ONLY_FLAGS.to_string(),
            threshold: ThresholdConfig::default(),
            syn_scan: SynScanConfig::default(),
            volumetric: VolumetricConfig::default(),
        }
    }
}

/// Flag an entity when its count is `>= max(min_count, floor(total * ratio))`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub enabled: bool,
    pub dimension: Dimension,
    pub min_count: u64,
    pub ratio: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        ThresholdConfig {
            enabled: true,
            dimension: Dimension::SrcAddr,
            min_count: 10,
            ratio: 0.2,
        }
    }
}

impl ThresholdConfig {
    pub fn threshold(&self, total: usize) -> u64 {
        let scaled = (total as f64 * self.ratio.max(0.0)).floor() as u64;
        self.min_count.max(scaled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynScanConfig {
    pub enabled: bool,
}

impl Default for SynScanConfig {
    fn default() -> Self {
        SynScanConfig { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumetricConfig {
    pub enabled: bool,
    /// Destination ports that count toward the volume.
    pub ports: Vec<String>,
    /// Destination service names that count toward the volume.
    pub services: Vec<String>,
    /// Flag a source whose summed length is strictly above this.
    pub byte_threshold: u64,
}

impl Default for VolumetricConfig {
    fn default() -> Self {
        VolumetricConfig {
            enabled: true,
            ports: vec!["22".into()],
            services: vec!["ssh".into()],
            byte_threshold: 2000,
        }
    }
}

impl VolumetricConfig {
    /// Destination predicate for the volumetric rule.
    pub fn matches(&self, record: &TrafficRecord) -> bool {
        let port_hit = record
            .dest_port
            .as_deref()
            .is_some_and(|port| self.ports.iter().any(|p| p == port));
        let service_hit = record
            .dest_service
            .as_deref()
            .is_some_and(|svc| self.services.iter().any(|s| s.eq_ignore_ascii_case(svc)));
        port_hit || service_hit
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Rows per counter table (0 = all).
    pub top_n: usize,
    pub quiet: bool,
    #[serde(deserialize_with = "empty_path_none")]
    pub export_csv: Option<PathBuf>,
    #[serde(deserialize_with = "empty_path_none")]
    pub export_json: Option<PathBuf>,
    #[serde(deserialize_with = "empty_path_none")]
    pub export_markdown: Option<PathBuf>,
    #[serde(deserialize_with = "empty_path_none")]
    pub alerts_jsonl: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            top_n: 10,
            quiet: false,
            export_csv: None,
            export_json: None,
            export_markdown: None,
            alerts_jsonl: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_thresholds() {
        let config = Config::default();
        assert_eq!(config.analysis.threshold.min_count, 10);
        assert_eq!(config.analysis.volumetric.byte_threshold, 2000);
        assert_eq!(config.parser.format, CaptureFormat::Canonical);
    }

    #[test]
    fn threshold_floor() {
        let t = ThresholdConfig::default();
        assert_eq!(t.threshold(100), 20);
        assert_eq!(t.threshold(40), 10);
        assert_eq!(t.threshold(3), 10);
        assert_eq!(t.threshold(0), 10);
        assert_eq!(t.threshold(57), 11);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let raw = r#"
            [parser]
            format = "auto"
            numeric_suffix = "port-range-only"

            [analysis]
            dimensions = ["src-port", "hour"]

            [analysis.volumetric]
            byte_threshold = 5000

            [output]
            export_csv = ""
            export_json = "report.json"
        "#;
        let config = Config::from_toml(raw).unwrap();
        assert_eq!(config.parser.format, CaptureFormat::Auto);
        assert_eq!(config.parser.numeric_suffix, NumericSuffixPolicy::PortRangeOnly);
        assert_eq!(config.parser.sample_lines, 200);
        assert_eq!(config.analysis.dimensions, vec![Dimension::SrcPort, Dimension::Hour]);
        assert_eq!(config.analysis.volumetric.byte_threshold, 5000);
        assert_eq!(config.analysis.volumetric.ports, vec!["22".to_string()]);
        assert!(config.output.export_csv.is_none());
        assert_eq!(config.output.export_json, Some(PathBuf::from("report.json")));
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let err = Config::from_toml("[parser]\nformat = \"nope\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn volumetric_predicate_matches_port_or_service() {
        let v = VolumetricConfig::default();
        let mut rec = TrafficRecord {
            timestamp: "00:00:00".into(),
            source_address: "a".into(),
            source_port: None,
            source_service: None,
            dest_address: "b".into(),
            dest_port: Some("22".into()),
            dest_service: None,
            flags: None,
            length: 1,
        };
        assert!(v.matches(&rec));
        rec.dest_port = None;
        rec.dest_service = Some("ssh".into());
        assert!(v.matches(&rec));
        rec.dest_service = Some("https".into());
        assert!(!v.matches(&rec));
    }
}
