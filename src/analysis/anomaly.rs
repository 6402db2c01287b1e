use serde::Serialize;
use std::fmt;

use crate::analysis::counter::{count, count_where, sum_length_by_source, Dimension, FrequencyCounter};
use crate::config::{AnalysisConfig, ThresholdConfig};
use crate::record::TrafficRecord;

/// Message reported when every rule ran and nothing was flagged.
pub const NO_THREAT: &str = "no threat detected";

/// Message reported when every rule is disabled.
pub const NOT_RUN: &str = "no heuristic enabled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    OverRepresented,
    SynScan,
    Volumetric,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::OverRepresented => "over_represented",
            AlertKind::SynScan => "syn_scan",
            AlertKind::Volumetric => "volumetric",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub entity: String,
    /// Packets for count rules, bytes for the volumetric rule.
    pub count: u64,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AlertKind::OverRepresented => {
                write!(f, "{} over-represented: {} packets", self.entity, self.count)
            }
            AlertKind::SynScan => {
                write!(f, "possible SYN scan from {}: {} SYN packets", self.entity, self.count)
            }
            AlertKind::Volumetric => {
                write!(f, "heavy ssh traffic from {}: {} bytes", self.entity, self.count)
            }
        }
    }
}

/// Result of one or more heuristics.
///
/// `NotRun` means no rule was evaluated. `Clear` means the rules ran and
/// flagged nothing; an empty `Flagged` is never constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertSet {
    NotRun,
    Clear,
    Flagged(Vec<Alert>),
}

impl AlertSet {
    fn from_alerts(alerts: Vec<Alert>) -> Self {
        if alerts.is_empty() {
            AlertSet::Clear
        } else {
            AlertSet::Flagged(alerts)
        }
    }

    pub fn is_clear(&self) -> bool {
        matches!(self, AlertSet::Clear)
    }

    /// False only when no rule was evaluated.
    pub fn ran(&self) -> bool {
        !matches!(self, AlertSet::NotRun)
    }

    pub fn alerts(&self) -> &[Alert] {
        match self {
            AlertSet::NotRun | AlertSet::Clear => &[],
            AlertSet::Flagged(alerts) => alerts,
        }
    }

    /// Flagged entity → triggering count.
    pub fn entries(&self) -> Vec<(&str, u64)> {
        self.alerts()
            .iter()
            .map(|a| (a.entity.as_str(), a.count))
            .collect()
    }

    /// Human-readable alerts, or the single [`NO_THREAT`] / [`NOT_RUN`]
    /// sentinel.
    pub fn messages(&self) -> Vec<String> {
        match self {
            AlertSet::NotRun => vec![NOT_RUN.to_string()],
            AlertSet::Clear => vec![NO_THREAT.to_string()],
            AlertSet::Flagged(alerts) => alerts.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Append `other`'s alerts after this set's. `NotRun` is the identity.
    pub fn merge(self, other: AlertSet) -> AlertSet {
        match (self, other) {
            (AlertSet::NotRun, other) => other,
            (this, AlertSet::NotRun) => this,
            (AlertSet::Clear, other) => other,
            (this, AlertSet::Clear) => this,
            (AlertSet::Flagged(mut a), AlertSet::Flagged(b)) => {
                a.extend(b);
                AlertSet::Flagged(a)
            }
        }
    }
}

impl Serialize for AlertSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.alerts().serialize(serializer)
    }
}

/// Flag every key of `counter` whose count is at least
/// `max(min_count, floor(total_records * ratio))`.
pub fn detect_threshold(
    counter: &FrequencyCounter,
    total_records: usize,
    config: &ThresholdConfig,
) -> AlertSet {
    flag_at_least(counter, config.threshold(total_records), AlertKind::OverRepresented)
}

/// Threshold rule fed the source-address counter of SYN-only records.
/// The threshold is still scaled by the full record count.
pub fn detect_syn_scan(
    records: &[TrafficRecord],
    syn_flags: &str,
    config: &ThresholdConfig,
) -> AlertSet {
    let syn_sources = count_where(records, Dimension::SrcAddr, |r| r.has_flags(syn_flags));
    flag_at_least(&syn_sources, config.threshold(records.len()), AlertKind::SynScan)
}

/// Sum `length` per source over records accepted by `predicate` and flag
/// sources strictly above `byte_threshold`.
pub fn detect_volumetric<F>(records: &[TrafficRecord], predicate: F, byte_threshold: u64) -> AlertSet
where
    F: Fn(&TrafficRecord) -> bool,
{
    let bytes = sum_length_by_source(records, predicate);
    let alerts = bytes
        .iter()
        .filter(|(_, total)| *total > byte_threshold)
        .map(|(entity, total)| Alert {
            kind: AlertKind::Volumetric,
            entity: entity.to_string(),
            count: total,
        })
        .collect();
    AlertSet::from_alerts(alerts)
}

fn flag_at_least(counter: &FrequencyCounter, threshold: u64, kind: AlertKind) -> AlertSet {
    let alerts = counter
        .iter()
        .filter(|(_, n)| *n >= threshold)
        .map(|(entity, n)| Alert {
            kind,
            entity: entity.to_string(),
            count: n,
        })
        .collect();
    AlertSet::from_alerts(alerts)
}

/// Runs the enabled heuristics over one run's records, in the fixed order
/// threshold → SYN scan → volumetric.
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    config: AnalysisConfig,
}

impl AnomalyDetector {
    pub fn new(config: AnalysisConfig) -> Self {
        AnomalyDetector { config }
    }

    /// `counter` is reused for the threshold rule when it was already built
    /// for the configured dimension. Returns [`AlertSet::NotRun`] when every
    /// rule is disabled.
    pub fn evaluate(
        &self,
        records: &[TrafficRecord],
        counter: Option<&FrequencyCounter>,
    ) -> AlertSet {
        let mut alerts = AlertSet::NotRun;

        if self.config.threshold.enabled {
            let owned;
            let counter = match counter {
                Some(counter) => counter,
                None => {
                    owned = count(records, self.config.threshold.dimension);
                    &owned
                }
            };
            let found = detect_threshold(counter, records.len(), &self.config.threshold);
            tracing::debug!(
                dimension = %self.config.threshold.dimension,
                threshold = self.config.threshold.threshold(records.len()),
                flagged = found.alerts().len(),
                "threshold rule"
            );
            alerts = alerts.merge(found);
        }

        if self.config.syn_scan.enabled {
            let found = detect_syn_scan(records, &self.config.syn_flags, &self.config.threshold);
            tracing::debug!(flagged = found.alerts().len(), "syn scan rule");
            alerts = alerts.merge(found);
        }

        if self.config.volumetric.enabled {
            let volumetric = &self.config.volumetric;
            let found = detect_volumetric(records, |r| volumetric.matches(r), volumetric.byte_threshold);
            tracing::debug!(
                byte_threshold = volumetric.byte_threshold,
                flagged = found.alerts().len(),
                "volumetric rule"
            );
            alerts = alerts.merge(found);
        }

        alerts
    }
}
