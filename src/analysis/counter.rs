//! Frequency counters over traffic records.

use ahash::AHashMap;
use clap::ValueEnum;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::record::TrafficRecord;

/// Attribute a counter is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Dimension {
    SrcAddr,
    DstAddr,
    SrcPort,
    DstPort,
    Hour,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::SrcAddr,
        Dimension::DstAddr,
        Dimension::SrcPort,
        Dimension::DstPort,
        Dimension::Hour,
    ];

    /// Key for `record`, or `None` when the record has nothing to count.
    /// Address dimensions always yield a key; port dimensions skip records
    /// without a numeric port.
    pub fn key<'r>(&self, record: &'r TrafficRecord) -> Option<&'r str> {
        match self {
            Dimension::SrcAddr => Some(&record.source_address),
            Dimension::DstAddr => Some(&record.dest_address),
            Dimension::SrcPort => record.source_port.as_deref().filter(|p| !p.is_empty()),
            Dimension::DstPort => record.dest_port.as_deref().filter(|p| !p.is_empty()),
            Dimension::Hour => Some(record.hour()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::SrcAddr => "src-addr",
            Dimension::DstAddr => "dst-addr",
            Dimension::SrcPort => "src-port",
            Dimension::DstPort => "dst-port",
            Dimension::Hour => "hour",
        }
    }

    /// Column heading for tables and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Dimension::SrcAddr => "Source address",
            Dimension::DstAddr => "Destination address",
            Dimension::SrcPort => "Source port",
            Dimension::DstPort => "Destination port",
            Dimension::Hour => "Hour",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key → count tally that remembers first-encounter order.
///
/// Equality ignores order: two counters are equal when they hold the same
/// keys with the same counts.
#[derive(Debug, Clone, Default)]
pub struct FrequencyCounter {
    entries: Vec<(String, u64)>,
    index: AHashMap<String, usize>,
}

impl FrequencyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, key: &str) {
        self.add(key, 1);
    }

    /// Counts saturate at `u64::MAX`.
    pub fn add(&mut self, key: &str, amount: u64) {
        match self.index.get(key) {
            Some(&slot) => {
                let count = &mut self.entries[slot].1;
                *count = count.saturating_add(amount);
            }
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), amount));
            }
        }
    }

    pub fn get(&self, key: &str) -> u64 {
        self.index.get(key).map_or(0, |&slot| self.entries[slot].1)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts, saturating at `u64::MAX`.
    pub fn total(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |acc, (_, n)| acc.saturating_add(*n))
    }

    /// Entries in first-encounter order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(k, n)| (k.as_str(), *n))
    }

    /// Up to `n` entries, highest count first; ties keep first-encounter
    /// order. `n == 0` returns every entry.
    pub fn most_common(&self, n: usize) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self.iter().collect();
        // Stable sort keeps encounter order among equal counts.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        if n > 0 {
            ranked.truncate(n);
        }
        ranked
    }
}

impl PartialEq for FrequencyCounter {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, n)| other.get(k) == n)
    }
}

impl Eq for FrequencyCounter {}

impl Serialize for FrequencyCounter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, count) in &self.entries {
            map.serialize_entry(key, count)?;
        }
        map.end()
    }
}

impl<'a> FromIterator<&'a str> for FrequencyCounter {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut counter = FrequencyCounter::new();
        for key in iter {
            counter.increment(key);
        }
        counter
    }
}

/// Tally `records` by `dimension`.
pub fn count(records: &[TrafficRecord], dimension: Dimension) -> FrequencyCounter {
    count_where(records, dimension, |_| true)
}

/// Tally only the records accepted by `predicate`.
pub fn count_where<F>(records: &[TrafficRecord], dimension: Dimension, predicate: F) -> FrequencyCounter
where
    F: Fn(&TrafficRecord) -> bool,
{
    records
        .iter()
        .filter(|r| predicate(r))
        .filter_map(|r| dimension.key(r))
        .collect()
}

/// Sum payload length per source address over the records accepted by
/// `predicate`.
pub fn sum_length_by_source<F>(records: &[TrafficRecord], predicate: F) -> FrequencyCounter
where
    F: Fn(&TrafficRecord) -> bool,
{
    let mut bytes = FrequencyCounter::new();
    for record in records.iter().filter(|r| predicate(r)) {
        bytes.add(&record.source_address, record.length);
    }
    bytes
}
