//! Normalized traffic records and the sequential record builder.

use serde::Serialize;
use std::fmt;

use crate::transcript::endpoint::{Endpoint, EndpointNormalizer};
use crate::transcript::{LineParser, ParseStats, RawFields};

/// Flag string tcpdump prints for a segment with only SYN set.
pub const SYN_ONLY_FLAGS: &str = "S";

/// One parsed, normalized packet summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrafficRecord {
    /// `HH:MM:SS[.ffffff]`, kept as text.
    pub timestamp: String,
    pub source_address: String,
    pub source_port: Option<String>,
    pub source_service: Option<String>,
    pub dest_address: String,
    pub dest_port: Option<String>,
    pub dest_service: Option<String>,
    /// Raw flag letters (`S`, `S.`, `P.`), if the line carried them.
    pub flags: Option<String>,
    pub length: u64,
}

impl TrafficRecord {
    pub fn from_fields(fields: &RawFields<'_>, normalizer: &EndpointNormalizer) -> Self {
        let src = normalizer.normalize(fields.src);
        let dst = normalizer.normalize(fields.dst);
        TrafficRecord {
            timestamp: fields.time.to_string(),
            source_address: src.address,
            source_port: src.port,
            source_service: src.service,
            dest_address: dst.address,
            dest_port: dst.port,
            dest_service: dst.service,
            flags: fields.flags.map(str::to_string),
            length: fields.length,
        }
    }

    /// Hour-of-day bucket: the first two characters of the timestamp.
    pub fn hour(&self) -> &str {
        self.timestamp.get(..2).unwrap_or(&self.timestamp)
    }

    /// True when the flags are exactly `marker` (normally [`SYN_ONLY_FLAGS`]).
    pub fn has_flags(&self, marker: &str) -> bool {
        self.flags.as_deref() == Some(marker)
    }

    pub fn is_syn_only(&self) -> bool {
        self.has_flags(SYN_ONLY_FLAGS)
    }

    pub fn source(&self) -> Endpoint {
        Endpoint {
            address: self.source_address.clone(),
            port: self.source_port.clone(),
            service: self.source_service.clone(),
        }
    }

    pub fn destination(&self) -> Endpoint {
        Endpoint {
            address: self.dest_address.clone(),
            port: self.dest_port.clone(),
            service: self.dest_service.clone(),
        }
    }

    /// Format the record back into a canonical transcript line.
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{} IP {} > {}: ",
            self.timestamp,
            self.source(),
            self.destination()
        );
        if let Some(flags) = &self.flags {
            line.push_str(&format!("Flags [{}], ", flags));
        }
        line.push_str(&format!("length {}", self.length));
        line
    }
}

impl fmt::Display for TrafficRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} > {} [{}] {} bytes",
            self.timestamp,
            self.source(),
            self.destination(),
            self.flags.as_deref().unwrap_or("-"),
            self.length
        )
    }
}

/// Accumulates records from lines in input order.
#[derive(Debug)]
pub struct RecordBuilder<'p> {
    parser: &'p LineParser,
    records: Vec<TrafficRecord>,
    stats: ParseStats,
}

impl<'p> RecordBuilder<'p> {
    pub fn new(parser: &'p LineParser) -> Self {
        RecordBuilder {
            parser,
            records: Vec::new(),
            stats: ParseStats::default(),
        }
    }

    pub fn push_line(&mut self, line: &str) {
        match self.parser.parse(line) {
            Some(record) => {
                self.records.push(record);
                self.stats.record(true);
            }
            None => {
                tracing::trace!(line, "skipped line");
                self.stats.record(false);
            }
        }
    }

    pub fn extend<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.push_line(line.as_ref());
        }
    }

    pub fn finish(self) -> (Vec<TrafficRecord>, ParseStats) {
        (self.records, self.stats)
    }
}

/// Parse every line in order.
pub fn build_records<S: AsRef<str>>(
    parser: &LineParser,
    lines: &[S],
) -> (Vec<TrafficRecord>, ParseStats) {
    let mut builder = RecordBuilder::new(parser);
    builder.extend(lines);
    builder.finish()
}
