//! tcpdump text transcript parsing.
//!
//! One line in, at most one [`TrafficRecord`] out. Lines the active profile
//! does not match (banners, truncation notices, blank lines, non-IP frames)
//! are skipped, never reported as errors.

pub mod endpoint;
pub mod format;

use regex::Regex;
use serde::Serialize;
use std::ops::AddAssign;

use crate::record::TrafficRecord;
use endpoint::EndpointNormalizer;
use format::CaptureFormat;

/// Fields extracted from one line, before endpoint normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFields<'a> {
    pub time: &'a str,
    pub src: &'a str,
    pub dst: &'a str,
    pub flags: Option<&'a str>,
    pub length: u64,
}

/// Parsed vs. skipped line counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub parsed: u64,
    pub skipped: u64,
}

impl ParseStats {
    pub fn total(&self) -> u64 {
        self.parsed + self.skipped
    }

    pub fn record(&mut self, matched: bool) {
        if matched {
            self.parsed += 1;
        } else {
            self.skipped += 1;
        }
    }

    /// Share of lines that produced a record, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.parsed as f64 / self.total() as f64 * 100.0
        }
    }
}

impl AddAssign for ParseStats {
    fn add_assign(&mut self, rhs: Self) {
        self.parsed += rhs.parsed;
        self.skipped += rhs.skipped;
    }
}

/// A compiled capture-format profile plus the endpoint normalizer.
#[derive(Debug, Clone)]
pub struct LineParser {
    format: CaptureFormat,
    regex: Regex,
    normalizer: EndpointNormalizer,
}

impl LineParser {
    /// `format` should already be resolved; `Auto` compiles the canonical
    /// pattern.
    pub fn new(format: CaptureFormat, normalizer: EndpointNormalizer) -> Result<Self, regex::Error> {
        let format = match format {
            CaptureFormat::Auto => CaptureFormat::Canonical,
            other => other,
        };
        Ok(LineParser {
            format,
            regex: format.regex()?,
            normalizer,
        })
    }

    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    pub fn normalizer(&self) -> &EndpointNormalizer {
        &self.normalizer
    }

    /// Pull the raw groups out of a line. `None` if the line does not match
    /// or the length does not fit in a `u64`.
    pub fn extract<'a>(&self, line: &'a str) -> Option<RawFields<'a>> {
        let caps = self.regex.captures(line)?;
        let length = caps.name("length")?.as_str().parse::<u64>().ok()?;
        Some(RawFields {
            time: caps.name("time")?.as_str(),
            src: caps.name("src")?.as_str(),
            dst: caps.name("dst")?.as_str(),
            flags: caps
                .name("flags")
                .map(|m| m.as_str().trim())
                .filter(|flags| !flags.is_empty()),
            length,
        })
    }

    /// Extract and normalize one line.
    pub fn parse(&self, line: &str) -> Option<TrafficRecord> {
        let fields = self.extract(line)?;
        Some(TrafficRecord::from_fields(&fields, &self.normalizer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical() -> LineParser {
        LineParser::new(CaptureFormat::Canonical, EndpointNormalizer::default()).unwrap()
    }

    #[test]
    fn parses_syn_line() {
        let line = "12:00:01.123456 IP 10.0.0.5.51234 > 10.0.0.9.https: Flags [S], seq 1, win 64240, length 0";
        let rec = canonical().parse(line).unwrap();
        assert_eq!(rec.timestamp, "12:00:01.123456");
        assert_eq!(rec.source_address, "10.0.0.5");
        assert_eq!(rec.source_port.as_deref(), Some("51234"));
        assert_eq!(rec.dest_address, "10.0.0.9");
        assert_eq!(rec.dest_port, None);
        assert_eq!(rec.dest_service.as_deref(), Some("https"));
        assert_eq!(rec.flags.as_deref(), Some("S"));
        assert_eq!(rec.length, 0);
    }

    #[test]
    fn parses_flagless_udp_line() {
        let line = "12:00:02.000001 IP 10.0.0.5.5353 > 224.0.0.251.5353: UDP, length 96";
        let rec = canonical().parse(line).unwrap();
        assert_eq!(rec.flags, None);
        assert_eq!(rec.length, 96);
        assert_eq!(rec.dest_port.as_deref(), Some("5353"));
    }

    #[test]
    fn parses_ipv6_line() {
        let line = "12:00:03.5 IP6 fe80::1.546 > ff02::1:2.547: UDP, length 96";
        let rec = canonical().parse(line).unwrap();
        assert_eq!(rec.source_address, "fe80::1");
        assert_eq!(rec.source_port.as_deref(), Some("546"));
        assert_eq!(rec.dest_address, "ff02::1:2");
        assert_eq!(rec.dest_port.as_deref(), Some("547"));
    }

    #[test]
    fn portless_icmp6_destination_loses_numeric_group() {
        let line = "10:00:00.1 IP6 fe80::1 > ff02::1:2: ICMP6, router solicitation, length 16";
        let rec = canonical().parse(line).unwrap();
        assert_eq!(rec.source_address, "fe80::1");
        assert_eq!(rec.dest_address, "ff02::1");
        assert_eq!(rec.dest_port, None);
        assert_eq!(rec.length, 16);
    }

    #[test]
    fn time_without_fraction_is_accepted() {
        let line = "23:59:59 IP a.example.ssh > b.example.40000: Flags [P.], length 1448";
        let rec = canonical().parse(line).unwrap();
        assert_eq!(rec.timestamp, "23:59:59");
        assert_eq!(rec.length, 1448);
    }

    #[test]
    fn non_matching_lines_are_skipped() {
        let parser = canonical();
        for line in [
            "",
            "tcpdump: verbose output suppressed, use -v or -vv for full protocol decode",
            "listening on eth0, link-type EN10MB (Ethernet), capture size 262144 bytes",
            "12:00:01.123456 IP 10.0.0.5.51234 > 10.0.0.9.443: Flags [S], seq 1",
            "12:00:01.123456 IP 10.0.0.5.51234 > 10.0.0.9.443",
            "12:00:01.123456 ARP, Request who-has 10.0.0.1 tell 10.0.0.5, length 28",
        ] {
            assert!(parser.parse(line).is_none(), "unexpected match: {:?}", line);
        }
    }

    #[test]
    fn oversized_length_is_unmatched() {
        let line = "12:00:01.1 IP a.1 > b.2: UDP, length 99999999999999999999999";
        assert!(canonical().parse(line).is_none());
    }

    #[test]
    fn legacy_profile_cuts_destination_at_first_colon() {
        let parser = LineParser::new(CaptureFormat::Basic, EndpointNormalizer::default()).unwrap();
        let fields = parser
            .extract("12:00:01.1 IP 10.0.0.5.1000 > 10.0.0.9.80: Flags [S], length 0")
            .unwrap();
        assert_eq!(fields.dst, "10.0.0.9.80");
        assert_eq!(fields.flags, None);
    }

    #[test]
    fn auto_compiles_as_canonical() {
        let parser = LineParser::new(CaptureFormat::Auto, EndpointNormalizer::default()).unwrap();
        assert_eq!(parser.format(), CaptureFormat::Canonical);
    }

    #[test]
    fn stats_accumulate() {
        let mut stats = ParseStats::default();
        stats.record(true);
        stats.record(false);
        stats += ParseStats { parsed: 2, skipped: 0 };
        assert_eq!(stats, ParseStats { parsed: 3, skipped: 1 });
        assert_eq!(stats.total(), 4);
        assert!((stats.success_rate() - 75.0).abs() < 1e-9);
    }
}
