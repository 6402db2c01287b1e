//! Capture-format profiles for tcpdump text transcripts.
//!
//! Transcripts written by different tcpdump invocations (and by different
//! generations of our own tooling) disagree on small details: whether the
//! `Flags [..]` group is present, whether the timestamp keeps its fractional
//! part, whether the full TCP sequence/ack/window block is printed. Each
//! profile below is one extraction pattern. All of them expose the same named
//! groups: `time`, `src`, `dst`, optional `flags`, and `length`.
//!
//! Typical lines:
//!
//! ```text
//! 12:00:01.123456 IP 10.0.0.5.51234 > 10.0.0.9.https: Flags [S], seq 1, win 64240, length 0
//! 12:00:01.200000 IP host.example.com.ssh > 10.0.0.5.51240: Flags [P.], seq 1:41, ack 1, win 501, length 40
//! 12:00:02.000001 IP6 fe80::1.546 > ff02::1:2.547: UDP, length 96
//! ```

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Time-of-day, fraction optional, then `IP`/`IP6`. The destination token is
/// greedy up to the last `:` before whitespace so IPv6 tokens survive.
const CANONICAL_PATTERN: &str = concat!(
    r"(?P<time>[0-9]{2}:[0-9]{2}:[0-9]{2}(?:\.[0-9]+)?)\s+IP6?\s+",
    r"(?P<src>\S+)\s+>\s+(?P<dst>\S+):\s+",
    r"(?:Flags\s+\[(?P<flags>[^\]]*)\])?.*length\s+(?P<length>[0-9]+)",
);

const FLAGS_PATTERN: &str = concat!(
    r"(?P<time>[0-9]{2}:[0-9]{2}:[0-9]{2}\.[0-9]+)\s+IP\s+",
    r"(?P<src>[^ ]+)\s+>\s+(?P<dst>[^:]+):",
    r".*Flags\s+\[(?P<flags>[^\]]+)\].*length\s+(?P<length>[0-9]+)",
);

const BASIC_PATTERN: &str = concat!(
    r"(?P<time>[0-9]{2}:[0-9]{2}:[0-9]{2}\.[0-9]+)\s+IP\s+",
    r"(?P<src>[^ ]+)\s+>\s+(?P<dst>[^:]+):",
    r".*length\s+(?P<length>[0-9]+)",
);

const COARSE_PATTERN: &str = concat!(
    r"(?P<time>[0-9]{2}:[0-9]{2}:[0-9]{2})\.[0-9]+\s+IP\s+",
    r"(?P<src>[^ ]+)\s+>\s+(?P<dst>[^:]+):",
    r".*length\s+(?P<length>[0-9]+)",
);

const TCP_STRICT_PATTERN: &str = concat!(
    r"(?P<time>[0-9]{2}:[0-9]{2}:[0-9]{2}\.[0-9]{6})\s+IP\s+",
    r"(?P<src>\S+)\s+>\s+(?P<dst>\S+):\s+",
    r"Flags\s\[(?P<flags>[A-Za-z.\s]+)\],\s+seq\s[0-9]+:[0-9]+,\s+ack\s[0-9]+,\s+",
    r"win\s[0-9]+,\s+options\s\[[^\]]*\],\s+length\s(?P<length>[0-9]+)",
);

/// Supported transcript layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureFormat {
    /// Pick a profile by sampling the input.
    Auto,
    /// Optional fraction, optional flags, mandatory length. Accepts `IP6`.
    Canonical,
    /// Flags group required.
    Flags,
    /// No flags group.
    Basic,
    /// Like `basic`, but the captured time drops its fractional part.
    Coarse,
    /// Full TCP line with seq/ack/win/options.
    TcpStrict,
}

impl Default for CaptureFormat {
    fn default() -> Self {
        CaptureFormat::Canonical
    }
}

impl CaptureFormat {
    /// Every concrete profile.
    pub const PROFILES: [CaptureFormat; 5] = [
        CaptureFormat::Canonical,
        CaptureFormat::Flags,
        CaptureFormat::Basic,
        CaptureFormat::Coarse,
        CaptureFormat::TcpStrict,
    ];

    /// Profiles auto-detection tries, most specific first. On tcpdump output
    /// `tcp-strict` and `flags` match a subset of what `canonical` matches
    /// and capture the same fields, so they win a tie. `basic` and `coarse`
    /// also match a subset of `canonical` but drop the flags group; they are
    /// only used when configured explicitly.
    pub const DETECTION_ORDER: [CaptureFormat; 3] = [
        CaptureFormat::TcpStrict,
        CaptureFormat::Flags,
        CaptureFormat::Canonical,
    ];

    /// Extraction pattern for this profile. `Auto` falls back to canonical.
    pub fn pattern(&self) -> &'static str {
        match self {
            CaptureFormat::Auto | CaptureFormat::Canonical => CANONICAL_PATTERN,
            CaptureFormat::Flags => FLAGS_PATTERN,
            CaptureFormat::Basic => BASIC_PATTERN,
            CaptureFormat::Coarse => COARSE_PATTERN,
            CaptureFormat::TcpStrict => TCP_STRICT_PATTERN,
        }
    }

    pub fn regex(&self) -> Result<Regex, regex::Error> {
        Regex::new(self.pattern())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureFormat::Auto => "auto",
            CaptureFormat::Canonical => "canonical",
            CaptureFormat::Flags => "flags",
            CaptureFormat::Basic => "basic",
            CaptureFormat::Coarse => "coarse",
            CaptureFormat::TcpStrict => "tcp-strict",
        }
    }

    /// Resolve `Auto` against a sample of the input; concrete profiles are
    /// returned unchanged.
    pub fn resolve<S: AsRef<str>>(
        self,
        lines: &[S],
        sample_lines: usize,
    ) -> Result<CaptureFormat, regex::Error> {
        match self {
            CaptureFormat::Auto => detect_format(lines, sample_lines),
            other => Ok(other),
        }
    }
}

impl fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Try each profile in [`CaptureFormat::DETECTION_ORDER`] against the first
/// `sample_lines` non-blank lines and return the one with the most matches.
/// Ties go to the more specific profile; no match at all yields canonical.
pub fn detect_format<S: AsRef<str>>(
    lines: &[S],
    sample_lines: usize,
) -> Result<CaptureFormat, regex::Error> {
    let sample: Vec<&str> = lines
        .iter()
        .map(|line| line.as_ref())
        .filter(|line| !line.trim().is_empty())
        .take(sample_lines.max(1))
        .collect();

    let mut best = CaptureFormat::Canonical;
    let mut best_hits = 0usize;

    for profile in CaptureFormat::DETECTION_ORDER {
        let re = profile.regex()?;
        let hits = sample.iter().filter(|line| re.is_match(line)).count();
        tracing::debug!(profile = %profile, hits, sampled = sample.len(), "format probe");
        if hits > best_hits {
            best = profile;
            best_hits = hits;
        }
    }

    Ok(best)
}
