//! Endpoint token normalization.
//!
//! tcpdump glues the port (or its service name) onto the address with a dot:
//! `10.0.0.5.443`, `host.example.com.https`, `fe80::1.546`. Hostnames contain
//! dots too, and some transcripts write `addr:port` instead, so splitting a
//! token is a best-effort decision. Normalization never fails; the worst case
//! is the whole token as the address and no port.
//!
//! Resolution order:
//!
//! 1. `[addr]:port` → `addr`, port discarded.
//! 2. Any colon: `addr:port` keeps what precedes the colon. Tokens with
//!    several colons are IPv6; see [`EndpointNormalizer::normalize`].
//! 3. A bare IPv4 literal is returned whole.
//! 4. Last dot-segment numeric → port (or dropped, per [`NumericSuffixPolicy`]).
//! 5. Last dot-segment a known service name → stripped, kept as `service`.
//! 6. Otherwise the whole token is the address.
//!
//! A compressed IPv6 token whose last group is numeric cannot be told apart
//! from `addr:port`: `::1:22` yields `::1`, and so does `ff02::1:2`
//! (`ff02::1`). Tokens without `::` that parse as IPv6 are kept whole, as are
//! tokens where the `:` follows `::` directly (`fe80::1`).

use ahash::AHashSet;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Service names tcpdump substitutes for well-known ports.
pub const DEFAULT_SERVICES: &[&str] = &[
    "http", "https", "ssh", "domain", "ftp", "smtp", "ntp", "telnet", "bootps", "bootpc",
];

/// What to do with a numeric last segment that is too large to be a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum NumericSuffixPolicy {
    /// Always split it off; values above 65535 are dropped, not kept as port.
    StripAlways,
    /// Split only when it fits in a port; larger values stay in the address.
    PortRangeOnly,
}

impl Default for NumericSuffixPolicy {
    fn default() -> Self {
        NumericSuffixPolicy::StripAlways
    }
}

impl fmt::Display for NumericSuffixPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericSuffixPolicy::StripAlways => write!(f, "strip-always"),
            NumericSuffixPolicy::PortRangeOnly => write!(f, "port-range-only"),
        }
    }
}

/// A split endpoint token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Endpoint {
    pub address: String,
    /// Numeric port, if the token carried one.
    pub port: Option<String>,
    /// Service name stripped from the token (`https`, `ssh`, ...).
    pub service: Option<String>,
}

impl Endpoint {
    fn bare(address: &str) -> Self {
        Endpoint {
            address: address.to_string(),
            port: None,
            service: None,
        }
    }

    /// `(address, port)` with an empty string for a missing port.
    pub fn into_pair(self) -> (String, String) {
        (self.address, self.port.unwrap_or_default())
    }

    /// Re-assemble the token in tcpdump's dotted form.
    pub fn to_token(&self) -> String {
        match (&self.port, &self.service) {
            (Some(port), _) => format!("{}.{}", self.address, port),
            (None, Some(service)) => format!("{}.{}", self.address, service),
            (None, None) => self.address.clone(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_token())
    }
}

#[derive(Debug, Clone)]
pub struct EndpointNormalizer {
    policy: NumericSuffixPolicy,
    services: AHashSet<String>,
}

impl Default for EndpointNormalizer {
    fn default() -> Self {
        EndpointNormalizer::new(NumericSuffixPolicy::default(), DEFAULT_SERVICES)
    }
}

impl EndpointNormalizer {
    pub fn new<S: AsRef<str>>(policy: NumericSuffixPolicy, services: &[S]) -> Self {
        EndpointNormalizer {
            policy,
            services: services
                .iter()
                .map(|s| s.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn policy(&self) -> NumericSuffixPolicy {
        self.policy
    }

    pub fn is_service(&self, name: &str) -> bool {
        self.services.contains(&name.to_ascii_lowercase())
    }

    /// Split a raw endpoint token into address, port and service.
    pub fn normalize(&self, token: &str) -> Endpoint {
        let token = token.trim();

        if let Some(rest) = token.strip_prefix('[') {
            if let Some(end) = rest.find(']') {
                return Endpoint::bare(&rest[..end]);
            }
        }

        match token.matches(':').count() {
            0 => self.split_dotted(token),
            1 => {
                let (address, _) = token.split_once(':').unwrap_or((token, ""));
                Endpoint::bare(address)
            }
            _ => self.split_ipv6(token),
        }
    }

    /// Multi-colon tokens. tcpdump writes IPv6 ports with a dot
    /// (`fe80::1.546`); other tools write a trailing `:port`. A token that is
    /// already a complete IPv6 literal without `::` compression is kept whole.
    fn split_ipv6(&self, token: &str) -> Endpoint {
        let last_group = token.rsplit(':').next().unwrap_or("");

        if last_group.contains('.') {
            // `::ffff:10.0.0.1` is an address, `fe80::1.546` is not.
            if token.parse::<Ipv6Addr>().is_ok() {
                return Endpoint::bare(token);
            }
            return self.split_dotted(token);
        }

        if !token.contains("::") && token.parse::<Ipv6Addr>().is_ok() {
            return Endpoint::bare(token);
        }

        match token.rsplit_once(':') {
            Some((head, tail))
                if !head.is_empty() && !head.ends_with(':') && is_numeric(tail) =>
            {
                Endpoint::bare(head)
            }
            _ => Endpoint::bare(token),
        }
    }

    fn split_dotted(&self, token: &str) -> Endpoint {
        if token.parse::<Ipv4Addr>().is_ok() {
            return Endpoint::bare(token);
        }

        let (head, tail) = match token.rsplit_once('.') {
            Some((head, tail)) if !head.is_empty() && !tail.is_empty() => (head, tail),
            _ => return Endpoint::bare(token),
        };

        if is_numeric(tail) {
            if tail.parse::<u16>().is_ok() {
                return Endpoint {
                    address: head.to_string(),
                    port: Some(tail.to_string()),
                    service: None,
                };
            }
            return match self.policy {
                NumericSuffixPolicy::StripAlways => Endpoint::bare(head),
                NumericSuffixPolicy::PortRangeOnly => Endpoint::bare(token),
            };
        }

        if self.is_service(tail) {
            return Endpoint {
                address: head.to_string(),
                port: None,
                service: Some(tail.to_ascii_lowercase()),
            };
        }

        Endpoint::bare(token)
    }
}

/// Normalize with the default policy and service table.
pub fn normalize(token: &str) -> (String, String) {
    EndpointNormalizer::default().normalize(token).into_pair()
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(address: &str, port: &str) -> (String, String) {
        (address.to_string(), port.to_string())
    }

    #[test]
    fn dotted_ipv4_with_port() {
        assert_eq!(normalize("10.0.0.5.443"), pair("10.0.0.5", "443"));
    }

    #[test]
    fn service_suffix_is_stripped() {
        assert_eq!(normalize("host.example.com.https"), pair("host.example.com", ""));
        let ep = EndpointNormalizer::default().normalize("host.example.com.https");
        assert_eq!(ep.service.as_deref(), Some("https"));
        assert_eq!(ep.port, None);
    }

    #[test]
    fn colon_forms_discard_port() {
        assert_eq!(normalize("[::1]:22"), pair("::1", ""));
        assert_eq!(normalize("::1:22"), pair("::1", ""));
        assert_eq!(normalize("fe80::1:22"), pair("fe80::1", ""));
        assert_eq!(normalize("192.168.1.1:8080"), pair("192.168.1.1", ""));
    }

    #[test]
    fn plain_hostname_is_untouched() {
        assert_eq!(normalize("plainhost"), pair("plainhost", ""));
        assert_eq!(normalize(""), pair("", ""));
    }

    #[test]
    fn bare_ipv4_is_not_split() {
        assert_eq!(normalize("10.0.0.5"), pair("10.0.0.5", ""));
    }

    #[test]
    fn ipv6_literals_stay_whole() {
        assert_eq!(normalize("fe80::1"), pair("fe80::1", ""));
        assert_eq!(normalize("::1"), pair("::1", ""));
        assert_eq!(normalize("2001:db8:0:0:0:0:0:1"), pair("2001:db8:0:0:0:0:0:1", ""));
        assert_eq!(normalize("::ffff:10.0.0.1"), pair("::ffff:10.0.0.1", ""));
    }

    #[test]
    fn compressed_ipv6_numeric_tail_reads_as_port() {
        assert_eq!(normalize("ff02::1:2"), pair("ff02::1", ""));
        assert_eq!(normalize("fe80::1"), pair("fe80::1", ""));
        assert_eq!(normalize("ff02::1:2.547"), pair("ff02::1:2", "547"));
    }

    #[test]
    fn ipv6_with_dotted_port() {
        assert_eq!(normalize("fe80::1.546"), pair("fe80::1", "546"));
    }

    #[test]
    fn hostname_with_ephemeral_port() {
        assert_eq!(normalize("BP-Linux8.34862"), pair("BP-Linux8", "34862"));
    }

    #[test]
    fn oversized_suffix_strip_always() {
        let n = EndpointNormalizer::new(NumericSuffixPolicy::StripAlways, DEFAULT_SERVICES);
        let ep = n.normalize("node.example.70000");
        assert_eq!(ep.address, "node.example");
        assert_eq!(ep.port, None);
    }

    #[test]
    fn oversized_suffix_port_range_only() {
        let n = EndpointNormalizer::new(NumericSuffixPolicy::PortRangeOnly, DEFAULT_SERVICES);
        let ep = n.normalize("node.example.70000");
        assert_eq!(ep.address, "node.example.70000");
        assert_eq!(ep.port, None);

        // In-range suffixes behave the same under both policies.
        assert_eq!(n.normalize("node.example.65535").port.as_deref(), Some("65535"));
    }

    #[test]
    fn overflowing_digit_run_is_not_a_port() {
        let ep = EndpointNormalizer::default().normalize("a.99999999999999999999999");
        assert_eq!(ep.address, "a");
        assert_eq!(ep.port, None);
    }

    #[test]
    fn service_match_is_case_insensitive() {
        let ep = EndpointNormalizer::default().normalize("gw.local.SSH");
        assert_eq!(ep.address, "gw.local");
        assert_eq!(ep.service.as_deref(), Some("ssh"));
    }

    #[test]
    fn custom_service_table() {
        let n = EndpointNormalizer::new(NumericSuffixPolicy::StripAlways, &["imaps"]);
        assert_eq!(n.normalize("mail.example.imaps").address, "mail.example");
        assert_eq!(n.normalize("web.example.https").address, "web.example.https");
    }

    #[test]
    fn token_round_trip() {
        let n = EndpointNormalizer::default();
        for token in ["10.0.0.5.443", "host.example.com.https", "plainhost"] {
            assert_eq!(n.normalize(token).to_token(), token);
        }
    }
}
