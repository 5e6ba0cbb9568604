//! Probe configuration data structures.
//!
//! Every struct here denies unknown fields, so a typo anywhere in the document
//! rejects the whole config instead of being silently dropped.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Root configuration structure: named probe modules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    /// Probe modules keyed by the name targets reference them with.
    #[serde(default)]
    pub modules: BTreeMap<String, Module>,
}

/// A single probe module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Module {
    /// Which prober runs this module.
    pub prober: Prober,

    /// Per-probe timeout, in Prometheus duration syntax ("5s", "1m30s").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<ProbeTimeout>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpProbe>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp: Option<TcpProbe>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icmp: Option<IcmpProbe>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<DnsProbe>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grpc: Option<GrpcProbe>,
}

/// Supported prober kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prober {
    Http,
    Tcp,
    Icmp,
    Dns,
    Grpc,
}

/// IP protocol preference for resolving targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpProtocol {
    #[serde(rename = "ip4")]
    Ip4,
    #[serde(rename = "ip6")]
    Ip6,
}

/// HTTP prober settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpProbe {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub valid_status_codes: Vec<u16>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub valid_http_versions: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_ip_protocol: Option<IpProtocol>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_protocol_fallback: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,

    /// Size with a unit suffix, e.g. "10MB".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_size_limit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_resolve_phase_with_proxy: Option<bool>,

    /// Deprecated spelling of `follow_redirects: false`.
    #[serde(default)]
    pub no_follow_redirects: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_redirects: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_http2: Option<bool>,

    #[serde(default)]
    pub fail_if_ssl: bool,

    #[serde(default)]
    pub fail_if_not_ssl: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fail_if_body_matches_regexp: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fail_if_body_not_matches_regexp: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fail_if_header_matches: Vec<HeaderMatch>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fail_if_header_not_matches: Vec<HeaderMatch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<TlsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuth>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<Authorization>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth2: Option<OAuth2>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_proxy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_from_environment: Option<bool>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub proxy_connect_header: BTreeMap<String, Vec<String>>,
}

/// Header regexp check on an HTTP response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderMatch {
    pub header: String,

    pub regexp: String,

    #[serde(default)]
    pub allow_missing: bool,
}

/// TCP prober settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TcpProbe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_ip_protocol: Option<IpProtocol>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_protocol_fallback: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip_address: Option<String>,

    /// Ordered expect/send exchange run after connecting.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_response: Vec<QueryResponse>,

    #[serde(default)]
    pub tls: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<TlsConfig>,
}

/// One step of a TCP query/response exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<String>,

    /// Labels filled from the `expect` match groups.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<QueryResponseLabel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send: Option<String>,

    #[serde(default)]
    pub starttls: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryResponseLabel {
    pub name: String,

    pub value: String,
}

/// ICMP prober settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IcmpProbe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_ip_protocol: Option<IpProtocol>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_protocol_fallback: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_size: Option<u32>,

    #[serde(default)]
    pub dont_fragment: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u8>,
}

/// DNS prober settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DnsProbe {
    pub query_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_class: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_protocol: Option<String>,

    #[serde(default)]
    pub dns_over_tls: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<TlsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_ip_protocol: Option<IpProtocol>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_protocol_fallback: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recursion_desired: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub valid_rcodes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_answer_rrs: Option<DnsRrValidator>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_authority_rrs: Option<DnsRrValidator>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_additional_rrs: Option<DnsRrValidator>,
}

/// Regexp checks over one DNS resource record section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DnsRrValidator {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fail_if_matches_regexp: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fail_if_all_match_regexp: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fail_if_not_matches_regexp: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fail_if_none_matches_regexp: Vec<String>,
}

/// gRPC health-check prober settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrpcProbe {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    #[serde(default)]
    pub tls: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<TlsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_ip_protocol: Option<IpProtocol>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_protocol_fallback: Option<bool>,
}

/// Client TLS settings shared by the probers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,

    #[serde(default)]
    pub insecure_skip_verify: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_version: Option<String>,
}

/// HTTP basic auth credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasicAuth {
    pub username: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_file: Option<String>,
}

/// Credentials sent in the `Authorization` header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Authorization {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<String>,
}

/// OAuth 2.0 client credentials flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OAuth2 {
    pub client_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_file: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,

    pub token_url: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub endpoint_params: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<TlsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
}

/// A probe timeout that keeps its original spelling for re-serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTimeout {
    raw: String,
    duration: Duration,
}

impl ProbeTimeout {
    /// Parses a Prometheus-style duration such as "5s", "1m30s" or "250ms".
    pub fn parse(raw: &str) -> Result<Self, String> {
        let duration = parse_duration(raw)?;
        Ok(Self {
            raw: raw.to_string(),
            duration,
        })
    }

    /// The parsed duration.
    pub fn as_duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for ProbeTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for ProbeTimeout {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for ProbeTimeout {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ProbeTimeout::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:(\d+)y)?(?:(\d+)w)?(?:(\d+)d)?(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?(?:(\d+)ms)?$",
        )
        .expect("duration regex is valid")
    })
}

/// Parses Prometheus duration syntax into a [`Duration`].
fn parse_duration(raw: &str) -> Result<Duration, String> {
    if raw == "0" {
        return Ok(Duration::ZERO);
    }

    let caps = duration_regex()
        .captures(raw)
        .filter(|_| !raw.is_empty())
        .ok_or_else(|| format!("not a valid duration string: {:?}", raw))?;

    // Milliseconds per unit, in capture-group order.
    const UNITS_MS: [u64; 7] = [
        365 * 24 * 60 * 60 * 1000,
        7 * 24 * 60 * 60 * 1000,
        24 * 60 * 60 * 1000,
        60 * 60 * 1000,
        60 * 1000,
        1000,
        1,
    ];

    let mut total_ms: u64 = 0;
    for (i, unit_ms) in UNITS_MS.iter().enumerate() {
        if let Some(m) = caps.get(i + 1) {
            let n: u64 = m
                .as_str()
                .parse()
                .map_err(|_| format!("duration out of range: {:?}", raw))?;
            total_ms = n
                .checked_mul(*unit_ms)
                .and_then(|v| total_ms.checked_add(v))
                .ok_or_else(|| format!("duration out of range: {:?}", raw))?;
        }
    }

    Ok(Duration::from_millis(total_ms))
}
