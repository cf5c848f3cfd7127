//! Normalized, tool-agnostic result records.
//!
//! Every shape is closed: parsers fill in defaults rather than dropping
//! fields, so consumers can rely on each key being present.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubdomainDetail {
    pub name: String,
    pub domain: String,
    pub addresses: Vec<String>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubdomainResult {
    pub subdomains: Vec<String>,
    pub count: usize,
    pub details: Vec<SubdomainDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPort {
    pub ip: String,
    pub port: u32,
    pub protocol: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortResult {
    pub open_ports: Vec<OpenPort>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostAddress {
    pub addr: String,
    #[serde(rename = "type")]
    pub addr_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostName {
    pub name: String,
    #[serde(rename = "type")]
    pub name_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePort {
    pub port: u32,
    pub protocol: String,
    pub state: String,
    pub service: String,
    pub version: String,
    pub product: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsMatch {
    pub name: String,
    pub accuracy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHost {
    pub status: String,
    pub addresses: Vec<HostAddress>,
    pub hostnames: Vec<HostName>,
    pub ports: Vec<ServicePort>,
    pub os: Vec<OsMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResult {
    pub hosts: Vec<ServiceHost>,
    pub host_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpEndpoint {
    pub url: String,
    pub status_code: u32,
    pub title: String,
    pub tech: Vec<String>,
    pub content_type: String,
    pub content_length: u64,
    pub webserver: String,
    pub cdn: bool,
    pub host: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointResult {
    pub endpoints: Vec<HttpEndpoint>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebPlugin {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebTechnology {
    pub target: String,
    pub http_status: u32,
    pub plugins: Vec<WebPlugin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologyResult {
    pub technologies: Vec<WebTechnology>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub template_id: String,
    pub name: String,
    pub severity: String,
    pub description: String,
    pub tags: Vec<String>,
    pub reference: Vec<String>,
    pub matched_at: String,
    pub matcher_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub host: String,
    pub curl_command: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityBuckets {
    pub critical: Vec<Vulnerability>,
    pub high: Vec<Vulnerability>,
    pub medium: Vec<Vulnerability>,
    pub low: Vec<Vulnerability>,
    pub info: Vec<Vulnerability>,
}

impl SeverityBuckets {
    /// Files `vuln` under its severity. Severities outside the five known
    /// buckets are left out of the grouping.
    pub fn push(&mut self, vuln: Vulnerability) -> bool {
        let bucket = match vuln.severity.to_ascii_lowercase().as_str() {
            "critical" => &mut self.critical,
            "high" => &mut self.high,
            "medium" => &mut self.medium,
            "low" => &mut self.low,
            "info" => &mut self.info,
            _ => return false,
        };
        bucket.push(vuln);
        true
    }

    pub fn counts(&self) -> SeverityCounts {
        SeverityCounts {
            critical: self.critical.len(),
            high: self.high.len(),
            medium: self.medium.len(),
            low: self.low.len(),
            info: self.info.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityResult {
    pub vulnerabilities: Vec<Vulnerability>,
    pub count: usize,
    pub by_severity: SeverityCounts,
    pub details_by_severity: SeverityBuckets,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TlsFinding {
    Entry {
        id: String,
        severity: String,
        finding: String,
    },
    Raw {
        raw: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SslResult {
    pub findings: Vec<TlsFinding>,
    pub certificates: Vec<TlsFinding>,
    pub vulnerabilities: Vec<TlsFinding>,
    pub total_findings: usize,
    pub total_vulnerabilities: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzHit {
    pub url: String,
    pub status: u32,
    pub length: u64,
    pub words: u64,
    pub lines: u64,
    pub content_type: String,
    pub redirect_location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzResult {
    pub discovered: Vec<FuzzHit>,
    pub count: usize,
}

/// Tool-specific payload. Serialized without a tag: each shape is told apart
/// by its own field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NormalizedResult {
    Subdomains(SubdomainResult),
    Ports(PortResult),
    Services(ServiceResult),
    Endpoints(EndpointResult),
    Technologies(TechnologyResult),
    Vulnerabilities(VulnerabilityResult),
    Ssl(SslResult),
    Fuzz(FuzzResult),
}

impl NormalizedResult {
    /// Number of top-level records, for logging and summaries.
    pub fn record_count(&self) -> usize {
        match self {
            NormalizedResult::Subdomains(r) => r.count,
            NormalizedResult::Ports(r) => r.count,
            NormalizedResult::Services(r) => r.host_count,
            NormalizedResult::Endpoints(r) => r.count,
            NormalizedResult::Technologies(r) => r.count,
            NormalizedResult::Vulnerabilities(r) => r.count,
            NormalizedResult::Ssl(r) => r.total_findings + r.total_vulnerabilities + r.certificates.len(),
            NormalizedResult::Fuzz(r) => r.count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMeta {
    pub tool: String,
    pub target: String,
    pub return_code: i32,
    pub timestamp: String,
}

/// Normalized result plus the `_meta` block describing the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEnvelope {
    #[serde(flatten)]
    pub result: NormalizedResult,
    #[serde(rename = "_meta")]
    pub meta: ExecutionMeta,
}

/// How faithfully a parser could read the tool's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fidelity {
    Full,
    /// Structured parsing failed and records were recovered from raw text.
    Degraded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub result: NormalizedResult,
    pub fidelity: Fidelity,
}

impl Parsed {
    pub fn full(result: NormalizedResult) -> Self {
        Self {
            result,
            fidelity: Fidelity::Full,
        }
    }

    pub fn degraded(result: NormalizedResult) -> Self {
        Self {
            result,
            fidelity: Fidelity::Degraded,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.fidelity == Fidelity::Degraded
    }
}
