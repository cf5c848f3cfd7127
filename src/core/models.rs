use crate::output::schema::{ExecutionMeta, ScanEnvelope};
use crate::plugins::options::ScanOptions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanId(pub u64);

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ScanId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ScanId)
    }
}

/// Identifier of the unit of work handed to the execution pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskRef(pub String);

impl TaskRef {
    pub fn generate() -> Self {
        TaskRef(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Execution context of the worker running a scan.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_ref: TaskRef,
    pub worker: usize,
}

impl TaskContext {
    pub fn new(task_ref: TaskRef, worker: usize) -> Self {
        Self { task_ref, worker }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    Subdomain,
    Port,
    Service,
    Web,
    Vulnerability,
    Ssl,
}

impl ScanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::Subdomain => "subdomain",
            ScanType::Port => "port",
            ScanType::Service => "service",
            ScanType::Web => "web",
            ScanType::Vulnerability => "vulnerability",
            ScanType::Ssl => "ssl",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "subdomain" => Ok(ScanType::Subdomain),
            "port" => Ok(ScanType::Port),
            "service" => Ok(ScanType::Service),
            "web" => Ok(ScanType::Web),
            "vulnerability" => Ok(ScanType::Vulnerability),
            "ssl" => Ok(ScanType::Ssl),
            other => Err(format!("unknown scan type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "PENDING",
            ScanStatus::Running => "RUNNING",
            ScanStatus::Completed => "COMPLETED",
            ScanStatus::Failed => "FAILED",
            ScanStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanStatus::Completed | ScanStatus::Failed | ScanStatus::Cancelled
        )
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ScanStatus::Pending),
            "RUNNING" => Ok(ScanStatus::Running),
            "COMPLETED" => Ok(ScanStatus::Completed),
            "FAILED" => Ok(ScanStatus::Failed),
            "CANCELLED" => Ok(ScanStatus::Cancelled),
            other => Err(format!("unknown scan status: {}", other)),
        }
    }
}

/// Closed set of external tools the engine knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolId {
    Subfinder,
    Amass,
    Masscan,
    Rustscan,
    Nmap,
    Httpx,
    Whatweb,
    Nuclei,
    Ffuf,
    Testssl,
}

impl ToolId {
    pub const ALL: [ToolId; 10] = [
        ToolId::Subfinder,
        ToolId::Amass,
        ToolId::Masscan,
        ToolId::Rustscan,
        ToolId::Nmap,
        ToolId::Httpx,
        ToolId::Whatweb,
        ToolId::Nuclei,
        ToolId::Ffuf,
        ToolId::Testssl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolId::Subfinder => "subfinder",
            ToolId::Amass => "amass",
            ToolId::Masscan => "masscan",
            ToolId::Rustscan => "rustscan",
            ToolId::Nmap => "nmap",
            ToolId::Httpx => "httpx",
            ToolId::Whatweb => "whatweb",
            ToolId::Nuclei => "nuclei",
            ToolId::Ffuf => "ffuf",
            ToolId::Testssl => "testssl",
        }
    }

    pub fn scan_type(&self) -> ScanType {
        match self {
            ToolId::Subfinder | ToolId::Amass => ScanType::Subdomain,
            ToolId::Masscan | ToolId::Rustscan => ScanType::Port,
            ToolId::Nmap => ScanType::Service,
            ToolId::Httpx | ToolId::Whatweb | ToolId::Ffuf => ScanType::Web,
            ToolId::Nuclei => ScanType::Vulnerability,
            ToolId::Testssl => ScanType::Ssl,
        }
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ToolId::ALL
            .into_iter()
            .find(|tool| tool.as_str() == wanted)
            .ok_or_else(|| s.to_string())
    }
}

/// Persisted record of one invocation of one tool against one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    pub id: ScanId,
    pub scan_type: ScanType,
    pub tool: String,
    pub target: String,
    pub status: ScanStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub task_ref: Option<TaskRef>,
    pub results: Option<ScanEnvelope>,
    pub raw_meta: Option<ExecutionMeta>,
    pub error_message: Option<String>,
    #[serde(default)]
    pub parse_degraded: bool,
}

impl Scan {
    pub fn new(id: ScanId, scan_type: ScanType, tool: &str, target: &str) -> Self {
        Self {
            id,
            scan_type,
            tool: tool.to_string(),
            target: target.to_string(),
            status: ScanStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            task_ref: None,
            results: None,
            raw_meta: None,
            error_message: None,
            parse_degraded: false,
        }
    }
}

/// What the API layer asks the engine to run.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub scan_id: ScanId,
    pub tool: String,
    pub target: String,
    pub options: ScanOptions,
}

impl DispatchRequest {
    pub fn new(scan_id: ScanId, tool: &str, target: &str, options: ScanOptions) -> Self {
        Self {
            scan_id,
            tool: tool.to_string(),
            target: target.to_string(),
            options,
        }
    }

    pub fn for_scan(scan: &Scan, options: ScanOptions) -> Self {
        Self::new(scan.id, &scan.tool, &scan.target, options)
    }
}
