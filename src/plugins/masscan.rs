use crate::output::extract::{str_field_or, strip_trailing_commas, u32_field};
use crate::output::schema::{NormalizedResult, OpenPort, Parsed, PortResult};
use crate::plugins::options::ScanOptions;
use crate::plugins::types::{ToolAdapter, ToolBinding};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

const DEFAULT_PORTS: &str = "1-1000";
const DEFAULT_RATE: u64 = 1000;
const RATE_PER_SPEED_STEP: u64 = 500;

/// Mass TCP/UDP port sweep with masscan.
#[derive(Debug, Clone)]
pub struct MasscanAdapter {
    binding: ToolBinding,
}

impl MasscanAdapter {
    pub fn new(binding: ToolBinding) -> Self {
        Self { binding }
    }

    /// Explicit `rate` wins, then the 1-5 speed scale, then the default.
    fn rate(options: &ScanOptions) -> u64 {
        options
            .number("rate")
            .or_else(|| options.speed().map(|speed| speed * RATE_PER_SPEED_STEP))
            .unwrap_or(DEFAULT_RATE)
    }
}

impl ToolAdapter for MasscanAdapter {
    fn binding(&self) -> &ToolBinding {
        &self.binding
    }

    fn build_command(&self, target: &str, options: &ScanOptions) -> Vec<String> {
        let mut args = self.binding.launcher();
        args.push(target.to_string());

        let ports = options
            .non_empty("ports")
            .unwrap_or_else(|| DEFAULT_PORTS.to_string());
        args.extend(["-p".to_string(), ports]);
        args.extend(["--rate".to_string(), Self::rate(options).to_string()]);
        args.extend(
            ["--output-format", "json", "--output-filename", "-"]
                .into_iter()
                .map(String::from),
        );

        args
    }

    fn parse_output(&self, stdout: &str, _stderr: &str) -> Parsed {
        let trimmed = stdout.trim();

        if trimmed.starts_with('[') {
            if let Some(open_ports) = parse_document(trimmed) {
                return Parsed::full(port_result(open_ports));
            }
            tracing::debug!("masscan JSON did not parse, scanning text instead");
        } else if trimmed.is_empty() {
            return Parsed::full(port_result(Vec::new()));
        }

        Parsed::degraded(port_result(parse_text(stdout)))
    }
}

fn port_result(open_ports: Vec<OpenPort>) -> NormalizedResult {
    NormalizedResult::Ports(PortResult {
        count: open_ports.len(),
        open_ports,
    })
}

/// masscan writes `[ {...}, {...}, ]`, with a comma before the closing bracket.
fn parse_document(text: &str) -> Option<Vec<OpenPort>> {
    let cleaned = strip_trailing_commas(text);
    let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(&cleaned) else {
        return None;
    };

    let mut open_ports = Vec::new();
    for entry in &entries {
        let ip = str_field_or(entry, "ip", "");
        let Some(Value::Array(ports)) = entry.get("ports") else {
            continue;
        };
        for port in ports {
            open_ports.push(OpenPort {
                ip: ip.clone(),
                port: u32_field(port, "port"),
                protocol: str_field_or(port, "proto", "tcp"),
                status: str_field_or(port, "status", "open"),
            });
        }
    }
    Some(open_ports)
}

fn parse_text(text: &str) -> Vec<OpenPort> {
    static DISCOVERED: OnceLock<Regex> = OnceLock::new();
    let re = DISCOVERED.get_or_init(|| {
        Regex::new(r"Discovered open port (\d+)/(tcp|udp) on ([\d.]+)").expect("static regex")
    });

    re.captures_iter(text)
        .filter_map(|cap| {
            Some(OpenPort {
                ip: cap[3].to_string(),
                port: cap[1].parse().ok()?,
                protocol: cap[2].to_string(),
                status: "open".to_string(),
            })
        })
        .collect()
}
