use crate::output::extract::lines;
use crate::output::schema::{NormalizedResult, OpenPort, Parsed, PortResult};
use crate::plugins::options::ScanOptions;
use crate::plugins::types::{ToolAdapter, ToolBinding};
use regex::Regex;
use std::sync::OnceLock;

const DEFAULT_BATCH: u64 = 2500;
const BATCH_PER_SPEED_STEP: u64 = 1000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1500;

#[derive(Debug, Clone)]
pub struct RustscanAdapter {
    binding: ToolBinding,
}

impl RustscanAdapter {
    pub fn new(binding: ToolBinding) -> Self {
        Self { binding }
    }

    fn batch_size(options: &ScanOptions) -> u64 {
        options
            .number("batch_size")
            .or_else(|| options.speed().map(|speed| speed * BATCH_PER_SPEED_STEP))
            .unwrap_or(DEFAULT_BATCH)
    }
}

impl ToolAdapter for RustscanAdapter {
    fn binding(&self) -> &ToolBinding {
        &self.binding
    }

    fn build_command(&self, target: &str, options: &ScanOptions) -> Vec<String> {
        let mut args = self.binding.launcher();
        args.extend(
            ["-a", target, "--ulimit", "5000", "-g"]
                .into_iter()
                .map(String::from),
        );

        if let Some(ports) = options.non_empty("ports") {
            args.extend(["-p".to_string(), ports]);
        }

        args.extend(["-b".to_string(), Self::batch_size(options).to_string()]);

        // per-connection timeout in milliseconds, not the process budget
        let connect_timeout = options.number_or("timeout", DEFAULT_CONNECT_TIMEOUT_MS);
        args.extend(["--timeout".to_string(), connect_timeout.to_string()]);

        args
    }

    /// Greppable output: `10.0.0.1 -> [22,80,443]`.
    fn parse_output(&self, stdout: &str, _stderr: &str) -> Parsed {
        static GREPPABLE: OnceLock<Regex> = OnceLock::new();
        let re = GREPPABLE
            .get_or_init(|| Regex::new(r"([\d.]+)\s*->\s*\[(.+)\]").expect("static regex"));

        let mut open_ports = Vec::new();
        for line in lines(stdout) {
            let Some(cap) = re.captures(line) else {
                continue;
            };
            let ip = &cap[1];
            for port in cap[2].split(',').map(str::trim) {
                let Ok(port) = port.parse::<u32>() else {
                    continue;
                };
                open_ports.push(OpenPort {
                    ip: ip.to_string(),
                    port,
                    protocol: "tcp".to_string(),
                    status: "open".to_string(),
                });
            }
        }

        Parsed::full(NormalizedResult::Ports(PortResult {
            count: open_ports.len(),
            open_ports,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ToolId;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn adapter() -> RustscanAdapter {
        RustscanAdapter::new(ToolBinding::new(
            ToolId::Rustscan,
            "/opt/tools/rustscan",
            Duration::from_secs(120),
        ))
    }

    #[test]
    fn test_build_command_defaults() {
        let args = adapter().build_command("10.0.0.5", &ScanOptions::new());
        assert_eq!(
            args,
            vec![
                "/opt/tools/rustscan",
                "-a",
                "10.0.0.5",
                "--ulimit",
                "5000",
                "-g",
                "-b",
                "2500",
                "--timeout",
                "1500"
            ]
        );
    }

    #[test]
    fn test_build_command_ports_and_speed() {
        let options = ScanOptions::new().with("ports", "22,80").with("speed", 4);
        let args = adapter().build_command("10.0.0.5", &options);
        assert_eq!(&args[6..10], &["-p", "22,80", "-b", "4000"]);
    }

    #[test]
    fn test_parse_greppable_lines() {
        let stdout = "10.0.0.5 -> [22,80,443]\n.----. .-. .-.\n10.0.0.6 -> [8080, x, 9000]\n";
        let parsed = adapter().parse_output(stdout, "");
        let NormalizedResult::Ports(result) = parsed.result else {
            panic!("wrong shape");
        };

        let found: Vec<(String, u32)> = result
            .open_ports
            .iter()
            .map(|p| (p.ip.clone(), p.port))
            .collect();
        assert_eq!(
            found,
            vec![
                ("10.0.0.5".to_string(), 22),
                ("10.0.0.5".to_string(), 80),
                ("10.0.0.5".to_string(), 443),
                ("10.0.0.6".to_string(), 8080),
                ("10.0.0.6".to_string(), 9000),
            ]
        );
        assert_eq!(result.count, 5);
        assert!(result.open_ports.iter().all(|p| p.protocol == "tcp"));
    }
}
