use crate::output::extract::{dedup_preserving_order, lines, str_field};
use crate::output::schema::{NormalizedResult, Parsed, SubdomainDetail, SubdomainResult};
use crate::plugins::options::ScanOptions;
use crate::plugins::types::{ToolAdapter, ToolBinding};
use serde_json::Value;

/// Passive subdomain discovery with ProjectDiscovery's subfinder.
#[derive(Debug, Clone)]
pub struct SubfinderAdapter {
    binding: ToolBinding,
}

impl SubfinderAdapter {
    pub fn new(binding: ToolBinding) -> Self {
        Self { binding }
    }
}

impl ToolAdapter for SubfinderAdapter {
    fn binding(&self) -> &ToolBinding {
        &self.binding
    }

    fn build_command(&self, target: &str, options: &ScanOptions) -> Vec<String> {
        let mut args = self.binding.launcher();
        args.extend(["-d".to_string(), target.to_string(), "-silent".to_string()]);

        if options.flag("json_output", true) {
            args.push("-json".to_string());
        }

        if let Some(sources) = options.non_empty("sources") {
            args.extend(["-sources".to_string(), sources]);
        }

        if options.flag("resolve", false) {
            args.push("-nW".to_string());
        }

        args
    }

    fn parse_output(&self, stdout: &str, _stderr: &str) -> Parsed {
        let mut names = Vec::new();
        let mut details = Vec::new();

        for line in lines(stdout) {
            match serde_json::from_str::<Value>(line) {
                Ok(record) => {
                    let host = str_field(&record, "host");
                    if host.is_empty() {
                        continue;
                    }
                    let ip = str_field(&record, "ip");
                    details.push(SubdomainDetail {
                        name: host.clone(),
                        domain: str_field(&record, "input"),
                        addresses: if ip.is_empty() { vec![] } else { vec![ip] },
                        source: str_field(&record, "source"),
                    });
                    names.push(host);
                }
                // -json disabled or an older release: bare hostnames
                Err(_) if line.contains('.') => names.push(line.to_string()),
                Err(_) => {}
            }
        }

        let subdomains = dedup_preserving_order(names);
        Parsed::full(NormalizedResult::Subdomains(SubdomainResult {
            count: subdomains.len(),
            subdomains,
            details,
        }))
    }
}
