use crate::output::extract::{dedup_preserving_order, lines, str_field};
use crate::output::schema::{NormalizedResult, Parsed, SubdomainDetail, SubdomainResult};
use crate::plugins::options::ScanOptions;
use crate::plugins::types::{ToolAdapter, ToolBinding};
use serde_json::Value;

/// OWASP Amass enumeration, passive by default.
#[derive(Debug, Clone)]
pub struct AmassAdapter {
    binding: ToolBinding,
}

impl AmassAdapter {
    pub fn new(binding: ToolBinding) -> Self {
        Self { binding }
    }
}

impl ToolAdapter for AmassAdapter {
    fn binding(&self) -> &ToolBinding {
        &self.binding
    }

    fn build_command(&self, target: &str, options: &ScanOptions) -> Vec<String> {
        let mut args = self.binding.launcher();
        args.extend(["enum".to_string(), "-d".to_string(), target.to_string()]);

        if options.flag("passive", true) {
            args.push("-passive".to_string());
        }

        if options.flag("json_output", true) {
            args.extend(["-json".to_string(), "-".to_string()]);
        }

        let minutes = options.number_or("timeout_minutes", 5);
        args.extend(["-timeout".to_string(), minutes.to_string()]);

        args
    }

    fn parse_output(&self, stdout: &str, _stderr: &str) -> Parsed {
        let mut names = Vec::new();
        let mut details = Vec::new();

        for line in lines(stdout) {
            match serde_json::from_str::<Value>(line) {
                Ok(record) => {
                    let name = str_field(&record, "name");
                    if name.is_empty() {
                        continue;
                    }
                    details.push(SubdomainDetail {
                        name: name.clone(),
                        domain: str_field(&record, "domain"),
                        addresses: addresses(&record),
                        source: str_field(&record, "source"),
                    });
                    names.push(name);
                }
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

/// Amass reports addresses either as plain strings or as `{ip, cidr, asn}`
/// objects depending on the release.
fn addresses(record: &Value) -> Vec<String> {
    let Some(Value::Array(items)) = record.get("addresses") else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(_) => Some(str_field(item, "ip")).filter(|ip| !ip.is_empty()),
            _ => None,
        })
        .collect()
}
