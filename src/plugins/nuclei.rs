use crate::output::extract::{json_lines, str_field, str_field_or, string_list};
use crate::output::schema::{
    NormalizedResult, Parsed, SeverityBuckets, Vulnerability, VulnerabilityResult,
};
use crate::plugins::options::ScanOptions;
use crate::plugins::types::{ToolAdapter, ToolBinding};
use serde_json::Value;

const DEFAULT_SEVERITY: &str = "medium,high,critical";
const DEFAULT_RATE_LIMIT: u64 = 150;

/// Template based vulnerability scanning with nuclei.
#[derive(Debug, Clone)]
pub struct NucleiAdapter {
    binding: ToolBinding,
}

impl NucleiAdapter {
    pub fn new(binding: ToolBinding) -> Self {
        Self { binding }
    }
}

impl ToolAdapter for NucleiAdapter {
    fn binding(&self) -> &ToolBinding {
        &self.binding
    }

    fn build_command(&self, target: &str, options: &ScanOptions) -> Vec<String> {
        let mut args = self.binding.launcher();
        args.extend(
            ["-u", target, "-silent", "-json"]
                .into_iter()
                .map(String::from),
        );

        // an explicit empty severity disables the filter
        let severity = options
            .text("severity")
            .unwrap_or_else(|| DEFAULT_SEVERITY.to_string());
        if !severity.is_empty() {
            args.extend(["-severity".to_string(), severity]);
        }

        for template in options.list("templates") {
            args.extend(["-t".to_string(), template]);
        }

        if let Some(tags) = options.non_empty("tags") {
            args.extend(["-tags".to_string(), tags]);
        }

        if let Some(exclude) = options.non_empty("exclude_tags") {
            args.extend(["-etags".to_string(), exclude]);
        }

        let rate = options.number_or("rate_limit", DEFAULT_RATE_LIMIT);
        args.extend(["-rl".to_string(), rate.to_string()]);

        args
    }

    fn parse_output(&self, stdout: &str, _stderr: &str) -> Parsed {
        let vulnerabilities: Vec<Vulnerability> = json_lines(stdout, |_| {})
            .iter()
            .filter(|record| record.is_object())
            .map(vulnerability)
            .collect();

        let mut buckets = SeverityBuckets::default();
        for vuln in &vulnerabilities {
            if !buckets.push(vuln.clone()) {
                tracing::trace!(template = %vuln.template_id, severity = %vuln.severity, "severity outside known buckets");
            }
        }

        Parsed::full(NormalizedResult::Vulnerabilities(VulnerabilityResult {
            count: vulnerabilities.len(),
            by_severity: buckets.counts(),
            details_by_severity: buckets,
            vulnerabilities,
        }))
    }
}

fn vulnerability(record: &Value) -> Vulnerability {
    let info = record.get("info").cloned().unwrap_or(Value::Null);

    Vulnerability {
        template_id: str_field(record, "template-id"),
        name: str_field(&info, "name"),
        severity: str_field_or(&info, "severity", "unknown"),
        description: str_field(&info, "description"),
        tags: string_list(&info, "tags"),
        reference: string_list(&info, "reference"),
        matched_at: str_field(record, "matched-at"),
        matcher_name: str_field(record, "matcher-name"),
        kind: str_field(record, "type"),
        host: str_field(record, "host"),
        curl_command: str_field(record, "curl-command"),
    }
}
