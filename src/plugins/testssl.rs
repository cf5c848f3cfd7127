use crate::output::extract::{lines, str_field};
use crate::output::schema::{NormalizedResult, Parsed, SslResult, TlsFinding};
use crate::plugins::options::ScanOptions;
use crate::plugins::types::{ToolAdapter, ToolBinding};
use serde_json::Value;

const VULNERABLE_SEVERITIES: &[&str] = &["CRITICAL", "HIGH", "MEDIUM", "LOW"];

/// TLS configuration audit with testssl.sh, run through `bash`.
#[derive(Debug, Clone)]
pub struct TestsslAdapter {
    binding: ToolBinding,
}

impl TestsslAdapter {
    pub fn new(binding: ToolBinding) -> Self {
        Self { binding }
    }
}

impl ToolAdapter for TestsslAdapter {
    fn binding(&self) -> &ToolBinding {
        &self.binding
    }

    fn build_command(&self, target: &str, options: &ScanOptions) -> Vec<String> {
        let mut args = self.binding.launcher();
        args.extend(
            ["--jsonfile", "-", "--warnings", "off"]
                .into_iter()
                .map(String::from),
        );

        // testssl runs every check unless told to go fast
        if !options.flag("full_check", false) {
            args.push("--fast".to_string());
        }

        if options.flag("check_vulnerabilities", true) {
            args.push("-U".to_string());
        }

        args.push(target.to_string());
        args
    }

    fn parse_output(&self, stdout: &str, _stderr: &str) -> Parsed {
        let mut result = SslResult {
            findings: Vec::new(),
            certificates: Vec::new(),
            vulnerabilities: Vec::new(),
            total_findings: 0,
            total_vulnerabilities: 0,
        };

        let fidelity_full = match serde_json::from_str::<Value>(stdout.trim()) {
            Ok(Value::Array(entries)) => {
                for entry in entries.iter().filter(|e| e.is_object()) {
                    classify(entry, &mut result);
                }
                true
            }
            Ok(_) => true,
            Err(_) => {
                result.findings.extend(
                    lines(stdout)
                        .filter(|line| !line.starts_with('#'))
                        .map(|line| TlsFinding::Raw {
                            raw: line.to_string(),
                        }),
                );
                stdout.trim().is_empty()
            }
        };

        result.total_findings = result.findings.len();
        result.total_vulnerabilities = result.vulnerabilities.len();

        let normalized = NormalizedResult::Ssl(result);
        if fidelity_full {
            Parsed::full(normalized)
        } else {
            Parsed::degraded(normalized)
        }
    }
}

fn classify(entry: &Value, result: &mut SslResult) {
    let id = str_field(entry, "id");
    let severity = str_field(entry, "severity");

    let lowered = id.to_ascii_lowercase();
    let is_certificate = lowered.contains("cert") || lowered.contains("chain");
    let is_vulnerable = VULNERABLE_SEVERITIES.contains(&severity.to_ascii_uppercase().as_str());

    let finding = TlsFinding::Entry {
        id,
        severity,
        finding: str_field(entry, "finding"),
    };

    if is_certificate {
        result.certificates.push(finding);
    } else if is_vulnerable {
        result.vulnerabilities.push(finding);
    } else {
        result.findings.push(finding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ToolId;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn adapter() -> TestsslAdapter {
        TestsslAdapter::new(
            ToolBinding::new(
                ToolId::Testssl,
                "/opt/tools/testssl.sh/testssl.sh",
                Duration::from_secs(300),
            )
            .interpreted("bash"),
        )
    }

    fn ssl(parsed: &Parsed) -> &SslResult {
        match &parsed.result {
            NormalizedResult::Ssl(r) => r,
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_build_command_defaults() {
        let args = adapter().build_command("example.com:443", &ScanOptions::new());
        assert_eq!(
            args,
            vec![
                "bash",
                "/opt/tools/testssl.sh/testssl.sh",
                "--jsonfile",
                "-",
                "--warnings",
                "off",
                "--fast",
                "-U",
                "example.com:443"
            ]
        );
    }

    #[test]
    fn test_build_command_full_without_vulns() {
        let options = ScanOptions::new()
            .with("full_check", true)
            .with("check_vulnerabilities", false);
        let args = adapter().build_command("example.com", &options);
        assert_eq!(args.last().map(String::as_str), Some("example.com"));
        assert!(!args.contains(&"--fast".to_string()));
        assert!(!args.contains(&"-U".to_string()));
    }

    #[test]
    fn test_parse_classifies_entries() {
        let stdout = r#"[
{"id":"SSLv3","ip":"example.com/93.184.216.34","port":"443","severity":"OK","finding":"not offered"},
{"id":"cert_expirationStatus","severity":"OK","finding":"62 >= 60 days"},
{"id":"intermediate_cert_chain","severity":"INFO","finding":"ok"},
{"id":"BREACH","severity":"MEDIUM","cve":"CVE-2013-3587","finding":"potentially VULNERABLE, gzip HTTP compression detected"},
{"id":"LUCKY13","severity":"low","finding":"potentially vulnerable"}
]"#;
        let parsed = adapter().parse_output(stdout, "");
        let result = ssl(&parsed);

        assert!(!parsed.is_degraded());
        assert_eq!(result.certificates.len(), 2);
        assert_eq!(result.total_vulnerabilities, 2);
        assert_eq!(result.total_findings, 1);
        assert_eq!(
            result.vulnerabilities[0],
            TlsFinding::Entry {
                id: "BREACH".to_string(),
                severity: "MEDIUM".to_string(),
                finding: "potentially VULNERABLE, gzip HTTP compression detected".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_text_fallback_keeps_raw_lines() {
        let stdout = "###########################\n testssl.sh 3.2\n###########################\n Testing protocols via sockets\n SSLv2      not offered (OK)\n";
        let parsed = adapter().parse_output(stdout, "");
        let result = ssl(&parsed);

        assert!(parsed.is_degraded());
        assert_eq!(
            result.findings,
            vec![
                TlsFinding::Raw {
                    raw: "testssl.sh 3.2".to_string()
                },
                TlsFinding::Raw {
                    raw: "Testing protocols via sockets".to_string()
                },
                TlsFinding::Raw {
                    raw: "SSLv2      not offered (OK)".to_string()
                },
            ]
        );
        assert!(result.vulnerabilities.is_empty());
    }
}
