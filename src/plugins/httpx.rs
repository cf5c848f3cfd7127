use crate::output::extract::{bool_field, json_lines, str_field, string_list, u32_field, u64_field};
use crate::output::schema::{EndpointResult, HttpEndpoint, NormalizedResult, Parsed};
use crate::plugins::options::ScanOptions;
use crate::plugins::types::{ToolAdapter, ToolBinding};

/// HTTP probing and fingerprinting with ProjectDiscovery's httpx.
#[derive(Debug, Clone)]
pub struct HttpxAdapter {
    binding: ToolBinding,
}

impl HttpxAdapter {
    pub fn new(binding: ToolBinding) -> Self {
        Self { binding }
    }
}

/// Boolean options and the flag each one enables, with their defaults.
const TOGGLES: &[(&str, bool, &str)] = &[
    ("tech_detect", true, "-td"),
    ("status_code", true, "-sc"),
    ("title", true, "-title"),
    ("cdn", false, "-cdn"),
    ("follow_redirects", true, "-follow-redirects"),
];

impl ToolAdapter for HttpxAdapter {
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

        for (key, default, flag) in TOGGLES {
            if options.flag(key, *default) {
                args.push(flag.to_string());
            }
        }

        args
    }

    fn parse_output(&self, stdout: &str, _stderr: &str) -> Parsed {
        let endpoints: Vec<HttpEndpoint> = json_lines(stdout, |_| {})
            .iter()
            .filter(|record| record.is_object())
            .map(|record| HttpEndpoint {
                url: str_field(record, "url"),
                status_code: u32_field(record, "status_code"),
                title: str_field(record, "title"),
                tech: string_list(record, "tech"),
                content_type: str_field(record, "content_type"),
                content_length: u64_field(record, "content_length"),
                webserver: str_field(record, "webserver"),
                cdn: bool_field(record, "cdn"),
                host: str_field(record, "host"),
            })
            .collect();

        Parsed::full(NormalizedResult::Endpoints(EndpointResult {
            count: endpoints.len(),
            endpoints,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ToolId;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn adapter() -> HttpxAdapter {
        HttpxAdapter::new(ToolBinding::new(
            ToolId::Httpx,
            "/opt/tools/httpx",
            Duration::from_secs(300),
        ))
    }

    #[test]
    fn test_build_command_defaults() {
        let args = adapter().build_command("https://example.com", &ScanOptions::new());
        assert_eq!(
            args,
            vec![
                "/opt/tools/httpx",
                "-u",
                "https://example.com",
                "-silent",
                "-json",
                "-td",
                "-sc",
                "-title",
                "-follow-redirects"
            ]
        );
    }

    #[test]
    fn test_build_command_toggles() {
        let options = ScanOptions::new()
            .with("tech_detect", false)
            .with("title", false)
            .with("cdn", true)
            .with("follow_redirects", false);
        let args = adapter().build_command("example.com", &options);
        assert_eq!(
            args,
            vec!["/opt/tools/httpx", "-u", "example.com", "-silent", "-json", "-sc", "-cdn"]
        );
    }

    #[test]
    fn test_parse_endpoints_fills_defaults() {
        let stdout = r#"{"url":"https://example.com","status_code":200,"title":"Example Domain","tech":["Nginx","HSTS"],"content_type":"text/html","content_length":1256,"webserver":"nginx","cdn":false,"host":"93.184.216.34"}
[WRN] rate limited
{"url":"http://example.com:8080"}
"#;
        let parsed = adapter().parse_output(stdout, "");
        let NormalizedResult::Endpoints(result) = parsed.result else {
            panic!("wrong shape");
        };

        assert_eq!(result.count, 2);
        assert_eq!(result.endpoints[0].tech, vec!["Nginx", "HSTS"]);
        assert_eq!(result.endpoints[0].content_length, 1256);
        assert_eq!(
            result.endpoints[1],
            HttpEndpoint {
                url: "http://example.com:8080".to_string(),
                status_code: 0,
                title: String::new(),
                tech: vec![],
                content_type: String::new(),
                content_length: 0,
                webserver: String::new(),
                cdn: false,
                host: String::new(),
            }
        );
    }
}
