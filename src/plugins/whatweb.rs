use crate::output::extract::{lines, str_field, strip_trailing_commas, u32_field};
use crate::output::schema::{NormalizedResult, Parsed, TechnologyResult, WebPlugin, WebTechnology};
use crate::plugins::options::ScanOptions;
use crate::plugins::types::{ToolAdapter, ToolBinding};
use serde_json::Value;

/// WhatWeb technology fingerprinting. WhatWeb is a Ruby script, so the
/// binding normally carries a `ruby` interpreter.
#[derive(Debug, Clone)]
pub struct WhatwebAdapter {
    binding: ToolBinding,
}

impl WhatwebAdapter {
    pub fn new(binding: ToolBinding) -> Self {
        Self { binding }
    }
}

impl ToolAdapter for WhatwebAdapter {
    fn binding(&self) -> &ToolBinding {
        &self.binding
    }

    fn build_command(&self, target: &str, options: &ScanOptions) -> Vec<String> {
        let mut args = self.binding.launcher();
        args.push(target.to_string());
        args.push("--log-json=-".to_string());

        // 1 = stealthy, 3 = aggressive, 4 = heavy
        let aggression = options.number_or("aggression", 1);
        args.extend(["-a".to_string(), aggression.to_string()]);

        args
    }

    fn parse_output(&self, stdout: &str, _stderr: &str) -> Parsed {
        let mut technologies = Vec::new();

        let document = strip_trailing_commas(stdout.trim());
        match serde_json::from_str::<Value>(&document) {
            Ok(value) => collect(&value, &mut technologies),
            Err(_) => {
                // streamed log: one object per line, usually comma terminated
                for line in lines(stdout) {
                    let line = line.trim_end_matches(',');
                    if let Ok(value) = serde_json::from_str::<Value>(line) {
                        collect(&value, &mut technologies);
                    }
                }
            }
        }

        Parsed::full(NormalizedResult::Technologies(TechnologyResult {
            count: technologies.len(),
            technologies,
        }))
    }
}

fn collect(value: &Value, out: &mut Vec<WebTechnology>) {
    match value {
        Value::Array(items) => out.extend(items.iter().filter(|i| i.is_object()).map(technology)),
        Value::Object(_) => out.push(technology(value)),
        _ => {}
    }
}

fn technology(record: &Value) -> WebTechnology {
    let plugins = match record.get("plugins") {
        Some(Value::Object(plugins)) => plugins
            .iter()
            .map(|(name, data)| WebPlugin {
                name: name.clone(),
                version: data.get("version").cloned(),
                details: data.get("string").cloned(),
            })
            .collect(),
        _ => Vec::new(),
    };

    WebTechnology {
        target: str_field(record, "target"),
        http_status: u32_field(record, "http_status"),
        plugins,
    }
}
