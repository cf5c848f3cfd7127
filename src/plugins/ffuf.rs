use crate::config::wordlist::WordlistCatalog;
use crate::output::extract::{lines, str_field, u32_field, u64_field};
use crate::output::schema::{FuzzHit, FuzzResult, NormalizedResult, Parsed};
use crate::plugins::options::ScanOptions;
use crate::plugins::types::{ToolAdapter, ToolBinding};
use serde_json::Value;

const FUZZ_KEYWORD: &str = "FUZZ";
const DEFAULT_MATCH_CODES: &str = "200,301,302,403";
const DEFAULT_THREADS: u64 = 40;

/// Content discovery with ffuf.
#[derive(Debug, Clone)]
pub struct FfufAdapter {
    binding: ToolBinding,
    wordlists: WordlistCatalog,
}

impl FfufAdapter {
    pub fn new(binding: ToolBinding, wordlists: WordlistCatalog) -> Self {
        Self { binding, wordlists }
    }
}

/// Appends `/FUZZ` unless the caller already placed the keyword.
fn fuzz_url(target: &str) -> String {
    if target.contains(FUZZ_KEYWORD) {
        target.to_string()
    } else {
        format!("{}/{}", target.trim_end_matches('/'), FUZZ_KEYWORD)
    }
}

impl ToolAdapter for FfufAdapter {
    fn binding(&self) -> &ToolBinding {
        &self.binding
    }

    fn build_command(&self, target: &str, options: &ScanOptions) -> Vec<String> {
        let mut args = self.binding.launcher();
        args.extend(["-u".to_string(), fuzz_url(target)]);
        args.extend(["-o", "-", "-of", "json", "-s"].into_iter().map(String::from));

        let wordlist = options
            .non_empty("wordlist")
            .unwrap_or_else(|| "common".to_string());
        args.extend(["-w".to_string(), self.wordlists.resolve(&wordlist)]);

        if let Some(extensions) = options.non_empty("extensions") {
            args.extend(["-e".to_string(), extensions]);
        }

        let codes = options
            .non_empty("match_codes")
            .unwrap_or_else(|| DEFAULT_MATCH_CODES.to_string());
        args.extend(["-mc".to_string(), codes]);

        if let Some(size) = options.non_empty("filter_size") {
            args.extend(["-fs".to_string(), size]);
        }

        let threads = options.number_or("threads", DEFAULT_THREADS);
        args.extend(["-t".to_string(), threads.to_string()]);

        args
    }

    fn parse_output(&self, stdout: &str, _stderr: &str) -> Parsed {
        let document = serde_json::from_str::<Value>(stdout.trim()).ok();
        if let Some(results) = document.as_ref().and_then(|d| d.get("results")) {
            let discovered: Vec<FuzzHit> = match results {
                Value::Array(results) => results.iter().map(hit).collect(),
                _ => Vec::new(),
            };
            return Parsed::full(fuzz_result(discovered));
        }

        if stdout.trim().is_empty() {
            return Parsed::full(fuzz_result(Vec::new()));
        }

        // Interrupted runs leave per-result lines behind instead of one document.
        let discovered = lines(stdout)
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter(|entry| entry.is_object() && entry.get("results").is_none())
            .map(|entry| hit(&entry))
            .collect();
        Parsed::degraded(fuzz_result(discovered))
    }
}

fn fuzz_result(discovered: Vec<FuzzHit>) -> NormalizedResult {
    NormalizedResult::Fuzz(FuzzResult {
        count: discovered.len(),
        discovered,
    })
}

fn hit(entry: &Value) -> FuzzHit {
    FuzzHit {
        url: str_field(entry, "url"),
        status: u32_field(entry, "status"),
        length: u64_field(entry, "length"),
        words: u64_field(entry, "words"),
        lines: u64_field(entry, "lines"),
        content_type: str_field(entry, "content-type"),
        redirect_location: str_field(entry, "redirectlocation"),
    }
}
