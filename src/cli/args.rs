use crate::core::models::{ScanId, ScanStatus, ScanType, ToolId};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "blitzscan", version, about = "Run external security tools and normalize their output")]
pub struct Cli {
    /// Verbose human output
    #[arg(short = 'v', long = "verbose", action = ArgAction::SetTrue, global = true)]
    pub verbose: bool,

    /// Debug logs (implies verbose)
    #[arg(short = 'd', long = "debug", action = ArgAction::SetTrue, global = true)]
    pub debug: bool,

    /// Configuration file (TOML or YAML)
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a scan and run it to completion
    Scan {
        #[arg(short = 't', long = "tool", value_parser = parse_tool)]
        tool: ToolId,

        #[arg(short = 'T', long = "target")]
        target: String,

        /// Scan type; defaults to the tool's own category
        #[arg(long = "type", value_parser = parse_scan_type)]
        scan_type: Option<ScanType>,

        /// Tool option as key=value, repeatable
        #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,

        /// Tool options as a JSON object, merged before -o pairs
        #[arg(long = "options", value_name = "JSON")]
        options_json: Option<String>,

        /// Only print the normalized JSON
        #[arg(long = "json", action = ArgAction::SetTrue)]
        json: bool,

        /// Record the scan as PENDING and leave it for `blitzscan worker`
        #[arg(long = "detach", action = ArgAction::SetTrue, conflicts_with_all = ["options", "options_json", "json"])]
        detach: bool,
    },

    /// Run every PENDING scan on a pool sized by `workers.count`
    Worker,

    /// Show one scan record
    Status {
        #[arg(value_parser = parse_scan_id)]
        id: ScanId,
    },

    /// Print the normalized results of a completed scan
    Results {
        #[arg(value_parser = parse_scan_id)]
        id: ScanId,
    },

    /// List stored scans, newest first
    List {
        #[arg(long = "status", value_parser = parse_status)]
        status: Option<ScanStatus>,

        #[arg(long = "skip", default_value_t = 0)]
        skip: usize,

        #[arg(long = "limit", default_value_t = 50)]
        limit: usize,
    },

    /// Cancel a pending scan, or a running one owned by this process
    Cancel {
        #[arg(value_parser = parse_scan_id)]
        id: ScanId,
    },

    /// Show configured tools and whether they can be launched
    Tools,

    /// Mark scans left RUNNING by a dead process as FAILED
    Recover,

    /// Print a configuration template
    Config,
}

fn parse_tool(s: &str) -> Result<ToolId, String> {
    s.parse::<ToolId>().map_err(|name| {
        let known: Vec<&str> = ToolId::ALL.iter().map(|t| t.as_str()).collect();
        format!("unknown tool '{}' (known: {})", name, known.join(", "))
    })
}

fn parse_scan_type(s: &str) -> Result<ScanType, String> {
    s.parse()
}

fn parse_status(s: &str) -> Result<ScanStatus, String> {
    s.parse()
}

fn parse_scan_id(s: &str) -> Result<ScanId, String> {
    s.parse().map_err(|e| format!("invalid scan id '{}': {}", s, e))
}
