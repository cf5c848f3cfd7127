use super::wordlist::WordlistCatalog;
use crate::core::models::ToolId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root of locally built tools. Bare binary names are looked up in
    /// `<tools_dir>/bin` before `PATH`, and the script tools live here.
    pub tools_dir: Option<PathBuf>,
    /// Per-tool overrides keyed by tool identifier.
    pub tools: BTreeMap<String, ToolConfig>,
    /// Extra or replacement wordlists, merged over the built-in ones.
    pub wordlists: WordlistCatalog,
    pub workers: WorkersConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolConfig {
    pub binary: Option<String>,
    pub timeout_secs: Option<u64>,
    pub interpreter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub count: usize,
    pub queue_depth: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            count: 4,
            queue_depth: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("scan_results"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Effective settings for one tool once overrides are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    pub binary: String,
    pub timeout: Duration,
    pub interpreter: Option<String>,
}

pub fn default_timeout_secs(tool: ToolId) -> u64 {
    match tool {
        ToolId::Subfinder => 300,
        ToolId::Amass => 600,
        ToolId::Masscan => 300,
        ToolId::Rustscan => 120,
        ToolId::Nmap => 600,
        ToolId::Httpx => 300,
        ToolId::Whatweb => 120,
        ToolId::Nuclei => 900,
        ToolId::Ffuf => 300,
        ToolId::Testssl => 300,
    }
}

/// Script tools and the interpreter that runs them.
pub fn default_interpreter(tool: ToolId) -> Option<&'static str> {
    match tool {
        ToolId::Whatweb => Some("ruby"),
        ToolId::Testssl => Some("bash"),
        _ => None,
    }
}

impl EngineConfig {
    pub fn tool_override(&self, tool: ToolId) -> Option<&ToolConfig> {
        self.tools.get(tool.as_str())
    }

    /// Binary (or script), timeout and interpreter for `tool`, before the
    /// binary is resolved on disk.
    pub fn tool_settings(&self, tool: ToolId) -> ToolSettings {
        let overrides = self.tool_override(tool);

        let binary = overrides
            .and_then(|o| o.binary.clone())
            .unwrap_or_else(|| self.default_binary(tool));
        let timeout_secs = overrides
            .and_then(|o| o.timeout_secs)
            .unwrap_or_else(|| default_timeout_secs(tool));
        let interpreter = overrides
            .and_then(|o| o.interpreter.clone())
            .or_else(|| default_interpreter(tool).map(String::from));

        ToolSettings {
            binary,
            timeout: Duration::from_secs(timeout_secs),
            interpreter: interpreter.filter(|i| !i.is_empty()),
        }
    }

    /// Script tools are checked out as source trees under `tools_dir`;
    /// everything else is looked up by name.
    fn default_binary(&self, tool: ToolId) -> String {
        let script = match tool {
            ToolId::Whatweb => Some(("WhatWeb", "whatweb")),
            ToolId::Testssl => Some(("testssl.sh", "testssl.sh")),
            _ => None,
        };

        match (script, &self.tools_dir) {
            (Some((dir, file)), Some(root)) => root.join(dir).join(file).to_string_lossy().into_owned(),
            (Some((_, file)), None) => file.to_string(),
            (None, _) => tool.as_str().to_string(),
        }
    }

    /// Built-in wordlists with the configured ones layered on top.
    pub fn wordlist_catalog(&self) -> WordlistCatalog {
        let mut catalog = WordlistCatalog::default();
        catalog.extend(self.wordlists.clone());
        catalog
    }
}
