use crate::config::{EngineConfig, resolve_binary};
use crate::core::errors::ScanFault;
use crate::core::models::ToolId;
use crate::executors::command::check_launchable;
use crate::plugins::amass::AmassAdapter;
use crate::plugins::ffuf::FfufAdapter;
use crate::plugins::httpx::HttpxAdapter;
use crate::plugins::masscan::MasscanAdapter;
use crate::plugins::nmap::NmapAdapter;
use crate::plugins::nuclei::NucleiAdapter;
use crate::plugins::rustscan::RustscanAdapter;
use crate::plugins::subfinder::SubfinderAdapter;
use crate::plugins::testssl::TestsslAdapter;
use crate::plugins::types::{ToolAdapter, ToolBinding};
use crate::plugins::whatweb::WhatwebAdapter;
use std::collections::BTreeMap;

/// Tool identifier to adapter lookup. Built once and shared read-only by
/// every worker.
pub struct AdapterRegistry {
    adapters: BTreeMap<ToolId, Box<dyn ToolAdapter>>,
}

/// Whether a registered tool can currently be launched.
#[derive(Debug, Clone)]
pub struct ToolAvailability {
    pub tool: ToolId,
    pub launcher: String,
    pub timeout_secs: u64,
    pub problem: Option<String>,
}

impl ToolAvailability {
    pub fn is_available(&self) -> bool {
        self.problem.is_none()
    }
}

/// Binding for `tool` with its binary resolved on disk.
pub fn binding_for(config: &EngineConfig, tool: ToolId) -> ToolBinding {
    let settings = config.tool_settings(tool);
    let binary = match settings.interpreter {
        // scripts are paths under tools_dir, never PATH lookups
        Some(_) => settings.binary.clone().into(),
        None => resolve_binary(&settings.binary, config.tools_dir.as_deref()),
    };

    let binding = ToolBinding::new(tool, binary, settings.timeout);
    match settings.interpreter {
        Some(interpreter) => binding.interpreted(interpreter),
        None => binding,
    }
}

impl AdapterRegistry {
    pub fn empty() -> Self {
        Self {
            adapters: BTreeMap::new(),
        }
    }

    /// All ten adapters bound to their configured binaries and timeouts.
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut registry = Self::empty();
        let bind = |tool| binding_for(config, tool);

        registry.register(Box::new(SubfinderAdapter::new(bind(ToolId::Subfinder))));
        registry.register(Box::new(AmassAdapter::new(bind(ToolId::Amass))));
        registry.register(Box::new(MasscanAdapter::new(bind(ToolId::Masscan))));
        registry.register(Box::new(RustscanAdapter::new(bind(ToolId::Rustscan))));
        registry.register(Box::new(NmapAdapter::new(bind(ToolId::Nmap))));
        registry.register(Box::new(HttpxAdapter::new(bind(ToolId::Httpx))));
        registry.register(Box::new(WhatwebAdapter::new(bind(ToolId::Whatweb))));
        registry.register(Box::new(NucleiAdapter::new(bind(ToolId::Nuclei))));
        registry.register(Box::new(FfufAdapter::new(
            bind(ToolId::Ffuf),
            config.wordlist_catalog(),
        )));
        registry.register(Box::new(TestsslAdapter::new(bind(ToolId::Testssl))));

        registry
    }

    /// Adds an adapter under its own tool identifier, replacing any previous one.
    pub fn register(&mut self, adapter: Box<dyn ToolAdapter>) {
        self.adapters.insert(adapter.tool(), adapter);
    }

    pub fn get(&self, tool: ToolId) -> Option<&dyn ToolAdapter> {
        self.adapters.get(&tool).map(|a| a.as_ref())
    }

    /// Looks up a tool by its identifier as received from a caller.
    pub fn resolve(&self, name: &str) -> Result<&dyn ToolAdapter, ScanFault> {
        name.parse::<ToolId>()
            .ok()
            .and_then(|tool| self.get(tool))
            .ok_or_else(|| ScanFault::UnknownTool(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn availability(&self) -> Vec<ToolAvailability> {
        self.adapters
            .values()
            .map(|adapter| {
                let binding = adapter.binding();
                ToolAvailability {
                    tool: adapter.tool(),
                    launcher: binding.launcher().join(" "),
                    timeout_secs: binding.timeout.as_secs(),
                    problem: check_launchable(binding).err().map(|e| e.to_string()),
                }
            })
            .collect()
    }

    pub fn log_summary(&self) {
        tracing::info!("Adapter registry: {} tools", self.len());
        for adapter in self.adapters.values() {
            let binding = adapter.binding();
            tracing::debug!(
                "  - {} -> {} ({}s)",
                adapter.tool(),
                binding.launcher().join(" "),
                binding.timeout.as_secs()
            );
        }
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::options::ScanOptions;
    use std::path::PathBuf;

    #[test]
    fn test_every_tool_is_registered() {
        let registry = AdapterRegistry::default();
        assert_eq!(registry.len(), ToolId::ALL.len());
        for tool in ToolId::ALL {
            assert_eq!(registry.resolve(tool.as_str()).unwrap().tool(), tool);
        }
    }

    #[test]
    fn test_unknown_tool_is_rejected() {
        let registry = AdapterRegistry::default();
        match registry.resolve("sqlmap") {
            Err(ScanFault::UnknownTool(name)) => assert_eq!(name, "sqlmap"),
            other => panic!("expected UnknownTool, got {:?}", other.map(|a| a.tool())),
        }
    }

    #[test]
    fn test_script_tools_get_interpreter_prefix() {
        let config = EngineConfig {
            tools_dir: Some(PathBuf::from("/opt/blitz/tools")),
            ..EngineConfig::default()
        };
        let registry = AdapterRegistry::from_config(&config);

        let argv = registry
            .resolve("testssl")
            .unwrap()
            .build_command("example.com", &ScanOptions::new());
        assert_eq!(argv[..2], ["bash", "/opt/blitz/tools/testssl.sh/testssl.sh"]);

        let argv = registry
            .resolve("whatweb")
            .unwrap()
            .build_command("https://example.com", &ScanOptions::new());
        assert_eq!(argv[..2], ["ruby", "/opt/blitz/tools/WhatWeb/whatweb"]);
    }

    #[test]
    fn test_configured_timeout_reaches_binding() {
        let mut config = EngineConfig::default();
        config.tools.insert(
            "nuclei".to_string(),
            crate::config::ToolConfig {
                timeout_secs: Some(60),
                ..Default::default()
            },
        );
        let registry = AdapterRegistry::from_config(&config);
        let binding = registry.get(ToolId::Nuclei).unwrap().binding();
        assert_eq!(binding.timeout.as_secs(), 60);
    }

    #[test]
    fn test_missing_binary_reported_unavailable() {
        let mut config = EngineConfig::default();
        config.tools.insert(
            "amass".to_string(),
            crate::config::ToolConfig {
                binary: Some("/nonexistent/amass".to_string()),
                ..Default::default()
            },
        );
        let registry = AdapterRegistry::from_config(&config);
        let amass = registry
            .availability()
            .into_iter()
            .find(|a| a.tool == ToolId::Amass)
            .unwrap();
        assert!(!amass.is_available());
    }
}
