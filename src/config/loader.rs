use super::types::EngineConfig;
use crate::core::models::ToolId;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "BLITZSCAN_CONFIG";

const DEFAULT_CONFIG_PATHS: &[&str] = &["./blitzscan.toml", "./config/blitzscan.toml"];

pub struct ConfigLoader;

impl ConfigLoader {
    /// Explicit path, then `$BLITZSCAN_CONFIG`, then the default locations,
    /// then built-in defaults.
    ///
    /// A path the user named explicitly must load; a broken file found in a
    /// default location is skipped with a warning.
    pub fn load_with_custom_path(custom_path: Option<&Path>) -> Result<EngineConfig> {
        if let Some(path) = custom_path {
            return Self::load_from_file(path)
                .with_context(|| format!("Failed to load config from {:?}", path));
        }

        if let Ok(from_env) = std::env::var(CONFIG_ENV) {
            if !from_env.is_empty() {
                let path = PathBuf::from(from_env);
                return Self::load_from_file(&path)
                    .with_context(|| format!("Failed to load config from ${} ({:?})", CONFIG_ENV, path));
            }
        }

        for path in Self::candidate_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from: {:?}", path);
                    return Ok(config);
                }
                Err(e) => {
                    tracing::warn!("Failed to load config from {:?}: {:#}", path, e);
                }
            }
        }

        tracing::debug!("No configuration file found, using default settings");
        Ok(EngineConfig::default())
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from).collect();
        if let Some(dirs) = ProjectDirs::from("", "", "blitzscan") {
            paths.push(dirs.config_dir().join("blitzscan.toml"));
            paths.push(dirs.config_dir().join("blitzscan.yaml"));
        }
        paths
    }

    /// TOML or YAML, by extension.
    pub fn load_from_file(path: &Path) -> Result<EngineConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let config: EngineConfig = if is_yaml {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {:?}", path))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {:?}", path))?
        };

        Self::validate_config(&config)?;
        Ok(config)
    }

    pub fn validate_config(config: &EngineConfig) -> Result<()> {
        if config.workers.count == 0 {
            anyhow::bail!("workers.count must be greater than 0");
        }

        if config.workers.queue_depth == 0 {
            anyhow::bail!("workers.queue_depth must be greater than 0");
        }

        for (name, tool) in &config.tools {
            if name.parse::<ToolId>().is_err() {
                anyhow::bail!("unknown tool in [tools]: {}", name);
            }
            if tool.timeout_secs == Some(0) {
                anyhow::bail!("tools.{}.timeout_secs must be greater than 0", name);
            }
            if tool.binary.as_deref() == Some("") {
                anyhow::bail!("tools.{}.binary cannot be empty", name);
            }
        }

        Ok(())
    }

    /// Default configuration rendered as TOML, for `blitzscan config`.
    pub fn template() -> Result<String> {
        let config = EngineConfig::default();
        toml::to_string_pretty(&config).context("Failed to serialize configuration to TOML")
    }
}
