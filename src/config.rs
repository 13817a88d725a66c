//! Configuration management for llmbridge.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::llm::{create_provider, Provider, ProviderSettings, SUPPORTED_PROVIDERS};
use crate::options::Options;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub provider: ProviderConfig,
    /// Options applied to every request unless a call overrides them.
    #[serde(default)]
    pub defaults: Options,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub model: String,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
}

fn default_api_key_env() -> String {
    "LLMBRIDGE_API_KEY".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig {
                name: "openai".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_base: None,
                api_key: None,
                api_key_env: default_api_key_env(),
                extra_headers: BTreeMap::new(),
            },
            defaults: Options::new().with_max_tokens(4096),
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".llmbridge").join("config.toml"))
    }

    /// Load from the default path, then apply `LLMBRIDGE_*` overrides.
    pub fn load() -> Result<Self> {
        Self::load_with_env(&Self::config_path()?)
    }

    /// Load from `path`, then apply `LLMBRIDGE_*` overrides.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = var("LLMBRIDGE_PROVIDER") {
            self.provider.name = provider;
        }
        if let Some(model) = var("LLMBRIDGE_MODEL") {
            self.provider.model = model;
        }
        if let Some(api_base) = var("LLMBRIDGE_API_BASE") {
            self.provider.api_base = Some(api_base);
        }
    }

    pub fn api_key(&self) -> Result<String> {
        if let Some(key) = &self.provider.api_key {
            if !key.is_empty() {
                return Ok(key.clone());
            }
        }
        std::env::var(&self.provider.api_key_env).with_context(|| {
            format!(
                "API key not found. Either:\n  \
                 1. Set api_key in config file: {}\n  \
                 2. Set environment variable: export {}=your-key",
                Self::config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                self.provider.api_key_env
            )
        })
    }

    pub fn settings(&self) -> Result<ProviderSettings> {
        Ok(self.settings_with_key(self.api_key()?))
    }

    fn settings_with_key(&self, api_key: String) -> ProviderSettings {
        ProviderSettings {
            api_key,
            model: self.provider.model.clone(),
            api_base: self.provider.api_base.clone(),
            defaults: self.defaults.clone(),
            extra_headers: self.provider.extra_headers.clone(),
        }
    }

    /// Build the configured provider.
    pub fn provider(&self) -> Result<Box<dyn Provider>> {
        self.check_provider_name()?;
        self.instantiate(self.settings()?)
    }

    /// Build the configured provider without resolving an API key, for
    /// work that never reaches the network.
    pub fn offline_provider(&self) -> Result<Box<dyn Provider>> {
        self.check_provider_name()?;
        let api_key = self.api_key().unwrap_or_default();
        self.instantiate(self.settings_with_key(api_key))
    }

    fn check_provider_name(&self) -> Result<()> {
        let name = self.provider.name.as_str();
        if !SUPPORTED_PROVIDERS.contains(&name) {
            bail!(
                "Unknown provider: '{}'. Supported: {}",
                name,
                SUPPORTED_PROVIDERS.join(", ")
            );
        }
        Ok(())
    }

    fn instantiate(&self, settings: ProviderSettings) -> Result<Box<dyn Provider>> {
        let name = self.provider.name.as_str();
        create_provider(name, settings)
            .with_context(|| format!("Failed to create provider '{}'", name))
    }

    pub fn save_default() -> Result<PathBuf> {
        let config_path = Self::config_path()?;
        Self::save_default_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_default_to(config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content =
            toml::to_string_pretty(&Self::default()).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))
    }
}
