//! Configuration management for jarvis.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::{ProviderConfig, ProviderIdentity};

/// Read-only view of the configuration used by the router and the chat loop.
pub trait ConfigStore {
    /// Settings for `identity`, or `None` when it has no usable API key.
    fn provider_config(&self, identity: ProviderIdentity) -> Option<ProviderConfig>;

    /// The preferred provider, if one is configured.
    fn default_provider(&self) -> Option<ProviderIdentity>;

    fn is_available(&self, identity: ProviderIdentity) -> bool {
        self.provider_config(identity).is_some()
    }

    /// Available providers in fallback priority order.
    fn available_providers(&self) -> Vec<ProviderIdentity> {
        ProviderIdentity::PRIORITY
            .into_iter()
            .filter(|id| self.is_available(*id))
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<ProviderIdentity>,
    #[serde(default)]
    pub personality: PersonalityConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

/// The assistant's name and the system prompt that gives it its voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalityConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_name() -> String {
    "Jarvis".to_string()
}

fn default_system_prompt() -> String {
    "You are Jarvis, a brilliant AI assistant with a witty personality. Keep responses \
     short, precise, and to the point. Be helpful and slightly witty, but concise."
        .to_string()
}

impl Default for PersonalityConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            system_prompt: default_system_prompt(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: ProviderSettings,
    #[serde(default)]
    pub anthropic: ProviderSettings,
    #[serde(default)]
    pub gemini: ProviderSettings,
}

/// Per-provider settings as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable to read the key from when `api_key` is unset.
    /// Defaults to the vendor's conventional name; an empty string disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: None,
            model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_base: None,
        }
    }
}

/// Model used when the config does not name one.
pub fn default_model(identity: ProviderIdentity) -> &'static str {
    match identity {
        ProviderIdentity::OpenAi => "gpt-4o",
        ProviderIdentity::Anthropic => "claude-sonnet-4-20250514",
        ProviderIdentity::Gemini => "gemini-2.5-flash",
    }
}

/// Terminal output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Colored labels and notices.
    #[serde(default = "bool_true")]
    pub color: bool,
    /// Delay between characters of a reply; 0 prints fragments as they arrive.
    #[serde(default = "default_typewriter_delay_ms")]
    pub typewriter_delay_ms: u64,
}

fn bool_true() -> bool {
    true
}

fn default_typewriter_delay_ms() -> u64 {
    5
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            color: true,
            typewriter_delay_ms: default_typewriter_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// How many recent exchanges to send as context; 0 sends everything.
    #[serde(default)]
    pub max_exchanges: usize,
}

impl AppConfig {
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".jarvis"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load `~/.jarvis/config.toml` and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(provider) = std::env::var("JARVIS_DEFAULT_PROVIDER") {
            match provider.parse() {
                Ok(identity) => self.default_provider = Some(identity),
                Err(e) => tracing::warn!("ignoring JARVIS_DEFAULT_PROVIDER: {}", e),
            }
        }
    }

    /// Write the config atomically: a temporary file renamed over the target.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, content)
            .with_context(|| format!("Failed to write config file: {}", tmp.display()))?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e)
                .with_context(|| format!("Failed to replace config file: {}", path.display()));
        }
        Ok(())
    }

    /// Move an unparsable config file aside so setup can start fresh.
    pub fn backup_corrupt(path: &Path) -> Result<PathBuf> {
        let backup = path.with_extension("toml.bak");
        std::fs::rename(path, &backup).with_context(|| {
            format!("Failed to back up corrupt config to {}", backup.display())
        })?;
        Ok(backup)
    }

    pub fn settings(&self, identity: ProviderIdentity) -> &ProviderSettings {
        match identity {
            ProviderIdentity::OpenAi => &self.providers.openai,
            ProviderIdentity::Anthropic => &self.providers.anthropic,
            ProviderIdentity::Gemini => &self.providers.gemini,
        }
    }

    pub fn settings_mut(&mut self, identity: ProviderIdentity) -> &mut ProviderSettings {
        match identity {
            ProviderIdentity::OpenAi => &mut self.providers.openai,
            ProviderIdentity::Anthropic => &mut self.providers.anthropic,
            ProviderIdentity::Gemini => &mut self.providers.gemini,
        }
    }

    /// The key from the config file, else from the provider's env var.
    pub fn api_key(&self, identity: ProviderIdentity) -> Option<String> {
        let settings = self.settings(identity);
        if let Some(key) = &settings.api_key {
            if !key.trim().is_empty() {
                return Some(key.trim().to_string());
            }
        }
        let env_name = settings
            .api_key_env
            .as_deref()
            .unwrap_or_else(|| identity.default_key_env());
        if env_name.is_empty() {
            return None;
        }
        std::env::var(env_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn model(&self, identity: ProviderIdentity) -> String {
        self.settings(identity)
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_model(identity).to_string())
    }
}

impl ConfigStore for AppConfig {
    fn provider_config(&self, identity: ProviderIdentity) -> Option<ProviderConfig> {
        let api_key = self.api_key(identity)?;
        let settings = self.settings(identity);
        Some(ProviderConfig {
            identity,
            api_key,
            model: self.model(identity),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            api_base: settings.api_base.clone(),
        })
    }

    fn default_provider(&self) -> Option<ProviderIdentity> {
        self.default_provider
    }
}
