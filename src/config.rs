use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::llm::{Provider, parse_model_string};

pub const CONFIG_FILE: &str = "ai.toml";
pub const CONFIG_DIR_ENV: &str = "SQLTERM_CONFIG_DIR";
pub const OPENROUTER_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// AI assistant settings, stored as `<config_dir>/ai.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub provider: Provider,
    pub model: String,
    /// Keyed by provider name
    pub api_keys: BTreeMap<String, String>,
    pub base_urls: BTreeMap<String, String>,
    pub default_models: BTreeMap<String, String>,
    /// Tables shown to the model in one prompt
    pub max_tables: usize,
    /// Turns one conversation may take before giving up
    pub max_turns: usize,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub embedding_dimension: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        let base_urls = [Provider::Ollama, Provider::LmStudio]
            .into_iter()
            .map(|p| (p.as_str().to_string(), p.default_base_url().to_string()))
            .collect();

        let default_models = [
            (Provider::OpenRouter, "anthropic/claude-3.5-sonnet"),
            (Provider::Ollama, "llama3.2"),
            (Provider::LmStudio, "lmstudio-community/Meta-Llama-3-8B-Instruct-GGUF"),
        ]
        .into_iter()
        .map(|(p, m)| (p.as_str().to_string(), m.to_string()))
        .collect();

        Self {
            provider: Provider::OpenRouter,
            model: "anthropic/claude-3.5-sonnet".to_string(),
            api_keys: BTreeMap::new(),
            base_urls,
            default_models,
            max_tables: 15,
            max_turns: 6,
            timeout_secs: 120,
            temperature: 0.7,
            max_tokens: 4000,
            embedding_dimension: crate::embedding::DEFAULT_DIMENSION,
        }
    }
}

impl AiConfig {
    /// API key for a provider; OpenRouter falls back to `OPENROUTER_API_KEY`
    pub fn api_key(&self, provider: Provider) -> Option<String> {
        let configured = self
            .api_keys
            .get(provider.as_str())
            .filter(|key| !key.trim().is_empty())
            .cloned();

        match (configured, provider) {
            (Some(key), _) => Some(key),
            (None, Provider::OpenRouter) => std::env::var(OPENROUTER_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty()),
            (None, _) => None,
        }
    }

    pub fn set_api_key(&mut self, provider: Provider, key: &str) {
        self.api_keys.insert(provider.as_str().to_string(), key.to_string());
    }

    pub fn base_url(&self, provider: Provider) -> String {
        self.base_urls
            .get(provider.as_str())
            .filter(|url| !url.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| provider.default_base_url().to_string())
    }

    pub fn set_base_url(&mut self, provider: Provider, url: &str) {
        self.base_urls.insert(provider.as_str().to_string(), url.to_string());
    }

    pub fn default_model(&self, provider: Provider) -> Option<&str> {
        self.default_models.get(provider.as_str()).map(String::as_str)
    }

    /// Switch provider, using its default model when none is given
    pub fn set_provider(&mut self, provider: Provider, model: Option<&str>) {
        self.provider = provider;
        if let Some(model) = model.map(str::to_string).or_else(|| self.default_model(provider).map(str::to_string)) {
            self.model = model;
        }
    }

    /// Set the model, inferring the provider from its shape
    pub fn set_model(&mut self, model: &str) -> anyhow::Result<()> {
        let (provider, model) = parse_model_string(model)?;
        self.provider = provider;
        self.model = model;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Apply a `key = value` edit from the command line
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "provider" => {
                let provider: Provider = value.parse()?;
                self.set_provider(provider, None);
            }
            "model" => self.set_model(value)?,
            "max_tables" => self.max_tables = value.parse()?,
            "max_turns" => self.max_turns = value.parse()?,
            "timeout_secs" => self.timeout_secs = value.parse()?,
            "temperature" => self.temperature = value.parse()?,
            "max_tokens" => self.max_tokens = value.parse()?,
            "embedding_dimension" => self.embedding_dimension = value.parse()?,
            _ => {
                if let Some(provider) = key.strip_prefix("api_key.") {
                    self.set_api_key(provider.parse()?, value);
                } else if let Some(provider) = key.strip_prefix("base_url.") {
                    self.set_base_url(provider.parse()?, value);
                } else {
                    anyhow::bail!("unknown config key: {}", key);
                }
            }
        }
        Ok(())
    }
}

/// `$SQLTERM_CONFIG_DIR`, else the platform config dir joined with `sqlterm`
pub fn default_config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sqlterm")
}

pub fn config_path_in(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE)
}

/// Load `ai.toml`, writing the defaults first if it does not exist
pub fn load_config(config_dir: &Path) -> anyhow::Result<AiConfig> {
    let path = config_path_in(config_dir);
    if !path.exists() {
        let config = AiConfig::default();
        save_config(config_dir, &config)?;
        return Ok(config);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: AiConfig = toml::from_str(&contents)?;
    Ok(config)
}

pub fn save_config(config_dir: &Path, config: &AiConfig) -> anyhow::Result<()> {
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(config_path_in(config_dir), contents)?;
    Ok(())
}
