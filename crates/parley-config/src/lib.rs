//! Multi-tier TOML configuration for Parley.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > config file > defaults

use parley_memory::MemoryConfig;
use parley_memory::config::{
    DEFAULT_EXPIRY_MINUTES, DEFAULT_MAX_HISTORY_LENGTH, DEFAULT_MAX_SESSIONS,
    DEFAULT_RECLAIM_INTERVAL,
};
use parley_types::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The default OpenAI-compatible API base URL (Groq).
pub const DEFAULT_API_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// The default model to use.
pub const DEFAULT_MODEL: &str = "llama3-70b-8192";

/// The default max tokens for an answer.
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// The default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.4;

/// Resolved configuration for a Parley process.
#[derive(Debug, Clone)]
pub struct ParleyConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub api_base_url: String,
    pub system_prompt: Option<String>,
    pub memory: MemoryConfig,
    pub checkpoint: CheckpointBackend,
    pub checkpoint_dir: PathBuf,
    pub config_dir: PathBuf,
}

/// Where session checkpoints are mirrored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    None,
    #[default]
    Memory,
    File,
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub memory: MemorySettings,
    #[serde(default)]
    pub checkpoint: CheckpointSettings,
    #[serde(default)]
    pub assistant: AssistantSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSettings {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub base_url: Option<String>,
}

/// Session memory limits section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySettings {
    pub expiry_minutes: Option<u64>,
    pub max_sessions: Option<usize>,
    pub max_history_length: Option<usize>,
    pub reclaim_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointSettings {
    pub backend: Option<CheckpointBackend>,
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistantSettings {
    pub system_prompt: Option<String>,
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub expiry_minutes: Option<u64>,
    pub max_sessions: Option<usize>,
    pub max_history_length: Option<usize>,
}

impl ParleyConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables
    /// 3. Config file (~/.parley/config.toml)
    /// 4. Defaults
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let config_dir = config_dir();
        let settings = load_settings_file(&config_dir.join("config.toml"));
        Self::resolve(overrides, settings, config_dir, |key| std::env::var(key).ok())
    }

    /// Resolve a config from explicit sources. `env` looks up environment variables.
    pub fn resolve(
        overrides: CliOverrides,
        settings: SettingsFile,
        config_dir: PathBuf,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let CliOverrides {
            api_key,
            model,
            max_tokens,
            expiry_minutes,
            max_sessions,
            max_history_length,
        } = overrides;

        // Resolve API key: CLI > env > config file
        let api_key = api_key
            .or_else(|| env("GROQ_API_KEY"))
            .or(settings.api.api_key)
            .ok_or_else(|| ConfigError::MissingKey {
                key: "api_key (set GROQ_API_KEY or add to ~/.parley/config.toml)".into(),
            })?;

        let model = model
            .or_else(|| env("PARLEY_MODEL"))
            .or(settings.api.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let max_tokens = max_tokens
            .or(settings.api.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let temperature = settings.api.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::invalid(
                "temperature",
                format!("{temperature} is outside 0.0..=2.0"),
            ));
        }

        let api_base_url = env("PARLEY_API_BASE_URL")
            .or(settings.api.base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let memory = resolve_memory(
            MemorySettings {
                expiry_minutes,
                max_sessions,
                max_history_length,
                reclaim_interval_secs: None,
            },
            &settings.memory,
        )?;

        let checkpoint = settings.checkpoint.backend.unwrap_or_default();
        let checkpoint_dir = settings
            .checkpoint
            .dir
            .unwrap_or_else(|| config_dir.join("checkpoints"));

        Ok(ParleyConfig {
            api_key,
            model,
            max_tokens,
            temperature,
            api_base_url,
            system_prompt: settings.assistant.system_prompt,
            memory,
            checkpoint,
            checkpoint_dir,
            config_dir,
        })
    }
}

/// Build validated memory limits: CLI > config file > defaults.
fn resolve_memory(
    overrides: MemorySettings,
    settings: &MemorySettings,
) -> Result<MemoryConfig, ConfigError> {
    let expiry_minutes = overrides
        .expiry_minutes
        .or(settings.expiry_minutes)
        .unwrap_or(DEFAULT_EXPIRY_MINUTES);
    let max_sessions = overrides
        .max_sessions
        .or(settings.max_sessions)
        .unwrap_or(DEFAULT_MAX_SESSIONS);
    let max_history_length = overrides
        .max_history_length
        .or(settings.max_history_length)
        .unwrap_or(DEFAULT_MAX_HISTORY_LENGTH);
    let reclaim_interval = settings
        .reclaim_interval_secs
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RECLAIM_INTERVAL);

    let memory = MemoryConfig::from_minutes(expiry_minutes, max_sessions, max_history_length)?
        .with_reclaim_interval(reclaim_interval);
    memory.validate()?;
    Ok(memory)
}

/// Get the Parley config directory path (~/.parley/).
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PARLEY_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".parley")
}

/// Load and parse a TOML settings file, returning defaults on any error.
pub fn load_settings_file(path: &Path) -> SettingsFile {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}
