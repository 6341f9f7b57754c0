/// Configuration module for coursebot.
///
/// Handles loading, validating, and providing default configuration values.
/// Non-secret settings live in a JSON file; the Anthropic API key is read from
/// the environment (optionally populated from a `.env` file).
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Placeholder written by `setup-key`; never a usable key.
pub const API_KEY_PLACEHOLDER: &str = "your-anthropic-api-key-here";

// ── Default value functions ──────────────────────────────────────────

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_max_tokens() -> u32 {
    800
}

fn default_max_tool_rounds() -> usize {
    2
}

fn default_chunk_size() -> usize {
    800
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_max_results() -> usize {
    5
}

fn default_max_history() -> usize {
    2
}

fn default_db_path() -> String {
    "./vectors.db".to_string()
}

fn default_docs_dir() -> String {
    "../docs".to_string()
}

fn default_frontend_dir() -> String {
    "../frontend".to_string()
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_model_dir() -> String {
    "models/all-MiniLM-L6-v2".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Read from `ANTHROPIC_API_KEY`; never written to the config file.
    #[serde(skip)]
    pub anthropic_api_key: String,

    #[serde(default = "default_model")]
    pub anthropic_model: String,

    #[serde(default = "default_base_url")]
    pub anthropic_base_url: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_max_history")]
    pub max_history: usize,

    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_docs_dir")]
    pub docs_dir: String,

    #[serde(default = "default_frontend_dir")]
    pub frontend_dir: String,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    Onnx,
    Mock,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackend,

    #[serde(default = "default_model_name")]
    pub model_name: String,

    #[serde(default = "default_model_dir")]
    pub model_dir: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Use the hash embedder when the ONNX model cannot be loaded.
    #[serde(default)]
    pub fallback_to_mock: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed origins; `"*"` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            anthropic_api_key: String::new(),
            anthropic_model: default_model(),
            anthropic_base_url: default_base_url(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            max_tool_rounds: default_max_tool_rounds(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_results: default_max_results(),
            max_history: default_max_history(),
            db_path: default_db_path(),
            docs_dir: default_docs_dir(),
            frontend_dir: default_frontend_dir(),
            embedding: EmbeddingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model_name: default_model_name(),
            model_dir: default_model_dir(),
            dimensions: default_dimensions(),
            fallback_to_mock: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file, then apply environment overrides.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and generates a
    /// template file for the default path.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        let mut cfg = if Path::new(path).exists() {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {path}"))?;

            match serde_json::from_str::<Config>(&data) {
                Ok(c) => {
                    info!("Loaded configuration from {path}");
                    c
                }
                Err(e) => {
                    warn!("Invalid JSON in {path}: {e}");
                    warn!("Using default configuration");
                    Self::default()
                }
            }
        } else {
            info!("{path} not found, using defaults");
            let cfg = Self::default();
            if path == "config.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }
            cfg
        };

        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                warn!("Failed to load .env: {e}");
            }
        }
        cfg.apply_env();

        Ok(cfg)
    }

    /// Apply `ANTHROPIC_API_KEY`, `ANTHROPIC_MODEL` and `COURSEBOT_DB_PATH`.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            self.anthropic_api_key = key.trim().to_string();
        }
        if let Ok(model) = std::env::var("ANTHROPIC_MODEL") {
            if !model.trim().is_empty() {
                self.anthropic_model = model.trim().to_string();
            }
        }
        if let Ok(db_path) = std::env::var("COURSEBOT_DB_PATH") {
            if !db_path.trim().is_empty() {
                self.db_path = db_path.trim().to_string();
            }
        }
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(
            self.chunk_overlap < self.chunk_size,
            "chunk_overlap must be smaller than chunk_size"
        );
        anyhow::ensure!(self.max_results > 0, "max_results must be positive");
        anyhow::ensure!(self.max_tokens > 0, "max_tokens must be positive");
        anyhow::ensure!(
            self.max_tool_rounds > 0,
            "max_tool_rounds must be at least 1"
        );
        anyhow::ensure!(
            self.embedding.dimensions > 0,
            "embedding.dimensions must be positive"
        );
        anyhow::ensure!(
            !self.anthropic_model.trim().is_empty(),
            "anthropic_model must not be empty"
        );
        Ok(())
    }

    /// Whether a usable-looking API key is present.
    #[must_use]
    pub fn api_key_configured(&self) -> bool {
        let key = self.anthropic_api_key.trim();
        !key.is_empty() && key != API_KEY_PLACEHOLDER
    }

    #[must_use]
    pub fn model_dir(&self) -> PathBuf {
        PathBuf::from(&self.embedding.model_dir)
    }

    /// `host:port` for the HTTP listener.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
