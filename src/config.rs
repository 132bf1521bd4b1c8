//! Configuration for inquest paths and collaborator settings.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (INQUEST_HOME, INQUEST_ALERTS, INQUEST_ASSETS,
//!    INQUEST_MODEL)
//! 2. Config file (.inquest/config.yaml)
//! 3. Defaults (~/.inquest, ./alerts.json, ./assets.csv)
//!
//! Config file discovery:
//! - Searches current directory and parents for .inquest/config.yaml
//! - Paths in the config file are relative to the config file's parent
//!   directory
//!
//! API keys (MISTRAL_API_KEY, VT_API_KEY) are read from the environment at
//! wiring time only; they never live in the config file.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<std::result::Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub llm: Option<LlmConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to config file)
    pub home: Option<String>,
    /// Alert fixture file (relative to config file)
    pub alerts: Option<String>,
    /// Asset inventory CSV (relative to config file)
    pub assets: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to inquest home (engine state, sessions)
    pub home: PathBuf,
    /// Path to the alert fixture file
    pub alerts: PathBuf,
    /// Path to the asset inventory CSV
    pub assets: PathBuf,
    /// Chat model used by the LLM collaborator
    pub model: String,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Directory holding one JSON file per stepwise session.
    pub fn sessions_dir(&self) -> PathBuf {
        self.home.join("sessions")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".inquest").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a possibly-relative config path against the config file's parent
fn resolve_path(base: Option<&Path>, value: &str) -> PathBuf {
    let path = PathBuf::from(value);
    match (path.is_absolute(), base) {
        (false, Some(base)) => base.join(path),
        _ => path,
    }
}

fn resolve() -> Result<ResolvedConfig> {
    let config_file = find_config_file();
    let file = match &config_file {
        Some(path) => Some(load_config_file(path)?),
        None => None,
    };
    // Paths in the file are relative to the directory containing .inquest/
    let base = config_file
        .as_ref()
        .and_then(|p| p.parent())
        .and_then(|p| p.parent());

    let paths = file.as_ref().map(|f| f.paths.clone()).unwrap_or_default();
    let llm = file.as_ref().and_then(|f| f.llm.clone());

    let home = std::env::var("INQUEST_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| paths.home.as_deref().map(|h| resolve_path(base, h)))
        .or_else(|| dirs::home_dir().map(|h| h.join(".inquest")))
        .context("Could not determine inquest home directory")?;

    let alerts = std::env::var("INQUEST_ALERTS")
        .ok()
        .map(PathBuf::from)
        .or_else(|| paths.alerts.as_deref().map(|a| resolve_path(base, a)))
        .unwrap_or_else(|| PathBuf::from("alerts.json"));

    let assets = std::env::var("INQUEST_ASSETS")
        .ok()
        .map(PathBuf::from)
        .or_else(|| paths.assets.as_deref().map(|a| resolve_path(base, a)))
        .unwrap_or_else(|| PathBuf::from("assets.csv"));

    let model = std::env::var("INQUEST_MODEL")
        .ok()
        .or_else(|| llm.and_then(|l| l.model))
        .unwrap_or_else(|| "mistral-small-latest".to_string());

    Ok(ResolvedConfig {
        home,
        alerts,
        assets,
        model,
        config_file,
    })
}

/// Resolved configuration, cached for the process lifetime.
pub fn get() -> Result<ResolvedConfig> {
    let cached = CONFIG.get_or_init(|| resolve().map_err(|e| format!("{e:#}")));
    cached.clone().map_err(|e| anyhow::anyhow!(e))
}

/// Directory where stepwise sessions are persisted.
pub fn sessions_dir() -> Result<PathBuf> {
    Ok(get()?.sessions_dir())
}
