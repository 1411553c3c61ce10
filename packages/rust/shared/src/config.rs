//! Application configuration for Docuify.
//!
//! User config lives at `~/.docuify/docuify.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocuifyError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docuify.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docuify";

// ---------------------------------------------------------------------------
// Config structs (matching docuify.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Item path filtering.
    #[serde(default)]
    pub filter: FilterConfig,

    /// GitHub source settings.
    #[serde(default)]
    pub github: GithubDefaults,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Number of concurrent content loads during preloading.
    #[serde(default = "default_preload_concurrency")]
    pub preload_concurrency: usize,

    /// Keep preloaded content in the preload report.
    #[serde(default)]
    pub keep_content: bool,

    /// Run the front-matter plugin on builds.
    #[serde(default = "default_true")]
    pub frontmatter: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            preload_concurrency: default_preload_concurrency(),
            keep_content: false,
            frontmatter: true,
        }
    }
}

fn default_preload_concurrency() -> usize {
    10
}
fn default_true() -> bool {
    true
}

/// `[filter]` section. Glob patterns matched against item paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Item include patterns (if non-empty, a path must match at least one).
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Item exclude patterns (a matching path is always dropped).
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl FilterConfig {
    pub fn is_empty(&self) -> bool {
        self.include_patterns.is_empty() && self.exclude_patterns.is_empty()
    }
}

/// `[github]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubDefaults {
    /// REST API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Raw content base URL.
    #[serde(default = "default_raw_base")]
    pub raw_base: String,

    /// Value of the `X-GitHub-Api-Version` header.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Name of the env var holding the token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Tree entry fields copied into item metadata.
    #[serde(default = "default_metadata_fields")]
    pub metadata_fields: Vec<String>,
}

impl Default for GithubDefaults {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            raw_base: default_raw_base(),
            api_version: default_api_version(),
            token_env: default_token_env(),
            metadata_fields: default_metadata_fields(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.github.com".into()
}
fn default_raw_base() -> String {
    "https://raw.githubusercontent.com".into()
}
fn default_api_version() -> String {
    "2022-11-28".into()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_metadata_fields() -> Vec<String> {
    vec!["sha".into()]
}

// ---------------------------------------------------------------------------
// Preload config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime preload configuration, merged from config file + CLI flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadConfig {
    /// Maximum number of content loads in flight at once.
    pub concurrency: usize,
    /// Retain the loaded text in the preload report.
    pub keep_content: bool,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            concurrency: default_preload_concurrency(),
            keep_content: false,
        }
    }
}

impl From<&AppConfig> for PreloadConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.defaults.preload_concurrency,
            keep_content: config.defaults.keep_content,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docuify/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocuifyError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docuify/docuify.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocuifyError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        DocuifyError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    for base in [&config.github.api_base, &config.github.raw_base] {
        url::Url::parse(base)
            .map_err(|e| DocuifyError::config(format!("invalid github base url '{base}': {e}")))?;
    }

    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocuifyError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocuifyError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocuifyError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the GitHub token from the env var named in the config.
pub fn resolve_token(config: &AppConfig) -> Result<String> {
    let var_name = &config.github.token_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(DocuifyError::config(format!(
            "GitHub token not found. Set the {var_name} environment variable."
        ))),
    }
}
