//! Configuration loading and root folder resolution
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `RISKCHECK_CONFIG` environment variable
//! 3. `<config_dir>/riskcheck/config.toml`
//! 4. Compiled defaults (a missing file is never fatal)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "RISKCHECK_CONFIG";

/// Environment variable naming the root folder
pub const ROOT_ENV_VAR: &str = "RISKCHECK_ROOT";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Base folder for project workspaces and artifacts
    pub root_folder: Option<PathBuf>,
    pub analysis: AnalysisSection,
    pub references: ReferencesSection,
    pub gemini: GeminiSection,
    pub logging: LoggingConfig,
}

/// `[analysis]` section: consensus and screening knobs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisSection {
    /// Number of risk judgement runs per project
    pub total_iterations: usize,
    /// "quorum" or "unconditional"
    pub merge_policy: String,
    /// Minimum number of runs that must observe a tag under quorum merge
    pub quorum_threshold: usize,
    /// Characters of each candidate shown to the arbitration prompt
    pub arbitration_preview_chars: usize,
    /// Relative length delta under which run 1 is kept without arbitration
    pub near_identical_ratio: f64,
    pub keyword_scan: bool,
    pub similarity_scan: bool,
    /// "matching_blocks", "levenshtein" or "sorensen_dice"
    pub similarity_metric: String,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            total_iterations: 3,
            merge_policy: "quorum".to_string(),
            quorum_threshold: 2,
            arbitration_preview_chars: 3000,
            near_identical_ratio: 0.05,
            keyword_scan: true,
            similarity_scan: true,
            similarity_metric: "matching_blocks".to_string(),
        }
    }
}

/// `[references]` section: read-only reference data sources
///
/// Tables are read as UTF-8 CSV. Spreadsheet workbooks (`.xlsx`, `.xls`,
/// `.ods`) are rejected with a warning and load as empty; export the sheet
/// to CSV first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReferencesSection {
    /// Two-level tag taxonomy table (CSV)
    pub taxonomy_path: Option<PathBuf>,
    /// Historical incident corpus (CSV)
    pub incident_path: Option<PathBuf>,
    /// Free-text legal reference corpus (plain UTF-8 text)
    pub legal_path: Option<PathBuf>,
    /// Social sensitivity case table (CSV), digest only
    pub social_case_path: Option<PathBuf>,
}

/// `[gemini]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeminiSection {
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub requests_per_minute: u32,
}

impl Default for GeminiSection {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash-exp".to_string(),
            timeout_secs: 120,
            requests_per_minute: 30,
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Resolve the config file path following the priority order above
///
/// Returns `None` when no candidate exists; callers fall back to defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("riskcheck").join("config.toml"))
        .filter(|p| p.exists())
}

/// Load TOML config from `path`
///
/// A missing file logs a warning and yields defaults. A file that exists but
/// fails to parse is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found: {} (using compiled defaults)",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolve and load configuration in one step
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) => load_toml_config(&path),
        None => {
            info!("No config file found, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Write TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Root folder resolution:
/// 1. Command-line argument
/// 2. `RISKCHECK_ROOT` environment variable
/// 3. TOML `root_folder`
/// 4. OS-dependent default
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("riskcheck"))
        .unwrap_or_else(|| PathBuf::from("./riskcheck_data"))
}
