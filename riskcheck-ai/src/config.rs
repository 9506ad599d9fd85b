//! Runtime settings for riskcheck-ai
//!
//! Settings are resolved from the shared [`TomlConfig`] with environment
//! overrides applied on top:
//!
//! | Variable                 | Overrides                   |
//! |--------------------------|-----------------------------|
//! | `GEMINI_API_KEY`         | `[gemini] api_key`          |
//! | `GEMINI_MODEL`           | `[gemini] model`            |
//! | `RISKCHECK_ITERATIONS`   | `[analysis] total_iterations` |
//! | `RISKCHECK_MERGE_POLICY` | `[analysis] merge_policy`   |

use crate::fusion::extraction_selector::SelectorConfig;
use crate::fusion::risk_aggregator::MergePolicy;
use crate::screener::{ScreenerConfig, SimilarityMetric};
use crate::taxonomy::ReferencePaths;
use riskcheck_common::config::{resolve_root_folder, TomlConfig};
use riskcheck_common::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";
pub const MODEL_ENV_VAR: &str = "GEMINI_MODEL";
pub const ITERATIONS_ENV_VAR: &str = "RISKCHECK_ITERATIONS";
pub const MERGE_POLICY_ENV_VAR: &str = "RISKCHECK_MERGE_POLICY";

/// Judgement service connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct GeminiSettings {
    /// `None` runs the client in offline stub mode
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub requests_per_minute: u32,
}

/// Fully resolved settings for one process
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base folder for project workspaces and artifacts
    pub root_folder: PathBuf,
    /// Risk judgement runs per project
    pub total_iterations: usize,
    pub merge_policy: MergePolicy,
    pub screener: ScreenerConfig,
    pub selector: SelectorConfig,
    pub references: ReferencePaths,
    pub gemini: GeminiSettings,
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

impl Settings {
    /// Resolve settings from TOML values only (no environment overrides)
    pub fn from_toml(config: &TomlConfig, root_folder: PathBuf) -> Result<Self> {
        let analysis = &config.analysis;

        if analysis.total_iterations == 0 {
            return Err(Error::Config(
                "total_iterations must be at least 1".to_string(),
            ));
        }
        if analysis.quorum_threshold == 0 {
            return Err(Error::Config(
                "quorum_threshold must be at least 1".to_string(),
            ));
        }

        let merge_policy = MergePolicy::from_name(&analysis.merge_policy, analysis.quorum_threshold)
            .map_err(Error::Config)?;
        let metric: SimilarityMetric = analysis
            .similarity_metric
            .parse()
            .map_err(Error::Config)?;

        Ok(Self {
            root_folder,
            total_iterations: analysis.total_iterations,
            merge_policy,
            screener: ScreenerConfig {
                keyword_scan: analysis.keyword_scan,
                similarity_scan: analysis.similarity_scan,
                metric,
            },
            selector: SelectorConfig {
                near_identical_ratio: analysis.near_identical_ratio,
                preview_chars: analysis.arbitration_preview_chars,
            },
            references: ReferencePaths {
                taxonomy: config.references.taxonomy_path.clone(),
                incidents: config.references.incident_path.clone(),
                legal: config.references.legal_path.clone(),
                social_cases: config.references.social_case_path.clone(),
            },
            gemini: GeminiSettings {
                api_key: config
                    .gemini
                    .api_key
                    .clone()
                    .filter(|k| is_valid_key(k)),
                model: config.gemini.model.clone(),
                timeout_secs: config.gemini.timeout_secs,
                requests_per_minute: config.gemini.requests_per_minute,
            },
        })
    }

    /// Resolve settings with environment overrides
    ///
    /// **Priority:** ENV → TOML → compiled defaults. The root folder follows
    /// CLI → `RISKCHECK_ROOT` → TOML → OS default.
    pub fn resolve(config: &TomlConfig, root_override: Option<&Path>) -> Result<Self> {
        let mut config = config.clone();

        if let Ok(key) = std::env::var(API_KEY_ENV_VAR) {
            if is_valid_key(&key) {
                info!("Gemini API key loaded from environment variable");
                config.gemini.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var(MODEL_ENV_VAR) {
            if !model.trim().is_empty() {
                config.gemini.model = model.trim().to_string();
            }
        }
        if let Ok(raw) = std::env::var(ITERATIONS_ENV_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(n) => config.analysis.total_iterations = n,
                Err(_) => warn!("Ignoring invalid {}={}", ITERATIONS_ENV_VAR, raw),
            }
        }
        if let Ok(policy) = std::env::var(MERGE_POLICY_ENV_VAR) {
            if !policy.trim().is_empty() {
                config.analysis.merge_policy = policy.trim().to_string();
            }
        }

        let root_folder = resolve_root_folder(root_override, &config);
        let settings = Self::from_toml(&config, root_folder)?;

        if settings.gemini.api_key.is_none() {
            warn!("No Gemini API key configured; judgement service runs in stub mode");
        }
        info!(
            iterations = settings.total_iterations,
            merge_policy = settings.merge_policy.name(),
            model = %settings.gemini.model,
            "Settings resolved"
        );
        Ok(settings)
    }

    /// Parent directory of the per-project workspaces
    pub fn projects_dir(&self) -> PathBuf {
        self.root_folder.join("projects")
    }
}
