use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::analysis::confidence::{ScoringPolicy, SpatialWeights};
use crate::analysis::context_window::DEFAULT_CONTEXT_RADIUS;
use crate::analysis::matching::NoMatchPolicy;
use crate::analysis::pipeline::{AnalysisSettings, DEGRADED_SPATIAL_WEIGHT, EVIDENCE_SNIPPET_CHARS};
use crate::analysis::sections::{SectionThresholds, FOOTER_RATIO_INTEGRITY, HEADER_RATIO};
use crate::analysis::semantic::{BackendKind, BackendSettings};

const DEFAULT_SPATIAL_WEIGHTS: &str = "header=1.0,body=0.75,footer=0.35";
const DEFAULT_MODEL_NAME: &str = "sentence-transformers/all-MiniLM-L6-v2";
const DEFAULT_REQUIRED_SKILLS: &str = "Python,FastAPI,React,SQL,Django";

/// Application configuration loaded from environment variables.
/// Every variable is optional; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub context_window_size: usize,
    pub header_ratio: f64,
    pub footer_ratio: f64,
    pub spatial_weights: SpatialWeights,
    pub scoring_policy: ScoringPolicy,
    pub no_match_policy: NoMatchPolicy,
    pub degraded_spatial_weight: f64,
    pub evidence_snippet_chars: usize,
    pub semantic_backend: BackendKind,
    pub semantic_model_name: String,
    pub inference_url: String,
    pub inference_timeout_secs: u64,
    pub default_required_skills: String,
    pub max_upload_bytes: usize,
    /// Allowed CORS origins; `*` allows any.
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            rust_log: "info".to_string(),
            context_window_size: DEFAULT_CONTEXT_RADIUS,
            header_ratio: HEADER_RATIO,
            footer_ratio: FOOTER_RATIO_INTEGRITY,
            spatial_weights: SpatialWeights::default(),
            scoring_policy: ScoringPolicy::default(),
            no_match_policy: NoMatchPolicy::default(),
            degraded_spatial_weight: DEGRADED_SPATIAL_WEIGHT,
            evidence_snippet_chars: EVIDENCE_SNIPPET_CHARS,
            semantic_backend: BackendKind::default(),
            semantic_model_name: DEFAULT_MODEL_NAME.to_string(),
            inference_url: "http://localhost:8081".to_string(),
            inference_timeout_secs: 30,
            default_required_skills: DEFAULT_REQUIRED_SKILLS.to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, so tests need not touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let spatial_weights = match get("SPATIAL_WEIGHTS") {
            Some(raw) => SpatialWeights::parse(&raw)
                .map_err(anyhow::Error::msg)
                .context("SPATIAL_WEIGHTS is malformed")?,
            None => SpatialWeights::parse(DEFAULT_SPATIAL_WEIGHTS).map_err(anyhow::Error::msg)?,
        };

        let config = Config {
            port: parse_or(&get, "PORT", defaults.port)?,
            rust_log: get("RUST_LOG").unwrap_or(defaults.rust_log),
            context_window_size: parse_or(&get, "CONTEXT_WINDOW_SIZE", defaults.context_window_size)?,
            header_ratio: parse_or(&get, "HEADER_RATIO", defaults.header_ratio)?,
            footer_ratio: parse_or(&get, "FOOTER_RATIO", defaults.footer_ratio)?,
            spatial_weights,
            scoring_policy: parse_or(&get, "SCORING_POLICY", defaults.scoring_policy)?,
            no_match_policy: parse_or(&get, "NO_MATCH_POLICY", defaults.no_match_policy)?,
            degraded_spatial_weight: parse_or(
                &get,
                "DEGRADED_SPATIAL_WEIGHT",
                defaults.degraded_spatial_weight,
            )?,
            evidence_snippet_chars: parse_or(
                &get,
                "EVIDENCE_SNIPPET_CHARS",
                defaults.evidence_snippet_chars,
            )?,
            semantic_backend: parse_or(&get, "SEMANTIC_BACKEND", defaults.semantic_backend)?,
            semantic_model_name: get("SEMANTIC_MODEL_NAME").unwrap_or(defaults.semantic_model_name),
            inference_url: get("INFERENCE_URL").unwrap_or(defaults.inference_url),
            inference_timeout_secs: parse_or(
                &get,
                "INFERENCE_TIMEOUT_SECS",
                defaults.inference_timeout_secs,
            )?,
            default_required_skills: get("DEFAULT_REQUIRED_SKILLS")
                .unwrap_or(defaults.default_required_skills),
            max_upload_bytes: parse_or(&get, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            cors_origins: get("CORS_ORIGINS")
                .map(|raw| split_list(&raw))
                .filter(|origins| !origins.is_empty())
                .unwrap_or(defaults.cors_origins),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("HEADER_RATIO", self.header_ratio),
            ("FOOTER_RATIO", self.footer_ratio),
            ("DEGRADED_SPATIAL_WEIGHT", self.degraded_spatial_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{key} must be within [0, 1], got {value}");
            }
        }
        if self.header_ratio >= self.footer_ratio {
            bail!(
                "HEADER_RATIO ({}) must be below FOOTER_RATIO ({})",
                self.header_ratio,
                self.footer_ratio
            );
        }
        if self.evidence_snippet_chars == 0 {
            bail!("EVIDENCE_SNIPPET_CHARS must be positive");
        }
        Ok(())
    }

    pub fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            context_radius: self.context_window_size,
            thresholds: SectionThresholds {
                header_ratio: self.header_ratio,
                footer_ratio: self.footer_ratio,
            },
            spatial_weights: self.spatial_weights.clone(),
            scoring_policy: self.scoring_policy,
            no_match_policy: self.no_match_policy,
            degraded_spatial_weight: self.degraded_spatial_weight,
            snippet_chars: self.evidence_snippet_chars,
        }
    }

    pub fn backend_settings(&self) -> BackendSettings {
        BackendSettings {
            kind: self.semantic_backend,
            model_name: self.semantic_model_name.clone(),
            inference_url: self.inference_url.clone(),
            timeout: Duration::from_secs(self.inference_timeout_secs),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
