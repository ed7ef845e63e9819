use std::sync::Arc;

use crate::analysis::pipeline::AnalysisSettings;
use crate::analysis::semantic::SemanticVerifier;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Pipeline tunables derived from `config` once at startup.
    pub settings: AnalysisSettings,
    /// Semantic backend chosen and probed at startup; read-only afterwards.
    pub verifier: Arc<SemanticVerifier>,
}

impl AppState {
    pub fn new(config: Config, verifier: SemanticVerifier) -> Self {
        let settings = config.analysis_settings();
        Self {
            config,
            settings,
            verifier: Arc::new(verifier),
        }
    }
}
