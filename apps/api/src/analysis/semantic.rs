//! Semantic Verifier — how well a context span grounds a skill phrase, in [0, 1].
//!
//! The backend is a capability object chosen once at startup:
//! - `LexicalOverlap`: deterministic term-overlap scoring, no model needed
//! - `EmbeddingBackend`: cosine of sentence embeddings, rescaled `(cos + 1) / 2`
//! - `CrossEncoderBackend`: calibrated relevance probability from a reranker
//!
//! If a model backend fails its startup probe the verifier keeps the lexical
//! path for the rest of the process. Failures are never surfaced per call.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analysis::models::clamp01;
use crate::inference_client::{cosine, InferenceClient, InferenceError};

/// Floor applied to lexical scores so "no overlap" does not read as a hard non-match.
pub const LEXICAL_FLOOR: f64 = 0.05;

const PROBE_SKILL: &str = "Python";
const PROBE_SNIPPET: &str = "Experienced Python developer";

// ────────────────────────────────────────────────────────────────────────────
// Backend selection
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    Lexical,
    #[default]
    Embedding,
    CrossEncoder,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Lexical => "lexical",
            BackendKind::Embedding => "embedding",
            BackendKind::CrossEncoder => "cross-encoder",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "lexical" | "none" => Ok(BackendKind::Lexical),
            "embedding" => Ok(BackendKind::Embedding),
            "cross-encoder" | "crossencoder" => Ok(BackendKind::CrossEncoder),
            other => Err(format!(
                "unknown semantic backend '{other}' (expected lexical, embedding or cross-encoder)"
            )),
        }
    }
}

/// Inputs needed to build the semantic backend at startup.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub kind: BackendKind,
    pub model_name: String,
    pub inference_url: String,
    pub timeout: Duration,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// A way of scoring skill/context relevance. Implementations may return values
/// slightly outside [0, 1]; the verifier clamps.
#[async_trait]
pub trait SemanticBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn relevance(&self, skill: &str, snippet: &str) -> Result<f64, InferenceError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LexicalOverlap — always available
// ────────────────────────────────────────────────────────────────────────────

pub struct LexicalOverlap;

impl LexicalOverlap {
    /// Share of the skill's terms present in the snippet, floored at
    /// [`LEXICAL_FLOOR`]. 0.0 when the skill has no terms.
    pub fn score(skill: &str, snippet: &str) -> f64 {
        let skill_terms = terms(skill);
        if skill_terms.is_empty() {
            return 0.0;
        }
        let snippet_terms = terms(snippet);
        let overlap = skill_terms.intersection(&snippet_terms).count() as f64
            / skill_terms.len() as f64;
        overlap.clamp(LEXICAL_FLOOR, 1.0)
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

#[async_trait]
impl SemanticBackend for LexicalOverlap {
    fn name(&self) -> &'static str {
        "lexical"
    }

    async fn relevance(&self, skill: &str, snippet: &str) -> Result<f64, InferenceError> {
        Ok(Self::score(skill, snippet))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Model-backed implementations
// ────────────────────────────────────────────────────────────────────────────

/// Sentence-embedding similarity via the inference server.
pub struct EmbeddingBackend {
    client: InferenceClient,
}

impl EmbeddingBackend {
    pub fn new(client: InferenceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SemanticBackend for EmbeddingBackend {
    fn name(&self) -> &'static str {
        "embedding"
    }

    async fn relevance(&self, skill: &str, snippet: &str) -> Result<f64, InferenceError> {
        let vectors = self.client.embed(&[skill, snippet]).await?;
        let cos = cosine(&vectors[0], &vectors[1]);
        Ok((cos + 1.0) / 2.0)
    }
}

/// Cross-encoder relevance classifier via the inference server's rerank route.
pub struct CrossEncoderBackend {
    client: InferenceClient,
}

impl CrossEncoderBackend {
    pub fn new(client: InferenceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SemanticBackend for CrossEncoderBackend {
    fn name(&self) -> &'static str {
        "cross-encoder"
    }

    async fn relevance(&self, skill: &str, snippet: &str) -> Result<f64, InferenceError> {
        let scores = self.client.rerank(skill, &[snippet]).await?;
        scores
            .iter()
            .find(|s| s.index == 0)
            .map(|s| s.score)
            .ok_or_else(|| InferenceError::Shape("rerank response has no entry for index 0".into()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Verifier
// ────────────────────────────────────────────────────────────────────────────

/// What the verifier ended up running with, reported to callers as a note.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendCapability {
    pub requested: BackendKind,
    pub active: &'static str,
    pub degraded: bool,
    pub note: Option<String>,
}

/// Scores skill grounding through the backend chosen at startup.
/// Shared read-only across requests as `Arc<SemanticVerifier>`.
pub struct SemanticVerifier {
    backend: Arc<dyn SemanticBackend>,
    model_name: String,
    capability: BackendCapability,
}

impl SemanticVerifier {
    /// Wraps an already-built backend.
    pub fn new(
        backend: Arc<dyn SemanticBackend>,
        requested: BackendKind,
        model_name: impl Into<String>,
    ) -> Self {
        let capability = BackendCapability {
            requested,
            active: backend.name(),
            degraded: false,
            note: None,
        };
        Self {
            backend,
            model_name: model_name.into(),
            capability,
        }
    }

    /// Verifier that only ever uses lexical overlap.
    pub fn lexical() -> Self {
        Self::new(Arc::new(LexicalOverlap), BackendKind::Lexical, "lexical-overlap")
    }

    /// Builds the configured backend and probes it once. Any failure leaves the
    /// verifier on the lexical path for the lifetime of the process.
    pub async fn initialize(settings: &BackendSettings) -> Self {
        if settings.kind == BackendKind::Lexical {
            info!("Semantic backend: lexical overlap (configured)");
            return Self::lexical();
        }

        let client = match InferenceClient::new(&settings.inference_url, settings.timeout) {
            Ok(client) => client,
            Err(e) => return Self::downgraded(settings, e.to_string()),
        };

        let endpoint = client.base_url().to_string();
        let backend: Arc<dyn SemanticBackend> = match settings.kind {
            BackendKind::CrossEncoder => Arc::new(CrossEncoderBackend::new(client)),
            _ => Arc::new(EmbeddingBackend::new(client)),
        };

        match backend.relevance(PROBE_SKILL, PROBE_SNIPPET).await {
            Ok(score) if score.is_finite() => {
                info!(
                    "Semantic backend: {} via {} (probe score {:.3})",
                    settings.kind, endpoint, score
                );
                Self::new(backend, settings.kind, settings.model_name.clone())
            }
            Ok(score) => Self::downgraded(settings, format!("probe returned {score}")),
            Err(e) => Self::downgraded(settings, e.to_string()),
        }
    }

    fn downgraded(settings: &BackendSettings, reason: String) -> Self {
        warn!(
            "Semantic backend '{}' unavailable ({}); using lexical overlap for this process",
            settings.kind, reason
        );
        let mut verifier = Self::lexical();
        verifier.capability = BackendCapability {
            requested: settings.kind,
            active: "lexical",
            degraded: true,
            note: Some(format!(
                "semantic backend '{}' unavailable ({reason}); using lexical overlap",
                settings.kind
            )),
        };
        verifier
    }

    pub fn capability(&self) -> &BackendCapability {
        &self.capability
    }

    /// Model identifier reported in analysis responses.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Relevance of `snippet` to `skill` in [0, 1]. Empty snippets score 0.0
    /// regardless of backend.
    pub async fn similarity(&self, skill: &str, snippet: &str) -> f64 {
        if snippet.trim().is_empty() {
            return 0.0;
        }
        match self.backend.relevance(skill, snippet).await {
            Ok(score) => clamp01(score),
            Err(e) => {
                warn!(
                    "Semantic backend '{}' failed for skill '{}': {}; scoring lexically",
                    self.backend.name(),
                    skill,
                    e
                );
                clamp01(LexicalOverlap::score(skill, snippet))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::post,
        Json, Router,
    };
    use serde_json::json;

    struct FixedScore(f64);

    #[async_trait]
    impl SemanticBackend for FixedScore {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn relevance(&self, _skill: &str, _snippet: &str) -> Result<f64, InferenceError> {
            Ok(self.0)
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl SemanticBackend for AlwaysFails {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn relevance(&self, _skill: &str, _snippet: &str) -> Result<f64, InferenceError> {
            Err(InferenceError::EmptyResponse)
        }
    }

    fn verifier_with(backend: impl SemanticBackend + 'static) -> SemanticVerifier {
        SemanticVerifier::new(Arc::new(backend), BackendKind::Embedding, "test-model")
    }

    #[test]
    fn test_lexical_full_overlap() {
        assert_eq!(LexicalOverlap::score("Python", "experienced python developer"), 1.0);
    }

    #[test]
    fn test_lexical_partial_overlap() {
        let score = LexicalOverlap::score("machine learning", "deep learning research");
        assert!((score - 0.5).abs() < 1e-9, "score was {score}");
    }

    #[test]
    fn test_lexical_no_overlap_is_floored() {
        assert_eq!(LexicalOverlap::score("Rust", "python sql"), LEXICAL_FLOOR);
    }

    #[test]
    fn test_lexical_empty_skill_is_zero() {
        assert_eq!(LexicalOverlap::score("   ", "python sql"), 0.0);
    }

    #[tokio::test]
    async fn test_empty_snippet_is_zero_for_any_backend() {
        assert_eq!(SemanticVerifier::lexical().similarity("Python", "").await, 0.0);
        assert_eq!(verifier_with(FixedScore(0.9)).similarity("Python", "  \n").await, 0.0);
        assert_eq!(verifier_with(AlwaysFails).similarity("Python", "").await, 0.0);
    }

    #[tokio::test]
    async fn test_backend_score_is_clamped() {
        assert_eq!(verifier_with(FixedScore(1.4)).similarity("Go", "go code").await, 1.0);
        assert_eq!(verifier_with(FixedScore(-0.2)).similarity("Go", "go code").await, 0.0);
        assert_eq!(verifier_with(FixedScore(f64::NAN)).similarity("Go", "go code").await, 0.0);
    }

    #[tokio::test]
    async fn test_call_failure_falls_back_to_lexical() {
        let verifier = verifier_with(AlwaysFails);
        let score = verifier
            .similarity("Python", "experienced python developer")
            .await;
        assert_eq!(score, 1.0);
        assert!(!verifier.capability().degraded);
    }

    #[tokio::test]
    async fn test_lexical_configuration_skips_probe() {
        let settings = BackendSettings {
            kind: BackendKind::Lexical,
            model_name: "unused".to_string(),
            inference_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_millis(200),
        };
        let verifier = SemanticVerifier::initialize(&settings).await;
        assert_eq!(verifier.capability().active, "lexical");
        assert!(!verifier.capability().degraded);
        assert!(verifier.capability().note.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_model_server_downgrades_to_lexical() {
        let settings = BackendSettings {
            kind: BackendKind::CrossEncoder,
            model_name: "cross-encoder/ms-marco-MiniLM-L-6-v2".to_string(),
            inference_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_millis(200),
        };
        let verifier = SemanticVerifier::initialize(&settings).await;
        let capability = verifier.capability();
        assert!(capability.degraded);
        assert_eq!(capability.active, "lexical");
        assert_eq!(capability.requested, BackendKind::CrossEncoder);
        assert!(capability.note.as_deref().unwrap_or("").contains("cross-encoder"));
        assert_eq!(
            verifier.similarity("Python", "experienced python developer").await,
            1.0
        );
    }

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!("cross_encoder".parse::<BackendKind>().unwrap(), BackendKind::CrossEncoder);
        assert_eq!("EMBEDDING".parse::<BackendKind>().unwrap(), BackendKind::Embedding);
        assert_eq!("lexical".parse::<BackendKind>().unwrap(), BackendKind::Lexical);
        assert!("gpt".parse::<BackendKind>().is_err());
    }

    /// Serves `router` on an ephemeral local port and returns its base URL.
    async fn serve_model(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn model_settings(kind: BackendKind, inference_url: String) -> BackendSettings {
        BackendSettings {
            kind,
            model_name: "test-model".to_string(),
            inference_url,
            timeout: Duration::from_secs(5),
        }
    }

    async fn flaky_rerank(State(calls): State<Arc<AtomicUsize>>) -> Response {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            (StatusCode::SERVICE_UNAVAILABLE, "model loading").into_response()
        } else {
            Json(json!([{ "index": 0, "score": 0.83 }])).into_response()
        }
    }

    #[tokio::test]
    async fn test_embedding_backend_rescales_cosine() {
        // Orthogonal embeddings: cos = 0 → (0 + 1) / 2
        let router = Router::new().route(
            "/embed",
            post(|| async { Json(json!([[1.0, 0.0], [0.0, 1.0]])) }),
        );
        let url = serve_model(router).await;

        let verifier = SemanticVerifier::initialize(&model_settings(BackendKind::Embedding, url)).await;
        let capability = verifier.capability();
        assert_eq!(capability.active, "embedding");
        assert!(!capability.degraded);
        assert!(capability.note.is_none());
        assert_eq!(verifier.model_name(), "test-model");

        let score = verifier.similarity("Python", "built python services").await;
        assert!((score - 0.5).abs() < 1e-9, "score was {score}");
    }

    #[tokio::test]
    async fn test_cross_encoder_retries_busy_server() {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route("/rerank", post(flaky_rerank))
            .with_state(calls.clone());
        let url = serve_model(router).await;

        let verifier =
            SemanticVerifier::initialize(&model_settings(BackendKind::CrossEncoder, url)).await;
        let capability = verifier.capability();
        assert_eq!(capability.active, "cross-encoder");
        assert!(!capability.degraded);

        let score = verifier.similarity("Python", "built python services").await;
        assert!((score - 0.83).abs() < 1e-9, "score was {score}");
        // 503 + probe retry + scoring call
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cross_encoder_missing_index_downgrades() {
        let router = Router::new().route(
            "/rerank",
            post(|| async { Json(json!([{ "index": 4, "score": 0.9 }])) }),
        );
        let url = serve_model(router).await;

        let verifier =
            SemanticVerifier::initialize(&model_settings(BackendKind::CrossEncoder, url)).await;
        assert!(verifier.capability().degraded);
        assert_eq!(verifier.capability().active, "lexical");
    }
}
