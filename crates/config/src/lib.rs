use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

// ── Provider selection ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub ollama_model: String,
    pub openrouter_model: String,
    /// Base URL for the Ollama API.  Overridden at runtime by the
    /// `OLLAMA_BASE_URL` environment variable when set.
    pub ollama_base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            ollama_model: "llama3.1:8b".to_string(),
            openrouter_model: "openai/gpt-4o-mini".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
        }
    }
}

// ── Extraction / consensus tuning ─────────────────────────────────────────────

/// Reliability weights for one memory domain.
///
/// During weighted-average conflict resolution each agent's vote is
/// `confidence * self.confidence + evidence_strength * self.evidence`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityWeights {
    pub confidence: f32,
    pub evidence: f32,
}

impl ReliabilityWeights {
    pub const fn new(confidence: f32, evidence: f32) -> Self {
        Self { confidence, evidence }
    }
}

impl Default for ReliabilityWeights {
    fn default() -> Self {
        Self::new(0.5, 0.5)
    }
}

fn default_weights() -> BTreeMap<String, ReliabilityWeights> {
    BTreeMap::from([
        ("factual".to_string(), ReliabilityWeights::new(0.4, 0.6)),
        ("emotional".to_string(), ReliabilityWeights::new(0.5, 0.5)),
        ("preference".to_string(), ReliabilityWeights::new(0.7, 0.3)),
        ("behavioral".to_string(), ReliabilityWeights::new(0.5, 0.5)),
    ])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Deadline for the parallel extraction phase.  Agents that have not
    /// finished when it expires are excluded from the call.
    pub agent_timeout_secs: u64,
    /// Extractors registered by the CLI, in registration order.  Order is
    /// significant: the default conflict resolution picks the first agent.
    pub enabled_agents: Vec<String>,
    /// Records below this confidence go to the agent's rejection log.
    pub min_record_confidence: f32,
    /// Number of most recent reasoning traces copied into each agent output.
    pub trace_window: usize,
    /// Confidence spread above which equivalent records are in conflict.
    pub confidence_conflict_threshold: f32,
    /// Token-overlap ratio at which two records describe the same content.
    pub similarity_threshold: f32,
    /// Minimum confidence a fact needs when the evidence bar is `high`.
    pub high_evidence_min_confidence: f32,
    /// Minimum confidence a fact needs when the evidence bar is `medium`.
    pub medium_evidence_min_confidence: f32,
    /// Per-domain reliability weights keyed by domain slug.
    pub weights: BTreeMap<String, ReliabilityWeights>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            agent_timeout_secs: 30,
            enabled_agents: vec![
                "factual".to_string(),
                "emotional".to_string(),
                "preference".to_string(),
                "analysis".to_string(),
            ],
            min_record_confidence: 0.3,
            trace_window: 10,
            confidence_conflict_threshold: 0.3,
            similarity_threshold: 0.6,
            high_evidence_min_confidence: 0.7,
            medium_evidence_min_confidence: 0.5,
            weights: default_weights(),
        }
    }
}

impl ExtractionConfig {
    /// Weights for `domain`, falling back to an even split for unknown slugs.
    pub fn weights_for(&self, domain: &str) -> ReliabilityWeights {
        self.weights.get(domain).copied().unwrap_or_default()
    }
}

// ── Session history ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreKind {
    #[default]
    Memory,
    Jsonl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub session_store: SessionStoreKind,
    /// Path of the JSONL session log, used when `session_store = "jsonl"`.
    pub session_log_path: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            session_store: SessionStoreKind::Memory,
            session_log_path: ".concord/sessions.jsonl".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub extraction: ExtractionConfig,
    pub memory: MemoryConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        config.apply_env_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to resolve variables.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("OLLAMA_BASE_URL").filter(|v| !v.is_empty()) {
            self.llm.provider = "ollama".to_string();
            self.llm.ollama_base_url = value;
        }

        if let Some(level) = lookup("CONCORD_LOG_LEVEL").filter(|v| !v.is_empty()) {
            self.telemetry.log_level = level;
        }
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    pub fn active_model(&self) -> &str {
        if self.llm.provider.eq_ignore_ascii_case("openrouter") {
            &self.llm.openrouter_model
        } else {
            &self.llm.ollama_model
        }
    }

    pub fn agent_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.extraction.agent_timeout_secs.max(1))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
