use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Partitions of committed memory.  Domains are never conflated.
///
/// | Domain       | Holds                                                |
/// |--------------|------------------------------------------------------|
/// | `Factual`    | Assertions about the user's life, work, knowledge    |
/// | `Emotional`  | Observed emotions, their triggers and intensity      |
/// | `Preference` | Communication, learning, and content preferences     |
/// | `Behavioral` | Cross-turn patterns produced by conversation analysis |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryDomain {
    Factual,
    Emotional,
    Preference,
    Behavioral,
}

impl MemoryDomain {
    pub const ALL: [MemoryDomain; 4] = [
        Self::Factual,
        Self::Emotional,
        Self::Preference,
        Self::Behavioral,
    ];

    /// Canonical display label used in prompts and reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Factual => "Factual",
            Self::Emotional => "Emotional",
            Self::Preference => "Preference",
            Self::Behavioral => "Behavioral",
        }
    }

    /// Lowercase slug used for config keys and log fields.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Factual => "factual",
            Self::Emotional => "emotional",
            Self::Preference => "preference",
            Self::Behavioral => "behavioral",
        }
    }

    /// Parse a domain from its label (case-insensitive).
    ///
    /// Also accepts the plural and map names models tend to produce
    /// (e.g. "facts", "emotional_patterns", "preferences").
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "factual" | "fact" | "facts" | "factual_assertions" => Some(Self::Factual),
            "emotional" | "emotion" | "emotions" | "emotional_patterns" => Some(Self::Emotional),
            "preference" | "preferences" | "preference_model" => Some(Self::Preference),
            "behavioral" | "behavioural" | "behavior" | "behavioral_insights" => {
                Some(Self::Behavioral)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for MemoryDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// The domain an extraction agent speaks for.
///
/// `Analysis` is a consumer of domain signal: it produces behavioral records
/// and never receives cross-domain context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentDomain {
    Factual,
    Emotional,
    Preference,
    Analysis,
}

impl AgentDomain {
    pub fn slug(self) -> &'static str {
        match self {
            Self::Factual => "factual",
            Self::Emotional => "emotional",
            Self::Preference => "preference",
            Self::Analysis => "analysis",
        }
    }

    /// The memory domain this agent's records belong to.
    pub fn memory_domain(self) -> MemoryDomain {
        match self {
            Self::Factual => MemoryDomain::Factual,
            Self::Emotional => MemoryDomain::Emotional,
            Self::Preference => MemoryDomain::Preference,
            Self::Analysis => MemoryDomain::Behavioral,
        }
    }
}

/// A single extracted memory unit.
///
/// Content is fixed once an extractor produces the record; later stages may
/// only re-score it through [`MemoryRecord::with_confidence`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: Uuid,
    pub content: String,
    pub domain: MemoryDomain,
    /// Free-form classification inside the domain, e.g. `personal_info`,
    /// `communication`, `anxiety`.
    pub category: String,
    /// Name of the extractor that produced this record.
    pub agent: String,
    pub confidence: f32,
    #[serde(default)]
    pub evidence: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// SHA-256 hex of the normalized content.
    pub fingerprint: String,
}

impl MemoryRecord {
    pub fn new(
        domain: MemoryDomain,
        agent: impl Into<String>,
        category: impl Into<String>,
        content: impl Into<String>,
        confidence: f32,
        evidence: Vec<String>,
    ) -> Self {
        let content = content.into();
        let fingerprint = content_fingerprint(&content);
        Self {
            id: Uuid::new_v4(),
            content,
            domain,
            category: normalize_category(&category.into()),
            agent: agent.into(),
            confidence: clamp_confidence(confidence),
            evidence: evidence
                .into_iter()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
            created_at: Utc::now(),
            fingerprint,
        }
    }

    /// Copy of this record with a new confidence score (clamped to `[0, 1]`).
    pub fn with_confidence(&self, confidence: f32) -> Self {
        Self {
            confidence: clamp_confidence(confidence),
            ..self.clone()
        }
    }

    /// Supporting-evidence strength in `[0, 1]`; three or more items saturate.
    pub fn evidence_strength(&self) -> f32 {
        (self.evidence.len() as f32 / 3.0).min(1.0)
    }

    /// First 8 characters of the UUID, used as a compact display identifier.
    pub fn id_short(&self) -> String {
        self.id.to_string()[..8].to_string()
    }
}

/// Clamp into `[0, 1]`; non-finite scores become `0.0`.
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize_content(content: &str) -> String {
    content
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn content_fingerprint(content: &str) -> String {
    let mut h = Sha256::new();
    h.update(normalize_content(content).as_bytes());
    format!("{:x}", h.finalize())
}

fn normalize_category(category: &str) -> String {
    let slug = category
        .trim()
        .to_ascii_lowercase()
        .replace([' ', '-'], "_");
    if slug.is_empty() {
        "general".to_string()
    } else {
        slug
    }
}

/// Truncate `s` to at most `max_chars` Unicode scalar values, returning a
/// sub-slice.
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_label_roundtrip() {
        for domain in MemoryDomain::ALL {
            assert_eq!(MemoryDomain::from_label(domain.label()), Some(domain));
            assert_eq!(MemoryDomain::from_label(domain.slug()), Some(domain));
        }
        assert_eq!(
            MemoryDomain::from_label("Emotional_Patterns"),
            Some(MemoryDomain::Emotional)
        );
        assert_eq!(MemoryDomain::from_label("analysis"), None);
    }

    #[test]
    fn analysis_agents_write_behavioral_records() {
        assert_eq!(AgentDomain::Analysis.memory_domain(), MemoryDomain::Behavioral);
        assert_eq!(AgentDomain::Factual.memory_domain(), MemoryDomain::Factual);
    }

    #[test]
    fn new_record_clamps_and_normalizes() {
        let record = MemoryRecord::new(
            MemoryDomain::Factual,
            "factual",
            "Personal Info",
            "Lives in Lisbon",
            1.4,
            vec!["  I live in Lisbon ".to_string(), "   ".to_string()],
        );
        assert_eq!(record.confidence, 1.0);
        assert_eq!(record.category, "personal_info");
        assert_eq!(record.evidence, vec!["I live in Lisbon"]);
        assert_eq!(record.fingerprint.len(), 64);
    }

    #[test]
    fn nan_confidence_becomes_zero() {
        assert_eq!(clamp_confidence(f32::NAN), 0.0);
        assert_eq!(clamp_confidence(-0.2), 0.0);
    }

    #[test]
    fn fingerprint_ignores_case_and_punctuation() {
        assert_eq!(
            content_fingerprint("Prefers   remote work!"),
            content_fingerprint("prefers remote work")
        );
        assert_ne!(
            content_fingerprint("prefers remote work"),
            content_fingerprint("prefers office work")
        );
    }

    #[test]
    fn with_confidence_keeps_identity_and_content() {
        let record = MemoryRecord::new(
            MemoryDomain::Preference,
            "preference",
            "communication",
            "Likes short answers",
            0.9,
            vec![],
        );
        let rescored = record.with_confidence(0.4);
        assert_eq!(rescored.id, record.id);
        assert_eq!(rescored.content, record.content);
        assert!((rescored.confidence - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn evidence_strength_saturates() {
        let mut record = MemoryRecord::new(
            MemoryDomain::Factual,
            "factual",
            "work",
            "Works as a nurse",
            0.8,
            vec![],
        );
        assert_eq!(record.evidence_strength(), 0.0);
        record.evidence = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        assert_eq!(record.evidence_strength(), 1.0);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_str("héllo wörld", 4), "héll");
        assert_eq!(truncate_str("abc", 10), "abc");
    }
}
