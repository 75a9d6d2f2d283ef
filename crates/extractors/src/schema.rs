//! Fixed reply schemas, one per extractor domain.

use serde::{Deserialize, Serialize};

use concord_memory::{AgentDomain, MemoryDomain, MemoryRecord};

/// Confidence given to behavioral patterns, which the analysis schema does
/// not score individually.
pub const BEHAVIORAL_PATTERN_CONFIDENCE: f32 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactItem {
    pub content: String,
    #[serde(default = "general")]
    pub category: String,
    pub confidence: f32,
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactExtractionOutput {
    #[serde(default)]
    pub facts: Vec<FactItem>,
    #[serde(default)]
    pub extraction_notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionItem {
    pub emotion: String,
    #[serde(default)]
    pub intensity: f32,
    #[serde(default)]
    pub triggers: Vec<String>,
    pub confidence: f32,
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionExtractionOutput {
    #[serde(default)]
    pub emotional_patterns: Vec<EmotionItem>,
    #[serde(default)]
    pub overall_mood: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceItem {
    #[serde(default = "general")]
    pub category: String,
    pub preference_value: String,
    #[serde(default)]
    pub intensity: f32,
    pub confidence: f32,
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreferenceExtractionOutput {
    #[serde(default)]
    pub preferences: Vec<PreferenceItem>,
    #[serde(default)]
    pub extraction_notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationAnalysisOutput {
    pub session_summary: String,
    #[serde(default)]
    pub key_insights: Vec<String>,
    #[serde(default = "balanced")]
    pub suggested_personality: String,
    #[serde(default)]
    pub behavioral_patterns: Vec<String>,
}

fn general() -> String {
    "general".to_string()
}

fn balanced() -> String {
    "balanced".to_string()
}

/// A parsed extractor reply, tagged by domain.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainOutput {
    Factual(FactExtractionOutput),
    Emotional(EmotionExtractionOutput),
    Preference(PreferenceExtractionOutput),
    Analysis(ConversationAnalysisOutput),
}

impl DomainOutput {
    /// Parse a raw model reply into the schema for `domain`.
    pub fn parse(domain: AgentDomain, reply: &str) -> Option<Self> {
        use concord_llm::extract_json_output as parse;
        match domain {
            AgentDomain::Factual => parse(reply).map(Self::Factual),
            AgentDomain::Emotional => parse(reply).map(Self::Emotional),
            AgentDomain::Preference => parse(reply).map(Self::Preference),
            AgentDomain::Analysis => parse(reply).map(Self::Analysis),
        }
    }

    pub fn domain(&self) -> AgentDomain {
        match self {
            Self::Factual(_) => AgentDomain::Factual,
            Self::Emotional(_) => AgentDomain::Emotional,
            Self::Preference(_) => AgentDomain::Preference,
            Self::Analysis(_) => AgentDomain::Analysis,
        }
    }

    /// Convert the reply into memory records attributed to `agent`.
    ///
    /// Items with empty content are skipped.
    pub fn into_records(self, agent: &str) -> Vec<MemoryRecord> {
        match self {
            Self::Factual(out) => out
                .facts
                .into_iter()
                .filter(|f| !f.content.trim().is_empty())
                .map(|f| {
                    MemoryRecord::new(
                        MemoryDomain::Factual,
                        agent,
                        f.category,
                        f.content.trim(),
                        f.confidence,
                        f.evidence,
                    )
                })
                .collect(),
            Self::Emotional(out) => out
                .emotional_patterns
                .into_iter()
                .filter(|e| !e.emotion.trim().is_empty())
                .map(|e| {
                    let emotion = e.emotion.trim().to_lowercase();
                    let content = if e.triggers.is_empty() {
                        emotion.clone()
                    } else {
                        format!("{emotion} triggered by {}", e.triggers.join(", "))
                    };
                    MemoryRecord::new(
                        MemoryDomain::Emotional,
                        agent,
                        emotion,
                        content,
                        e.confidence,
                        e.evidence,
                    )
                })
                .collect(),
            Self::Preference(out) => out
                .preferences
                .into_iter()
                .filter(|p| !p.preference_value.trim().is_empty())
                .map(|p| {
                    MemoryRecord::new(
                        MemoryDomain::Preference,
                        agent,
                        p.category,
                        p.preference_value.trim(),
                        p.confidence,
                        p.evidence,
                    )
                })
                .collect(),
            Self::Analysis(out) => out
                .behavioral_patterns
                .into_iter()
                .filter(|p| !p.trim().is_empty())
                .map(|p| {
                    MemoryRecord::new(
                        MemoryDomain::Behavioral,
                        agent,
                        "behavioral_pattern",
                        p.trim(),
                        BEHAVIORAL_PATTERN_CONFIDENCE,
                        Vec::new(),
                    )
                })
                .collect(),
        }
    }
}
