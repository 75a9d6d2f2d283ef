use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use concord_memory::{MemoryDomain, MemoryRecord, mean_confidence};

/// What callers receive from one extraction call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub user_preferences: Vec<MemoryRecord>,
    pub emotional_patterns: Vec<MemoryRecord>,
    pub factual_memories: Vec<MemoryRecord>,
    #[serde(default)]
    pub behavioral_insights: Vec<MemoryRecord>,
    pub extraction_confidence: f32,
    pub processing_time_ms: Option<u64>,
    pub source_messages_count: usize,
    pub session_summary: Option<String>,
    #[serde(default)]
    pub key_insights: Vec<String>,
    pub suggested_personality: Option<String>,
    pub extracted_at: DateTime<Utc>,
    /// Degradation notes: failed agents, fallbacks, conflicts resolved by default.
    #[serde(default)]
    pub notes: Vec<String>,
    /// Set only by [`ExtractionResult::fallback`].
    #[serde(default)]
    pub fallback: bool,
}

impl ExtractionResult {
    /// Split committed records by domain; confidence is their mean.
    pub fn from_records(records: Vec<MemoryRecord>, source_messages_count: usize) -> Self {
        let extraction_confidence = mean_confidence(&records);
        let mut result = Self {
            extraction_confidence,
            source_messages_count,
            ..Self::empty()
        };
        for record in records {
            match record.domain {
                MemoryDomain::Preference => result.user_preferences.push(record),
                MemoryDomain::Emotional => result.emotional_patterns.push(record),
                MemoryDomain::Factual => result.factual_memories.push(record),
                MemoryDomain::Behavioral => result.behavioral_insights.push(record),
            }
        }
        result
    }

    /// Result returned when nothing could be merged: empty domains, zero
    /// confidence and the reason in `notes`.
    pub fn fallback(note: impl Into<String>) -> Self {
        Self {
            notes: vec![note.into()],
            fallback: true,
            ..Self::empty()
        }
    }

    fn empty() -> Self {
        Self {
            user_preferences: Vec::new(),
            emotional_patterns: Vec::new(),
            factual_memories: Vec::new(),
            behavioral_insights: Vec::new(),
            extraction_confidence: 0.0,
            processing_time_ms: None,
            source_messages_count: 0,
            session_summary: None,
            key_insights: Vec::new(),
            suggested_personality: None,
            extracted_at: Utc::now(),
            notes: Vec::new(),
            fallback: false,
        }
    }

    pub fn total_records(&self) -> usize {
        self.user_preferences.len()
            + self.emotional_patterns.len()
            + self.factual_memories.len()
            + self.behavioral_insights.len()
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}
