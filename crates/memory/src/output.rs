use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{AgentDomain, MemoryRecord};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub record_count: usize,
    pub avg_confidence: f32,
    pub duration_ms: u64,
}

/// The packaged result of running one extractor for one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    pub agent_name: String,
    pub domain: AgentDomain,
    pub records: Vec<MemoryRecord>,
    pub confidence_scores: BTreeMap<Uuid, f32>,
    /// Most recent reasoning traces from the agent's private memory.
    pub reasoning_traces: Vec<String>,
    pub processing_metadata: ProcessingMetadata,
}

impl AgentOutput {
    pub fn new(
        agent_name: impl Into<String>,
        domain: AgentDomain,
        records: Vec<MemoryRecord>,
        reasoning_traces: Vec<String>,
        duration: Duration,
    ) -> Self {
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let mut output = Self {
            agent_name: agent_name.into(),
            domain,
            records: Vec::new(),
            confidence_scores: BTreeMap::new(),
            reasoning_traces,
            processing_metadata: ProcessingMetadata {
                duration_ms,
                ..ProcessingMetadata::default()
            },
        };
        output.set_records(records);
        output
    }

    /// Replace the record list, recomputing scores and metadata.
    pub fn with_records(mut self, records: Vec<MemoryRecord>) -> Self {
        self.set_records(records);
        self
    }

    fn set_records(&mut self, records: Vec<MemoryRecord>) {
        self.confidence_scores = records.iter().map(|r| (r.id, r.confidence)).collect();
        self.processing_metadata.record_count = records.len();
        self.processing_metadata.avg_confidence = mean_confidence(&records);
        self.records = records;
    }
}

/// Mean record confidence, `0.0` for an empty slice.
pub fn mean_confidence(records: &[MemoryRecord]) -> f32 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().map(|r| r.confidence).sum::<f32>() / records.len() as f32
}
