use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reasoning traces older than this many entries are discarded.
pub const TRACE_RETENTION: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub content: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rejection {
    pub item: String,
    pub reason: String,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrivateMemorySummary {
    pub observations: usize,
    pub reasoning_traces: usize,
    pub rejections: usize,
    pub avg_confidence: f32,
}

/// Scratch space owned by exactly one extraction agent.
#[derive(Debug, Clone)]
pub struct PrivateAgentMemory {
    agent_domain: String,
    raw_observations: Vec<Observation>,
    reasoning_traces: VecDeque<String>,
    rejection_log: Vec<Rejection>,
}

impl PrivateAgentMemory {
    pub fn new(agent_domain: impl Into<String>) -> Self {
        Self {
            agent_domain: agent_domain.into(),
            raw_observations: Vec::new(),
            reasoning_traces: VecDeque::new(),
            rejection_log: Vec::new(),
        }
    }

    pub fn agent_domain(&self) -> &str {
        &self.agent_domain
    }

    pub fn add_observation(&mut self, content: impl Into<String>, confidence: f32) {
        self.raw_observations.push(Observation {
            content: content.into(),
            confidence,
        });
    }

    /// Append a trace prefixed with the current UTC time.
    pub fn add_reasoning_trace(&mut self, trace: impl AsRef<str>) {
        let stamped = format!("[{}] {}", Utc::now().to_rfc3339(), trace.as_ref());
        self.reasoning_traces.push_back(stamped);
        while self.reasoning_traces.len() > TRACE_RETENTION {
            self.reasoning_traces.pop_front();
        }
    }

    pub fn record_rejection(
        &mut self,
        item: impl Into<String>,
        reason: impl Into<String>,
        confidence: f32,
    ) {
        self.rejection_log.push(Rejection {
            item: item.into(),
            reason: reason.into(),
            confidence,
            timestamp: Utc::now(),
        });
    }

    pub fn observations(&self) -> &[Observation] {
        &self.raw_observations
    }

    pub fn rejections(&self) -> &[Rejection] {
        &self.rejection_log
    }

    /// The `window` most recent traces, oldest first.
    pub fn recent_traces(&self, window: usize) -> Vec<String> {
        let skip = self.reasoning_traces.len().saturating_sub(window);
        self.reasoning_traces.iter().skip(skip).cloned().collect()
    }

    pub fn avg_confidence(&self) -> f32 {
        if self.raw_observations.is_empty() {
            return 0.0;
        }
        self.raw_observations.iter().map(|o| o.confidence).sum::<f32>()
            / self.raw_observations.len() as f32
    }

    pub fn summary(&self) -> PrivateMemorySummary {
        PrivateMemorySummary {
            observations: self.raw_observations.len(),
            reasoning_traces: self.reasoning_traces.len(),
            rejections: self.rejection_log.len(),
            avg_confidence: self.avg_confidence(),
        }
    }
}
