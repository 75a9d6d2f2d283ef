//! Cross-domain enrichment of agent outputs.
//!
//! Context only re-scores or filters the agent's own records.  The output
//! never gains a record it did not already hold.

use std::collections::HashSet;

use tracing::debug;

use concord_config::ExtractionConfig;
use concord_memory::{
    AgentOutput, AssumptionFlagging, CrossDomainContext, EmotionalContext, EvidenceThreshold,
    MemoryRecord, PreferenceContext, ProcessingPolicies, UncertaintyHandling,
};

const RESERVED_STYLES: &[&str] = &["reserved", "formal", "professional", "concise"];
const EXPRESSIVE_STYLES: &[&str] = &["expressive", "casual", "enthusiastic", "playful"];

pub fn enrich(
    output: AgentOutput,
    context: &CrossDomainContext,
    config: &ExtractionConfig,
) -> AgentOutput {
    let own_domain = output.domain.memory_domain();
    let original_ids: HashSet<_> = output.records.iter().map(|r| r.id).collect();

    let adjusted: Vec<MemoryRecord> = output
        .records
        .iter()
        .filter(|r| r.domain == own_domain)
        .filter_map(|r| match context {
            CrossDomainContext::ProcessingPolicies(policies) => {
                apply_policies(r, policies, config)
            }
            CrossDomainContext::PreferenceContext(prefs) => Some(calibrate_emotion(r, prefs)),
            CrossDomainContext::EmotionalContext(emotions) => {
                Some(calibrate_preference(r, emotions))
            }
            CrossDomainContext::None => Some(r.clone()),
        })
        .filter(|r| original_ids.contains(&r.id))
        .collect();

    debug!(
        agent = %output.agent_name,
        before = output.records.len(),
        after = adjusted.len(),
        "output enriched"
    );
    output.with_records(adjusted)
}

/// Acceptance bar for facts.
fn apply_policies(
    record: &MemoryRecord,
    policies: &ProcessingPolicies,
    config: &ExtractionConfig,
) -> Option<MemoryRecord> {
    let has_evidence = !record.evidence.is_empty();
    let accepted = match policies.evidence_threshold {
        EvidenceThreshold::High => {
            has_evidence && record.confidence >= config.high_evidence_min_confidence
        }
        EvidenceThreshold::Medium => {
            record.confidence >= config.medium_evidence_min_confidence
                || (policies.uncertainty_handling == UncertaintyHandling::Tolerant
                    && has_evidence)
        }
    };
    if !accepted {
        debug!(id = %record.id_short(), confidence = record.confidence, "fact below evidence bar");
        return None;
    }

    if policies.assumption_flagging == AssumptionFlagging::Strict && !has_evidence {
        return Some(record.with_confidence(record.confidence * 0.8));
    }
    Some(record.clone())
}

/// Reserved communicators under-express, expressive ones over-express.
fn calibrate_emotion(record: &MemoryRecord, prefs: &PreferenceContext) -> MemoryRecord {
    let Some(style) = prefs.communication_style.as_deref() else {
        return record.clone();
    };
    let style = style.to_lowercase();
    if RESERVED_STYLES.iter().any(|s| style.contains(s)) {
        record.with_confidence(record.confidence * 1.1)
    } else if EXPRESSIVE_STYLES.iter().any(|s| style.contains(s)) {
        record.with_confidence(record.confidence * 0.9)
    } else {
        record.clone()
    }
}

/// Preferences voiced in a heightened emotional state count for less.
fn calibrate_preference(record: &MemoryRecord, emotions: &EmotionalContext) -> MemoryRecord {
    match emotions.baseline_intensity {
        Some(baseline) if baseline > 0.6 => record.with_confidence(record.confidence * 0.9),
        Some(baseline) if baseline < 0.2 => record.with_confidence(record.confidence * 1.1),
        _ => record.clone(),
    }
}
