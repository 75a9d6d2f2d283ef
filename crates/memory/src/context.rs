//! Cross-domain context: the only read path from one domain into another.
//!
//! Each requesting domain receives a fixed, typed view that may tune the
//! scoring of its own records.  No view carries records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::intensity::infer_intensity;
use crate::schema::{AgentDomain, MemoryDomain};
use crate::shared::{CommittedEntry, SharedConsensusMemory};

const DISTRUST_CATEGORIES: &[&str] = &["distrust", "skepticism", "suspicion", "mistrust"];
const CONFUSION_CATEGORIES: &[&str] = &["frustration", "confusion"];
const ANXIOUS_CATEGORIES: &[&str] = &["anxiety", "stress", "worry", "fear"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreferenceContext {
    pub communication_style: Option<String>,
    pub interaction_pace: Option<String>,
    pub feedback_sensitivity: Option<String>,
}

impl PreferenceContext {
    pub fn is_empty(&self) -> bool {
        self.communication_style.is_none()
            && self.interaction_pace.is_none()
            && self.feedback_sensitivity.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceThreshold {
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssumptionFlagging {
    Standard,
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UncertaintyHandling {
    Explicit,
    Tolerant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingPolicies {
    pub evidence_threshold: EvidenceThreshold,
    pub assumption_flagging: AssumptionFlagging,
    pub uncertainty_handling: UncertaintyHandling,
}

impl Default for ProcessingPolicies {
    fn default() -> Self {
        Self {
            evidence_threshold: EvidenceThreshold::Medium,
            assumption_flagging: AssumptionFlagging::Standard,
            uncertainty_handling: UncertaintyHandling::Explicit,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionalContext {
    /// Mean inferred intensity of committed emotional patterns; `None` when
    /// nothing has been committed yet.
    pub baseline_intensity: Option<f32>,
    /// Committed emotional pattern counts by category.
    pub expression_patterns: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrossDomainContext {
    /// Delivered to emotional extraction.
    PreferenceContext(PreferenceContext),
    /// Delivered to factual extraction.
    ProcessingPolicies(ProcessingPolicies),
    /// Delivered to preference extraction.
    EmotionalContext(EmotionalContext),
    /// Analysis consumes domain signal and receives nothing.
    None,
}

impl SharedConsensusMemory {
    pub fn get_cross_domain_context(&self, requesting: AgentDomain) -> CrossDomainContext {
        match requesting {
            AgentDomain::Emotional => {
                CrossDomainContext::PreferenceContext(self.preference_context())
            }
            AgentDomain::Factual => {
                CrossDomainContext::ProcessingPolicies(self.processing_policies())
            }
            AgentDomain::Preference => {
                CrossDomainContext::EmotionalContext(self.emotional_context())
            }
            AgentDomain::Analysis => CrossDomainContext::None,
        }
    }

    fn preference_context(&self) -> PreferenceContext {
        let entries = self.entries(MemoryDomain::Preference);
        PreferenceContext {
            communication_style: strongest(
                &entries,
                &["communication", "communication_style", "style"],
            ),
            interaction_pace: strongest(&entries, &["pace", "interaction_pace", "pace_preference"]),
            feedback_sensitivity: strongest(
                &entries,
                &["feedback", "feedback_tolerance", "feedback_sensitivity"],
            ),
        }
    }

    fn processing_policies(&self) -> ProcessingPolicies {
        let categories: Vec<String> = self
            .entries(MemoryDomain::Emotional)
            .into_iter()
            .map(|entry| entry.record.category.clone())
            .collect();
        let has = |set: &[&str]| categories.iter().any(|c| set.contains(&c.as_str()));

        ProcessingPolicies {
            evidence_threshold: if has(DISTRUST_CATEGORIES) {
                EvidenceThreshold::High
            } else {
                EvidenceThreshold::Medium
            },
            assumption_flagging: if has(CONFUSION_CATEGORIES) {
                AssumptionFlagging::Strict
            } else {
                AssumptionFlagging::Standard
            },
            uncertainty_handling: if !categories.is_empty() && !has(ANXIOUS_CATEGORIES) {
                UncertaintyHandling::Tolerant
            } else {
                UncertaintyHandling::Explicit
            },
        }
    }

    fn emotional_context(&self) -> EmotionalContext {
        let entries = self.entries(MemoryDomain::Emotional);
        if entries.is_empty() {
            return EmotionalContext::default();
        }

        let total: f32 = entries
            .iter()
            .map(|entry| infer_intensity(&entry.record.content))
            .sum();
        let mut expression_patterns = BTreeMap::new();
        for entry in &entries {
            *expression_patterns
                .entry(entry.record.category.clone())
                .or_insert(0) += 1;
        }

        EmotionalContext {
            baseline_intensity: Some(total / entries.len() as f32),
            expression_patterns,
        }
    }
}

/// Content of the highest-confidence entry whose category is in `categories`.
fn strongest(entries: &[&CommittedEntry], categories: &[&str]) -> Option<String> {
    entries
        .iter()
        .filter(|entry| categories.contains(&entry.record.category.as_str()))
        .max_by(|a, b| a.record.confidence.total_cmp(&b.record.confidence))
        .map(|entry| entry.record.content.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MemoryRecord;

    fn commit(
        shared: &mut SharedConsensusMemory,
        domain: MemoryDomain,
        category: &str,
        content: &str,
        confidence: f32,
    ) {
        shared
            .commit(MemoryRecord::new(
                domain,
                domain.slug(),
                category,
                content,
                confidence,
                vec![],
            ))
            .unwrap();
    }

    #[test]
    fn empty_memory_yields_neutral_context() {
        let shared = SharedConsensusMemory::new();
        assert_eq!(
            shared.get_cross_domain_context(AgentDomain::Factual),
            CrossDomainContext::ProcessingPolicies(ProcessingPolicies::default())
        );
        match shared.get_cross_domain_context(AgentDomain::Emotional) {
            CrossDomainContext::PreferenceContext(ctx) => assert!(ctx.is_empty()),
            other => panic!("unexpected context {other:?}"),
        }
        match shared.get_cross_domain_context(AgentDomain::Preference) {
            CrossDomainContext::EmotionalContext(ctx) => {
                assert!(ctx.baseline_intensity.is_none());
                assert!(ctx.expression_patterns.is_empty());
            }
            other => panic!("unexpected context {other:?}"),
        }
    }

    #[test]
    fn analysis_receives_no_context() {
        let mut shared = SharedConsensusMemory::new();
        commit(
            &mut shared,
            MemoryDomain::Preference,
            "communication",
            "formal",
            0.9,
        );
        assert_eq!(
            shared.get_cross_domain_context(AgentDomain::Analysis),
            CrossDomainContext::None
        );
    }

    #[test]
    fn preference_context_picks_highest_confidence() {
        let mut shared = SharedConsensusMemory::new();
        commit(
            &mut shared,
            MemoryDomain::Preference,
            "communication",
            "casual",
            0.6,
        );
        commit(
            &mut shared,
            MemoryDomain::Preference,
            "communication",
            "formal",
            0.9,
        );
        commit(
            &mut shared,
            MemoryDomain::Preference,
            "pace_preference",
            "slow and detailed",
            0.7,
        );
        commit(
            &mut shared,
            MemoryDomain::Preference,
            "feedback_tolerance",
            "gentle",
            0.8,
        );

        match shared.get_cross_domain_context(AgentDomain::Emotional) {
            CrossDomainContext::PreferenceContext(ctx) => {
                assert_eq!(ctx.communication_style.as_deref(), Some("formal"));
                assert_eq!(ctx.interaction_pace.as_deref(), Some("slow and detailed"));
                assert_eq!(ctx.feedback_sensitivity.as_deref(), Some("gentle"));
            }
            other => panic!("unexpected context {other:?}"),
        }
    }

    #[test]
    fn distrust_raises_evidence_threshold() {
        let mut shared = SharedConsensusMemory::new();
        commit(
            &mut shared,
            MemoryDomain::Emotional,
            "skepticism",
            "doubts the advice",
            0.8,
        );
        commit(
            &mut shared,
            MemoryDomain::Emotional,
            "confusion",
            "lost in the steps",
            0.8,
        );

        let CrossDomainContext::ProcessingPolicies(policies) =
            shared.get_cross_domain_context(AgentDomain::Factual)
        else {
            panic!("factual should receive processing policies");
        };
        assert_eq!(policies.evidence_threshold, EvidenceThreshold::High);
        assert_eq!(policies.assumption_flagging, AssumptionFlagging::Strict);
        assert_eq!(policies.uncertainty_handling, UncertaintyHandling::Tolerant);
    }

    #[test]
    fn anxiety_keeps_uncertainty_explicit() {
        let mut shared = SharedConsensusMemory::new();
        commit(
            &mut shared,
            MemoryDomain::Emotional,
            "anxiety",
            "worried about exams",
            0.8,
        );
        let CrossDomainContext::ProcessingPolicies(policies) =
            shared.get_cross_domain_context(AgentDomain::Factual)
        else {
            panic!("factual should receive processing policies");
        };
        assert_eq!(policies.uncertainty_handling, UncertaintyHandling::Explicit);
        assert_eq!(policies.evidence_threshold, EvidenceThreshold::Medium);
    }

    #[test]
    fn emotional_context_summarises_patterns() {
        let mut shared = SharedConsensusMemory::new();
        commit(
            &mut shared,
            MemoryDomain::Emotional,
            "joy",
            "really excited about the trip",
            0.9,
        );
        commit(
            &mut shared,
            MemoryDomain::Emotional,
            "joy",
            "happy with the result",
            0.7,
        );
        commit(
            &mut shared,
            MemoryDomain::Emotional,
            "anxiety",
            "nervous",
            0.6,
        );

        let CrossDomainContext::EmotionalContext(ctx) =
            shared.get_cross_domain_context(AgentDomain::Preference)
        else {
            panic!("preference should receive emotional context");
        };
        let baseline = ctx.baseline_intensity.unwrap();
        assert!(baseline > 0.0 && baseline <= 1.0);
        assert_eq!(ctx.expression_patterns.get("joy"), Some(&2));
        assert_eq!(ctx.expression_patterns.get("anxiety"), Some(&1));
    }
}
