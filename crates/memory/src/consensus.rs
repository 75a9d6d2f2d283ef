//! Conflict detection and resolution across agent outputs.
//!
//! Records from different agents are clustered with a [`SimilarityPolicy`].
//! Each multi-agent cluster is classified by three passes in fixed order
//! (confidence, category, interpretation) and resolved by the strategy keyed
//! to its type.  Clusters with no conflict pass through untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use concord_config::ExtractionConfig;

use crate::output::AgentOutput;
use crate::schema::{MemoryDomain, MemoryRecord, normalize_content};
use crate::shared::SharedConsensusMemory;
use crate::similarity::{SimilarityPolicy, TokenOverlapPolicy};

/// Confidence assigned by the default resolution.
pub const DEFAULT_RESOLUTION_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    Confidence,
    Category,
    Interpretation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    WeightedAverage,
    EvidenceBased,
    ContextMediated,
    Default,
}

/// A value one agent contributed to a conflict, or the value it resolved to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ConflictValue {
    Confidence(f32),
    /// `domain/category` classification.
    Category(String),
    Interpretation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub conflict_type: ConflictType,
    pub agents_involved: Vec<String>,
    pub original_values: BTreeMap<String, ConflictValue>,
    pub resolved_value: ConflictValue,
    pub resolution_method: ResolutionMethod,
    pub confidence_score: f32,
    /// Set when the default strategy produced the value.
    pub low_confidence_merge: bool,
    pub resolved_record_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// Why a specific strategy could not produce a value.
#[derive(Debug, Error)]
enum ResolutionFailure {
    #[error("all vote weights are zero")]
    ZeroWeight,
    #[error("no involved agent supplied evidence")]
    NoEvidence,
    #[error("committed knowledge does not single out one interpretation")]
    Undecided,
}

#[derive(Debug, Clone, Default)]
pub struct ConsensusOutcome {
    /// Merged records: agreeing records unchanged, one record per conflict.
    pub records: Vec<MemoryRecord>,
    pub resolutions: Vec<ConflictResolution>,
}

/// One record in a cluster, tagged with its agent's registration index.
#[derive(Debug, Clone)]
struct Member {
    order: usize,
    agent: String,
    record: MemoryRecord,
}

pub struct ConsensusBuilder {
    policy: Arc<dyn SimilarityPolicy>,
    config: ExtractionConfig,
}

impl std::fmt::Debug for ConsensusBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConsensusBuilder {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self::with_policy(
            config,
            Arc::new(TokenOverlapPolicy::new(config.similarity_threshold)),
        )
    }

    pub fn with_policy(config: &ExtractionConfig, policy: Arc<dyn SimilarityPolicy>) -> Self {
        Self {
            policy,
            config: config.clone(),
        }
    }

    /// Merge `outputs` (in agent registration order) into one record set.
    ///
    /// `committed` is consulted only by context-mediated resolution.
    pub fn build_consensus(
        &self,
        outputs: &[AgentOutput],
        committed: &SharedConsensusMemory,
    ) -> ConsensusOutcome {
        let clusters = self.cluster(outputs);
        let kinds: Vec<Option<ConflictType>> =
            clusters.iter().map(|c| self.classify(c)).collect();

        let mut slots: Vec<Vec<MemoryRecord>> = clusters
            .iter()
            .zip(&kinds)
            .map(|(cluster, kind)| match kind {
                None => cluster.iter().map(|m| m.record.clone()).collect(),
                Some(_) => Vec::new(),
            })
            .collect();

        let mut resolutions = Vec::new();
        for pass in [
            ConflictType::Confidence,
            ConflictType::Category,
            ConflictType::Interpretation,
        ] {
            for (idx, cluster) in clusters.iter().enumerate() {
                if kinds[idx] != Some(pass) {
                    continue;
                }
                let (record, resolution) = self.resolve(pass, cluster, committed);
                debug!(
                    conflict = ?pass,
                    method = ?resolution.resolution_method,
                    agents = ?resolution.agents_involved,
                    confidence = resolution.confidence_score,
                    "conflict resolved"
                );
                slots[idx].push(record);
                resolutions.push(resolution);
            }
        }

        let records: Vec<MemoryRecord> = slots.into_iter().flatten().collect();
        info!(
            clusters = clusters.len(),
            conflicts = resolutions.len(),
            records = records.len(),
            "consensus built"
        );
        ConsensusOutcome {
            records,
            resolutions,
        }
    }

    /// Greedy clustering in registration order, at most one record per agent.
    fn cluster(&self, outputs: &[AgentOutput]) -> Vec<Vec<Member>> {
        let mut clusters: Vec<Vec<Member>> = Vec::new();
        for (order, output) in outputs.iter().enumerate() {
            for record in &output.records {
                let home = clusters.iter().position(|cluster| {
                    cluster.iter().all(|m| m.agent != output.agent_name)
                        && cluster
                            .iter()
                            .any(|m| self.policy.same_content(&m.record, record))
                });
                let member = Member {
                    order,
                    agent: output.agent_name.clone(),
                    record: record.clone(),
                };
                match home {
                    Some(idx) => clusters[idx].push(member),
                    None => clusters.push(vec![member]),
                }
            }
        }
        clusters
    }

    fn classify(&self, cluster: &[Member]) -> Option<ConflictType> {
        if cluster.len() < 2 {
            return None;
        }

        let classes: Vec<(MemoryDomain, &str)> = cluster
            .iter()
            .map(|m| (m.record.domain, m.record.category.as_str()))
            .collect();
        let single_class = classes.iter().all(|c| *c == classes[0]);

        let (lo, hi) = cluster.iter().fold((f32::MAX, f32::MIN), |(lo, hi), m| {
            (lo.min(m.record.confidence), hi.max(m.record.confidence))
        });

        if single_class && hi - lo > self.config.confidence_conflict_threshold {
            return Some(ConflictType::Confidence);
        }
        if !single_class {
            return Some(ConflictType::Category);
        }
        let first = normalize_content(&cluster[0].record.content);
        if cluster
            .iter()
            .any(|m| normalize_content(&m.record.content) != first)
        {
            return Some(ConflictType::Interpretation);
        }
        None
    }

    fn resolve(
        &self,
        kind: ConflictType,
        cluster: &[Member],
        committed: &SharedConsensusMemory,
    ) -> (MemoryRecord, ConflictResolution) {
        let attempt = match kind {
            ConflictType::Confidence => self
                .weighted_average(cluster)
                .map(|(r, c)| (r, c, ResolutionMethod::WeightedAverage)),
            ConflictType::Category => {
                evidence_based(cluster).map(|(r, c)| (r, c, ResolutionMethod::EvidenceBased))
            }
            ConflictType::Interpretation => self
                .context_mediated(cluster, committed)
                .map(|(r, c)| (r, c, ResolutionMethod::ContextMediated)),
        };

        let (record, confidence, method) = match attempt {
            Ok(resolved) => resolved,
            Err(failure) => {
                warn!(
                    conflict = ?kind,
                    reason = %failure,
                    "resolution strategy failed, using default"
                );
                let (record, confidence) = default_resolution(cluster);
                (record, confidence, ResolutionMethod::Default)
            }
        };

        let resolution = ConflictResolution {
            conflict_type: kind,
            agents_involved: cluster.iter().map(|m| m.agent.clone()).collect(),
            original_values: cluster
                .iter()
                .map(|m| (m.agent.clone(), conflict_value(kind, &m.record)))
                .collect(),
            resolved_value: conflict_value(kind, &record),
            resolution_method: method,
            confidence_score: confidence.clamp(0.0, 1.0),
            low_confidence_merge: method == ResolutionMethod::Default,
            resolved_record_id: record.id,
            timestamp: Utc::now(),
        };
        (record, resolution)
    }

    /// Reliability-weighted mean of the involved confidences.
    fn weighted_average(
        &self,
        cluster: &[Member],
    ) -> Result<(MemoryRecord, f32), ResolutionFailure> {
        let mut weight_sum = 0.0f32;
        let mut weighted = 0.0f32;
        let mut representative: Option<(&Member, f32)> = None;

        for member in cluster {
            let w = self.config.weights_for(member.record.domain.slug());
            let vote = w.confidence * member.record.confidence
                + w.evidence * member.record.evidence_strength();
            weight_sum += vote;
            weighted += vote * member.record.confidence;
            if representative.is_none_or(|(_, best)| vote > best) {
                representative = Some((member, vote));
            }
        }

        if weight_sum <= f32::EPSILON {
            return Err(ResolutionFailure::ZeroWeight);
        }
        let resolved = (weighted / weight_sum).clamp(0.0, 1.0);
        let (member, _) = representative.ok_or(ResolutionFailure::ZeroWeight)?;
        Ok((member.record.with_confidence(resolved), resolved))
    }

    /// Pick the interpretation best supported by committed same-domain records.
    fn context_mediated(
        &self,
        cluster: &[Member],
        committed: &SharedConsensusMemory,
    ) -> Result<(MemoryRecord, f32), ResolutionFailure> {
        let domain = cluster[0].record.domain;
        let prior = committed.entries(domain);

        let support: Vec<f32> = cluster
            .iter()
            .map(|m| {
                prior
                    .iter()
                    .filter(|entry| self.policy.same_content(&entry.record, &m.record))
                    .map(|entry| self.policy.similarity(&entry.record, &m.record))
                    .sum()
            })
            .collect();

        let best = support.iter().copied().fold(0.0f32, f32::max);
        if best <= f32::EPSILON {
            return Err(ResolutionFailure::Undecided);
        }
        let winners: Vec<usize> = support
            .iter()
            .enumerate()
            .filter(|(_, s)| (best - **s).abs() <= f32::EPSILON)
            .map(|(i, _)| i)
            .collect();
        if winners.len() != 1 {
            return Err(ResolutionFailure::Undecided);
        }
        let record = cluster[winners[0]].record.clone();
        let confidence = record.confidence;
        Ok((record, confidence))
    }
}

/// The category with the most evidence wins; then highest confidence; then the
/// lexicographically earliest agent name.
fn evidence_based(cluster: &[Member]) -> Result<(MemoryRecord, f32), ResolutionFailure> {
    struct Group<'a> {
        evidence: usize,
        top: &'a Member,
        earliest_agent: &'a str,
    }

    let mut groups: BTreeMap<(MemoryDomain, &str), Group<'_>> = BTreeMap::new();
    for member in cluster {
        let key = (member.record.domain, member.record.category.as_str());
        let group = groups.entry(key).or_insert(Group {
            evidence: 0,
            top: member,
            earliest_agent: member.agent.as_str(),
        });
        group.evidence += member.record.evidence.len();
        if member.record.confidence > group.top.record.confidence {
            group.top = member;
        }
        if member.agent.as_str() < group.earliest_agent {
            group.earliest_agent = member.agent.as_str();
        }
    }

    if groups.values().all(|g| g.evidence == 0) {
        return Err(ResolutionFailure::NoEvidence);
    }

    let winner = groups
        .values()
        .max_by(|a, b| {
            a.evidence
                .cmp(&b.evidence)
                .then_with(|| a.top.record.confidence.total_cmp(&b.top.record.confidence))
                .then_with(|| b.earliest_agent.cmp(a.earliest_agent))
        })
        .ok_or(ResolutionFailure::NoEvidence)?;

    let record = winner.top.record.clone();
    let confidence = record.confidence;
    Ok((record, confidence))
}

/// First agent by registration order, confidence fixed at 0.5.
fn default_resolution(cluster: &[Member]) -> (MemoryRecord, f32) {
    let first = cluster
        .iter()
        .min_by_key(|m| m.order)
        .unwrap_or(&cluster[0]);
    (
        first.record.with_confidence(DEFAULT_RESOLUTION_CONFIDENCE),
        DEFAULT_RESOLUTION_CONFIDENCE,
    )
}

fn conflict_value(kind: ConflictType, record: &MemoryRecord) -> ConflictValue {
    match kind {
        ConflictType::Confidence => ConflictValue::Confidence(record.confidence),
        ConflictType::Category => {
            ConflictValue::Category(format!("{}/{}", record.domain, record.category))
        }
        ConflictType::Interpretation => ConflictValue::Interpretation(record.content.clone()),
    }
}
