use std::collections::BTreeMap;
use std::marker::PhantomData;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::consensus::ConflictResolution;
use crate::schema::{MemoryDomain, MemoryRecord};

/// Compile-time tag for one domain map.
pub trait DomainTag {
    const DOMAIN: MemoryDomain;
}

#[derive(Debug, Clone, Copy)]
pub struct FactualTag;
#[derive(Debug, Clone, Copy)]
pub struct EmotionalTag;
#[derive(Debug, Clone, Copy)]
pub struct PreferenceTag;
#[derive(Debug, Clone, Copy)]
pub struct BehavioralTag;

impl DomainTag for FactualTag {
    const DOMAIN: MemoryDomain = MemoryDomain::Factual;
}
impl DomainTag for EmotionalTag {
    const DOMAIN: MemoryDomain = MemoryDomain::Emotional;
}
impl DomainTag for PreferenceTag {
    const DOMAIN: MemoryDomain = MemoryDomain::Preference;
}
impl DomainTag for BehavioralTag {
    const DOMAIN: MemoryDomain = MemoryDomain::Behavioral;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedEntry {
    pub record: MemoryRecord,
    pub committed_at: DateTime<Utc>,
    pub memory_type: MemoryDomain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Inserted,
    Updated,
    /// Identical data was already committed; `committed_at` is unchanged.
    Unchanged,
}

/// Committed records of a single domain, keyed by record id.
#[derive(Debug, Clone)]
pub struct DomainMap<D: DomainTag> {
    entries: BTreeMap<Uuid, CommittedEntry>,
    _domain: PhantomData<D>,
}

impl<D: DomainTag> Default for DomainMap<D> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            _domain: PhantomData,
        }
    }
}

impl<D: DomainTag> DomainMap<D> {
    fn commit(&mut self, record: MemoryRecord) -> Result<CommitOutcome> {
        validate(D::DOMAIN, &record)?;

        if let Some(existing) = self.entries.get(&record.id) {
            if existing.record == record {
                return Ok(CommitOutcome::Unchanged);
            }
        }

        let outcome = if self.entries.contains_key(&record.id) {
            CommitOutcome::Updated
        } else {
            CommitOutcome::Inserted
        };
        self.entries.insert(
            record.id,
            CommittedEntry {
                record,
                committed_at: Utc::now(),
                memory_type: D::DOMAIN,
            },
        );
        Ok(outcome)
    }

    pub fn get(&self, id: &Uuid) -> Option<&CommittedEntry> {
        self.entries.get(id)
    }

    /// Entries ordered by commit time, then id.
    pub fn entries(&self) -> Vec<&CommittedEntry> {
        let mut entries: Vec<&CommittedEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| {
            a.committed_at
                .cmp(&b.committed_at)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate(domain: MemoryDomain, record: &MemoryRecord) -> Result<()> {
    if record.domain != domain {
        bail!(
            "record {} belongs to the {} domain, not {}",
            record.id_short(),
            record.domain,
            domain
        );
    }
    if record.id.is_nil() {
        bail!("record has a nil id");
    }
    if !record.confidence.is_finite() || !(0.0..=1.0).contains(&record.confidence) {
        bail!(
            "record {} has out-of-range confidence {}",
            record.id_short(),
            record.confidence
        );
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedMemorySnapshot {
    pub factual_assertions: usize,
    pub emotional_patterns: usize,
    pub preference_model: usize,
    pub behavioral_insights: usize,
    pub consensus_resolutions: usize,
}

/// Post-consensus knowledge, one independent map per domain.
///
/// Mutated only through the `commit_*` methods; a commit touches exactly one
/// domain map.  Cross-domain reads go through
/// [`SharedConsensusMemory::get_cross_domain_context`].
#[derive(Debug, Clone, Default)]
pub struct SharedConsensusMemory {
    factual_assertions: DomainMap<FactualTag>,
    emotional_patterns: DomainMap<EmotionalTag>,
    preference_model: DomainMap<PreferenceTag>,
    behavioral_insights: DomainMap<BehavioralTag>,
    consensus_log: Vec<ConflictResolution>,
}

impl SharedConsensusMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commit_factual(&mut self, record: MemoryRecord) -> Result<CommitOutcome> {
        self.factual_assertions.commit(record)
    }

    pub fn commit_emotional(&mut self, record: MemoryRecord) -> Result<CommitOutcome> {
        self.emotional_patterns.commit(record)
    }

    pub fn commit_preference(&mut self, record: MemoryRecord) -> Result<CommitOutcome> {
        self.preference_model.commit(record)
    }

    pub fn commit_behavioral(&mut self, record: MemoryRecord) -> Result<CommitOutcome> {
        self.behavioral_insights.commit(record)
    }

    /// Route `record` to the map of its own domain.
    pub fn commit(&mut self, record: MemoryRecord) -> Result<CommitOutcome> {
        let id = record.id_short();
        let domain = record.domain;
        let outcome = match domain {
            MemoryDomain::Factual => self.commit_factual(record),
            MemoryDomain::Emotional => self.commit_emotional(record),
            MemoryDomain::Preference => self.commit_preference(record),
            MemoryDomain::Behavioral => self.commit_behavioral(record),
        }?;
        debug!(id = %id, domain = %domain, ?outcome, "record committed");
        Ok(outcome)
    }

    pub fn log_resolution(&mut self, resolution: ConflictResolution) {
        self.consensus_log.push(resolution);
    }

    pub fn consensus_log(&self) -> &[ConflictResolution] {
        &self.consensus_log
    }

    pub fn get(&self, domain: MemoryDomain, id: &Uuid) -> Option<&CommittedEntry> {
        match domain {
            MemoryDomain::Factual => self.factual_assertions.get(id),
            MemoryDomain::Emotional => self.emotional_patterns.get(id),
            MemoryDomain::Preference => self.preference_model.get(id),
            MemoryDomain::Behavioral => self.behavioral_insights.get(id),
        }
    }

    pub fn entries(&self, domain: MemoryDomain) -> Vec<&CommittedEntry> {
        match domain {
            MemoryDomain::Factual => self.factual_assertions.entries(),
            MemoryDomain::Emotional => self.emotional_patterns.entries(),
            MemoryDomain::Preference => self.preference_model.entries(),
            MemoryDomain::Behavioral => self.behavioral_insights.entries(),
        }
    }

    pub fn snapshot(&self) -> SharedMemorySnapshot {
        SharedMemorySnapshot {
            factual_assertions: self.factual_assertions.len(),
            emotional_patterns: self.emotional_patterns.len(),
            preference_model: self.preference_model.len(),
            behavioral_insights: self.behavioral_insights.len(),
            consensus_resolutions: self.consensus_log.len(),
        }
    }
}
