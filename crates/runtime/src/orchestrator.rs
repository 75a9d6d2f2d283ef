//! Hybrid memory orchestration.
//!
//! One call runs five strictly ordered phases:
//!   1. parallel extraction (one task per agent, private memory only)
//!   2. cross-domain enrichment (read-only against shared memory)
//!   3. consensus building
//!   4. staged commit under the single-writer lock
//!   5. result assembly

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use concord_config::ExtractionConfig;
use concord_extractors::{DomainSummary, Extractor, count_messages};
use concord_memory::{
    AgentOutput, CommittedEntry, ConflictResolution, ConsensusBuilder, MemoryDomain,
    MemoryRecord, PrivateAgentMemory, PrivateMemorySummary, ResolutionMethod, SessionRecord,
    SessionStore, SharedConsensusMemory, SharedMemorySnapshot,
};

use crate::enrich::enrich;
use crate::error::OrchestratorError;
use crate::result::ExtractionResult;

/// One surviving agent's contribution to a call.
struct AgentRun {
    output: AgentOutput,
    summary: Option<DomainSummary>,
}

pub struct HybridMemoryOrchestrator {
    extractors: Vec<Arc<dyn Extractor>>,
    private: BTreeMap<String, Arc<Mutex<PrivateAgentMemory>>>,
    shared: RwLock<SharedConsensusMemory>,
    commit_lock: AsyncMutex<()>,
    consensus: ConsensusBuilder,
    sessions: Arc<dyn SessionStore>,
    config: ExtractionConfig,
    agent_timeout: Duration,
}

impl HybridMemoryOrchestrator {
    /// `extractors` are kept in the given (registration) order.
    pub fn new(
        extractors: Vec<Arc<dyn Extractor>>,
        sessions: Arc<dyn SessionStore>,
        config: ExtractionConfig,
    ) -> Self {
        let private = extractors
            .iter()
            .map(|e| {
                (
                    e.name().to_string(),
                    Arc::new(Mutex::new(PrivateAgentMemory::new(e.name()))),
                )
            })
            .collect();
        let agent_timeout = Duration::from_secs(config.agent_timeout_secs.max(1));
        Self {
            consensus: ConsensusBuilder::new(&config),
            extractors,
            private,
            shared: RwLock::new(SharedConsensusMemory::new()),
            commit_lock: AsyncMutex::new(()),
            sessions,
            config,
            agent_timeout,
        }
    }

    /// Replace the consensus builder, e.g. to plug in another similarity policy.
    pub fn with_consensus(mut self, consensus: ConsensusBuilder) -> Self {
        self.consensus = consensus;
        self
    }

    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }

    /// Run a full extraction.  Never fails: total failures produce
    /// [`ExtractionResult::fallback`].
    pub async fn extract_memories(
        &self,
        conversation_text: &str,
        user_id: &str,
        session_id: &str,
    ) -> ExtractionResult {
        match self
            .try_extract_memories(conversation_text, user_id, session_id)
            .await
        {
            Ok(result) => result,
            Err(err) => {
                error!(user_id, session_id, error = %err, "extraction failed, returning fallback");
                let mut fallback = ExtractionResult::fallback(err.to_string());
                fallback.source_messages_count = count_messages(conversation_text);
                fallback
            }
        }
    }

    /// Like [`Self::extract_memories`] but surfaces total failures.
    #[instrument(skip(self, conversation_text))]
    pub async fn try_extract_memories(
        &self,
        conversation_text: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<ExtractionResult, OrchestratorError> {
        let started = Instant::now();
        let mut notes = Vec::new();

        // Phase 1
        let runs = self
            .run_extractors(conversation_text, user_id, session_id, &mut notes)
            .await;
        if runs.is_empty() {
            return Err(OrchestratorError::NoSurvivingAgents {
                attempted: self.extractors.len(),
            });
        }

        // Phases 2 and 3 read one consistent view of shared memory.
        let outcome = {
            let shared = self.shared.read().await;
            let enriched: Vec<AgentOutput> = runs
                .iter()
                .map(|run| {
                    let context = shared.get_cross_domain_context(run.output.domain);
                    enrich(run.output.clone(), &context, &self.config)
                })
                .collect();
            self.consensus.build_consensus(&enriched, &shared)
        };
        for resolution in &outcome.resolutions {
            if resolution.resolution_method == ResolutionMethod::Default {
                notes.push(format!(
                    "{:?} conflict between {} resolved by default",
                    resolution.conflict_type,
                    resolution.agents_involved.join(", ")
                ));
            }
        }

        // Phase 4
        self.commit(&outcome.records, &outcome.resolutions).await?;

        // Phase 5
        let mut result =
            ExtractionResult::from_records(outcome.records, count_messages(conversation_text));
        let summaries: Vec<(&str, &DomainSummary)> = runs
            .iter()
            .filter_map(|run| {
                run.summary
                    .as_ref()
                    .map(|s| (run.output.agent_name.as_str(), s))
            })
            .collect();
        apply_summaries(&mut result, &summaries, &runs);
        result.processing_time_ms =
            Some(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX));
        result.notes = notes;

        self.record_session(user_id, session_id, &result).await;

        info!(
            survivors = runs.len(),
            records = result.total_records(),
            conflicts = outcome.resolutions.len(),
            confidence = result.extraction_confidence,
            elapsed_ms = result.processing_time_ms,
            "extraction complete"
        );
        Ok(result)
    }

    /// Fan out to every extractor on its own task; collect survivors in
    /// registration order.
    async fn run_extractors(
        &self,
        conversation_text: &str,
        user_id: &str,
        session_id: &str,
        notes: &mut Vec<String>,
    ) -> Vec<AgentRun> {
        let conversation: Arc<str> = Arc::from(conversation_text);
        let handles: Vec<_> = self
            .extractors
            .iter()
            .map(|extractor| {
                let extractor = Arc::clone(extractor);
                let memory = self.private_memory(extractor.name());
                let conversation = Arc::clone(&conversation);
                let user_id = user_id.to_string();
                let session_id = session_id.to_string();
                let min_confidence = self.config.min_record_confidence;
                let trace_window = self.config.trace_window;
                let timeout = self.agent_timeout;
                tokio::spawn(async move {
                    let name = extractor.name().to_string();
                    match tokio::time::timeout(
                        timeout,
                        run_agent(
                            extractor,
                            memory,
                            &conversation,
                            &user_id,
                            &session_id,
                            min_confidence,
                            trace_window,
                        ),
                    )
                    .await
                    {
                        Ok(run) => run,
                        Err(_) => Err(OrchestratorError::AgentTimeout {
                            agent: name,
                            timeout,
                        }),
                    }
                })
            })
            .collect();

        let mut survivors = Vec::new();
        for (extractor, joined) in self.extractors.iter().zip(join_all(handles).await) {
            let outcome = joined.unwrap_or_else(|join_err| {
                Err(OrchestratorError::AgentFailure {
                    agent: extractor.name().to_string(),
                    reason: format!("task aborted: {join_err}"),
                })
            });
            match outcome {
                Ok(run) => survivors.push(run),
                Err(err) => {
                    warn!(agent = %extractor.name(), error = %err, "agent excluded from consensus");
                    with_memory(&self.private_memory(extractor.name()), |m| {
                        m.add_reasoning_trace(format!("excluded: {err}"))
                    });
                    notes.push(err.to_string());
                }
            }
        }
        info!(
            survivors = survivors.len(),
            attempted = self.extractors.len(),
            "parallel extraction finished"
        );
        survivors
    }

    fn private_memory(&self, agent: &str) -> Arc<Mutex<PrivateAgentMemory>> {
        self.private
            .get(agent)
            .cloned()
            .unwrap_or_else(|| Arc::new(Mutex::new(PrivateAgentMemory::new(agent))))
    }

    /// Apply all commits to a staged copy and swap it in, retrying once.
    async fn commit(
        &self,
        records: &[MemoryRecord],
        resolutions: &[ConflictResolution],
    ) -> Result<(), OrchestratorError> {
        let _writer = self.commit_lock.lock().await;

        let mut last_error = None;
        for attempt in 1..=2 {
            let base = self.shared.read().await.clone();
            match stage_commit(base, records, resolutions) {
                Ok(staged) => {
                    *self.shared.write().await = staged;
                    debug!(attempt, records = records.len(), "commit applied");
                    return Ok(());
                }
                Err(err) => {
                    warn!(attempt, error = %err, "commit attempt failed");
                    last_error = Some(err);
                }
            }
        }
        Err(OrchestratorError::CommitFailure(
            last_error.map(|e| format!("{e:#}")).unwrap_or_default(),
        ))
    }

    async fn record_session(&self, user_id: &str, session_id: &str, result: &ExtractionResult) {
        let mut record = SessionRecord::new(user_id, session_id);
        record.source_messages_count = result.source_messages_count;
        record.extraction_confidence = result.extraction_confidence;
        record.session_summary = result.session_summary.clone();
        record.committed_ids = [
            &result.factual_memories,
            &result.emotional_patterns,
            &result.user_preferences,
            &result.behavioral_insights,
        ]
        .into_iter()
        .flatten()
        .map(|r| r.id)
        .collect();

        if let Err(err) = self.sessions.append(record).await {
            warn!(error = %err, "could not append session record");
        }
    }

    // ── Inspection ────────────────────────────────────────────────────────

    pub async fn get_shared_memory_snapshot(&self) -> SharedMemorySnapshot {
        self.shared.read().await.snapshot()
    }

    pub fn get_private_memory_summary(&self) -> BTreeMap<String, PrivateMemorySummary> {
        self.private
            .iter()
            .map(|(name, memory)| {
                let summary = memory
                    .lock()
                    .map(|m| m.summary())
                    .unwrap_or_else(|poisoned| poisoned.into_inner().summary());
                (name.clone(), summary)
            })
            .collect()
    }

    pub async fn committed(&self, domain: MemoryDomain, id: &Uuid) -> Option<CommittedEntry> {
        self.shared.read().await.get(domain, id).cloned()
    }

    pub async fn committed_entries(&self, domain: MemoryDomain) -> Vec<CommittedEntry> {
        self.shared
            .read()
            .await
            .entries(domain)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn consensus_log(&self) -> Vec<ConflictResolution> {
        self.shared.read().await.consensus_log().to_vec()
    }
}

/// Run one extractor against its own private memory.
async fn run_agent(
    extractor: Arc<dyn Extractor>,
    memory: Arc<Mutex<PrivateAgentMemory>>,
    conversation: &str,
    user_id: &str,
    session_id: &str,
    min_confidence: f32,
    trace_window: usize,
) -> Result<AgentRun, OrchestratorError> {
    let started = Instant::now();
    let name = extractor.name().to_string();
    let own_domain = extractor.domain().memory_domain();
    with_memory(&memory, |m| {
        m.add_reasoning_trace(format!("extracting session {session_id} for {user_id}"))
    });

    let records = extractor
        .extract(conversation, user_id, session_id)
        .await
        .map_err(|err| OrchestratorError::AgentFailure {
            agent: name.clone(),
            reason: err.to_string(),
        })?;

    let total = records.len();
    let kept: Vec<MemoryRecord> = with_memory(&memory, |m| {
        let mut kept = Vec::with_capacity(total);
        for record in records {
            if record.domain != own_domain {
                m.record_rejection(
                    &record.content,
                    format!("record belongs to the {} domain", record.domain),
                    record.confidence,
                );
            } else if record.confidence.is_nan() || record.confidence < min_confidence {
                m.record_rejection(&record.content, "below confidence floor", record.confidence);
            } else {
                m.add_observation(&record.content, record.confidence);
                kept.push(record);
            }
        }
        m.add_reasoning_trace(format!("kept {} of {total} records", kept.len()));
        kept
    });

    let summary = match extractor
        .analyze_conversation(conversation, user_id, session_id)
        .await
    {
        Ok(summary) => summary,
        Err(err) => {
            warn!(agent = %name, error = %err, "conversation analysis unavailable");
            None
        }
    };

    let traces = with_memory(&memory, |m| m.recent_traces(trace_window));
    let output = AgentOutput::new(name, extractor.domain(), kept, traces, started.elapsed());
    debug!(
        agent = %output.agent_name,
        records = output.processing_metadata.record_count,
        avg_confidence = output.processing_metadata.avg_confidence,
        "agent finished"
    );
    Ok(AgentRun { output, summary })
}

fn with_memory<T>(
    memory: &Mutex<PrivateAgentMemory>,
    f: impl FnOnce(&mut PrivateAgentMemory) -> T,
) -> T {
    match memory.lock() {
        Ok(mut guard) => f(&mut guard),
        Err(poisoned) => f(&mut poisoned.into_inner()),
    }
}

fn stage_commit(
    mut staged: SharedConsensusMemory,
    records: &[MemoryRecord],
    resolutions: &[ConflictResolution],
) -> anyhow::Result<SharedConsensusMemory> {
    for record in records {
        staged.commit(record.clone())?;
    }
    for resolution in resolutions {
        staged.log_resolution(resolution.clone());
    }
    Ok(staged)
}

/// Narrative fields: the analysis agent's summary wins, otherwise the first
/// agent (registration order) that produced one.  Insights from every
/// summary are merged, dropping case-insensitive duplicates.
fn apply_summaries(
    result: &mut ExtractionResult,
    summaries: &[(&str, &DomainSummary)],
    runs: &[AgentRun],
) {
    let analysis_agents: HashSet<&str> = runs
        .iter()
        .filter(|r| r.output.domain == concord_memory::AgentDomain::Analysis)
        .map(|r| r.output.agent_name.as_str())
        .collect();

    let mut ordered: Vec<&DomainSummary> = summaries
        .iter()
        .filter(|(name, _)| analysis_agents.contains(name))
        .map(|(_, s)| *s)
        .collect();
    ordered.extend(
        summaries
            .iter()
            .filter(|(name, _)| !analysis_agents.contains(name))
            .map(|(_, s)| *s),
    );

    if let Some(primary) = ordered.first() {
        result.session_summary = Some(primary.session_summary.clone());
        result.suggested_personality = Some(primary.suggested_personality.clone());
    }

    let mut seen = HashSet::new();
    for summary in ordered {
        for insight in &summary.key_insights {
            if seen.insert(insight.trim().to_lowercase()) {
                result.key_insights.push(insight.clone());
            }
        }
    }
}
