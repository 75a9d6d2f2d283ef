use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;

use concord_config::ExtractionConfig;
use concord_extractors::{DomainSummary, Extractor, ExtractorError};
use concord_memory::{
    AgentDomain, ConsensusBuilder, InMemorySessionStore, JsonlSessionStore, MemoryDomain,
    MemoryRecord, ResolutionMethod, SessionStore, SimilarityPolicy,
};
use concord_runtime::{HybridMemoryOrchestrator, OrchestratorError};

const CONVERSATION: &str = "[1] USER: I work nights at the hospital\n\
[2] ASSISTANT: That sounds demanding.\n\
[3] USER: Keep answers short please, exams make me anxious";

enum Behaviour {
    Records(Vec<MemoryRecord>),
    /// Same content every call, new ids each time.
    Fresh(Vec<MemoryRecord>),
    Fail,
    Hang,
}

struct Scripted {
    name: String,
    domain: AgentDomain,
    behaviour: Behaviour,
    summary: Option<DomainSummary>,
}

impl Scripted {
    fn with_records(
        name: &str,
        domain: AgentDomain,
        records: Vec<MemoryRecord>,
    ) -> Arc<dyn Extractor> {
        Arc::new(Self {
            name: name.to_string(),
            domain,
            behaviour: Behaviour::Records(records),
            summary: None,
        })
    }

    fn fresh(name: &str, domain: AgentDomain, records: Vec<MemoryRecord>) -> Arc<dyn Extractor> {
        Arc::new(Self {
            name: name.to_string(),
            domain,
            behaviour: Behaviour::Fresh(records),
            summary: None,
        })
    }

    fn failing(name: &str, domain: AgentDomain) -> Arc<dyn Extractor> {
        Arc::new(Self {
            name: name.to_string(),
            domain,
            behaviour: Behaviour::Fail,
            summary: None,
        })
    }

    fn hanging(name: &str, domain: AgentDomain) -> Arc<dyn Extractor> {
        Arc::new(Self {
            name: name.to_string(),
            domain,
            behaviour: Behaviour::Hang,
            summary: None,
        })
    }
}

#[async_trait]
impl Extractor for Scripted {
    fn name(&self) -> &str {
        &self.name
    }

    fn domain(&self) -> AgentDomain {
        self.domain
    }

    async fn extract(
        &self,
        _conversation_text: &str,
        _user_id: &str,
        _session_id: &str,
    ) -> Result<Vec<MemoryRecord>, ExtractorError> {
        match &self.behaviour {
            Behaviour::Records(records) => Ok(records.clone()),
            Behaviour::Fresh(records) => Ok(records
                .iter()
                .map(|r| {
                    MemoryRecord::new(
                        r.domain,
                        r.agent.clone(),
                        r.category.clone(),
                        r.content.clone(),
                        r.confidence,
                        r.evidence.clone(),
                    )
                })
                .collect()),
            Behaviour::Fail => Err(ExtractorError::Unavailable("model offline".to_string())),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn analyze_conversation(
        &self,
        _conversation_text: &str,
        _user_id: &str,
        _session_id: &str,
    ) -> Result<Option<DomainSummary>, ExtractorError> {
        Ok(self.summary.clone())
    }
}

fn record(
    domain: MemoryDomain,
    agent: &str,
    category: &str,
    content: &str,
    confidence: f32,
    evidence: &[&str],
) -> MemoryRecord {
    MemoryRecord::new(
        domain,
        agent,
        category,
        content,
        confidence,
        evidence.iter().map(|e| e.to_string()).collect(),
    )
}

fn three_agents() -> Vec<Arc<dyn Extractor>> {
    vec![
        Scripted::with_records(
            "factual",
            AgentDomain::Factual,
            vec![record(
                MemoryDomain::Factual,
                "factual",
                "work",
                "works as a nurse",
                0.9,
                &[],
            )],
        ),
        Scripted::with_records(
            "emotional",
            AgentDomain::Emotional,
            vec![record(
                MemoryDomain::Emotional,
                "emotional",
                "anxiety",
                "anxious about exams",
                0.9,
                &[],
            )],
        ),
        Scripted::with_records(
            "preference",
            AgentDomain::Preference,
            vec![record(
                MemoryDomain::Preference,
                "preference",
                "topics",
                "prefers short answers",
                0.9,
                &[],
            )],
        ),
    ]
}

fn orchestrator(extractors: Vec<Arc<dyn Extractor>>) -> HybridMemoryOrchestrator {
    HybridMemoryOrchestrator::new(
        extractors,
        Arc::new(InMemorySessionStore::new()),
        ExtractionConfig::default(),
    )
}

#[tokio::test]
async fn agreeing_agents_commit_every_record() {
    let orch = orchestrator(three_agents());
    let result = orch.extract_memories(CONVERSATION, "u1", "s1").await;

    assert_eq!(result.total_records(), 3);
    assert_eq!(result.factual_memories.len(), 1);
    assert_eq!(result.emotional_patterns.len(), 1);
    assert_eq!(result.user_preferences.len(), 1);
    assert!((result.extraction_confidence - 0.9).abs() < 1e-6);
    assert_eq!(result.source_messages_count, 3);
    assert!(result.processing_time_ms.is_some());
    assert!(orch.consensus_log().await.is_empty());

    let snapshot = orch.get_shared_memory_snapshot().await;
    assert_eq!(snapshot.factual_assertions, 1);
    assert_eq!(snapshot.emotional_patterns, 1);
    assert_eq!(snapshot.preference_model, 1);
    assert_eq!(snapshot.consensus_resolutions, 0);

    let private = orch.get_private_memory_summary();
    assert_eq!(private.len(), 3);
    assert!(private.values().all(|s| s.observations == 1));
}

#[tokio::test]
async fn category_disagreement_resolves_by_evidence() {
    let content = "works night shifts at the hospital";
    let orch = orchestrator(vec![
        Scripted::with_records(
            "factual",
            AgentDomain::Factual,
            vec![record(
                MemoryDomain::Factual,
                "factual",
                "work",
                content,
                0.8,
                &["I work nights at the hospital"],
            )],
        ),
        Scripted::with_records(
            "preference",
            AgentDomain::Preference,
            vec![record(
                MemoryDomain::Preference,
                "preference",
                "schedule",
                content,
                0.7,
                &["I work nights at the hospital", "nights suit me"],
            )],
        ),
    ]);
    let result = orch.extract_memories(CONVERSATION, "u1", "s1").await;

    assert_eq!(result.total_records(), 1);
    assert_eq!(result.user_preferences.len(), 1);
    assert_eq!(result.user_preferences[0].category, "schedule");

    let log = orch.consensus_log().await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].resolution_method, ResolutionMethod::EvidenceBased);
    assert_eq!(log[0].agents_involved, vec!["factual", "preference"]);
    assert_eq!(log[0].resolved_record_id, result.user_preferences[0].id);
}

#[tokio::test]
async fn confidence_disagreement_is_averaged() {
    let orch = orchestrator(vec![
        Scripted::with_records(
            "factual",
            AgentDomain::Factual,
            vec![record(
                MemoryDomain::Factual,
                "factual",
                "home",
                "lives in lisbon",
                0.9,
                &[],
            )],
        ),
        Scripted::with_records(
            "factual_secondary",
            AgentDomain::Factual,
            vec![record(
                MemoryDomain::Factual,
                "factual_secondary",
                "home",
                "lives in lisbon",
                0.55,
                &[],
            )],
        ),
    ]);
    let result = orch.extract_memories(CONVERSATION, "u1", "s1").await;

    assert_eq!(result.factual_memories.len(), 1);
    let merged = result.factual_memories[0].confidence;
    assert!(merged > 0.55 && merged < 0.9, "merged confidence {merged}");

    let log = orch.consensus_log().await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].resolution_method, ResolutionMethod::WeightedAverage);
    assert!(!log[0].low_confidence_merge);
}

#[tokio::test]
async fn failed_agent_is_excluded_without_error() {
    let mut extractors = three_agents();
    extractors[1] = Scripted::failing("emotional", AgentDomain::Emotional);
    let orch = orchestrator(extractors);

    let result = orch
        .try_extract_memories(CONVERSATION, "u1", "s1")
        .await
        .unwrap();

    assert_eq!(result.total_records(), 2);
    assert!(result.emotional_patterns.is_empty());
    assert!(result.notes.iter().any(|n| n.contains("emotional")));

    let private = orch.get_private_memory_summary();
    assert_eq!(private["emotional"].observations, 0);
    assert!(private["emotional"].reasoning_traces > 0);
    assert_eq!(private["factual"].observations, 1);
}

#[tokio::test]
async fn total_failure_returns_fallback() {
    let orch = orchestrator(vec![
        Scripted::failing("factual", AgentDomain::Factual),
        Scripted::failing("emotional", AgentDomain::Emotional),
    ]);

    let err = orch
        .try_extract_memories(CONVERSATION, "u1", "s1")
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NoSurvivingAgents { attempted: 2 }));

    let result = orch.extract_memories(CONVERSATION, "u1", "s1").await;
    assert!(result.is_fallback());
    assert_eq!(result.extraction_confidence, 0.0);
    assert_eq!(result.source_messages_count, 3);

    let snapshot = orch.get_shared_memory_snapshot().await;
    assert_eq!(snapshot.factual_assertions + snapshot.emotional_patterns, 0);
}

#[tokio::test]
async fn slow_agent_times_out() {
    let mut extractors = three_agents();
    extractors[2] = Scripted::hanging("preference", AgentDomain::Preference);
    let orch = orchestrator(extractors).with_agent_timeout(Duration::from_millis(100));

    let result = orch.extract_memories(CONVERSATION, "u1", "s1").await;

    assert_eq!(result.total_records(), 2);
    assert!(result.user_preferences.is_empty());
    assert!(result.notes.iter().any(|n| n.contains("preference")));
}

#[tokio::test]
async fn foreign_and_weak_records_are_rejected_privately() {
    let orch = orchestrator(vec![Scripted::with_records(
        "factual",
        AgentDomain::Factual,
        vec![
            record(
                MemoryDomain::Factual,
                "factual",
                "work",
                "works as a nurse",
                0.9,
                &[],
            ),
            record(
                MemoryDomain::Preference,
                "factual",
                "topics",
                "likes chess",
                0.9,
                &[],
            ),
            record(
                MemoryDomain::Factual,
                "factual",
                "pets",
                "might own a cat",
                0.1,
                &[],
            ),
        ],
    )]);
    let result = orch.extract_memories(CONVERSATION, "u1", "s1").await;

    assert_eq!(result.total_records(), 1);
    assert!(result.user_preferences.is_empty());
    let private = orch.get_private_memory_summary();
    assert_eq!(private["factual"].observations, 1);
    assert_eq!(private["factual"].rejections, 2);
}

#[tokio::test]
async fn repeating_a_call_does_not_grow_shared_memory() {
    let orch = orchestrator(three_agents());
    orch.extract_memories(CONVERSATION, "u1", "s1").await;
    let first = orch.get_shared_memory_snapshot().await;

    orch.extract_memories(CONVERSATION, "u1", "s1").await;
    let second = orch.get_shared_memory_snapshot().await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn analysis_summary_is_reported() {
    let analysis = Arc::new(Scripted {
        name: "analysis".to_string(),
        domain: AgentDomain::Analysis,
        behaviour: Behaviour::Records(vec![record(
            MemoryDomain::Behavioral,
            "analysis",
            "behavioral_pattern",
            "asks for brevity",
            0.6,
            &[],
        )]),
        summary: Some(DomainSummary {
            session_summary: "User works nights and wants brief replies".to_string(),
            key_insights: vec!["Night shift worker".to_string()],
            suggested_personality: "supportive".to_string(),
        }),
    });
    let mut extractors = three_agents();
    extractors.push(analysis);
    let orch = orchestrator(extractors);

    let result = orch.extract_memories(CONVERSATION, "u1", "s1").await;

    assert_eq!(result.behavioral_insights.len(), 1);
    assert_eq!(
        result.session_summary.as_deref(),
        Some("User works nights and wants brief replies")
    );
    assert_eq!(result.suggested_personality.as_deref(), Some("supportive"));
    assert_eq!(result.key_insights, vec!["Night shift worker"]);
}

#[tokio::test]
async fn committed_records_are_inspectable() {
    let orch = orchestrator(three_agents());
    let result = orch.extract_memories(CONVERSATION, "u1", "s1").await;

    let id = result.factual_memories[0].id;
    let entry = orch.committed(MemoryDomain::Factual, &id).await.unwrap();
    assert_eq!(entry.memory_type, MemoryDomain::Factual);
    assert_eq!(entry.record.content, "works as a nurse");
    assert!(orch.committed(MemoryDomain::Emotional, &id).await.is_none());
    assert_eq!(orch.committed_entries(MemoryDomain::Preference).await.len(), 1);
}

#[tokio::test]
async fn sessions_are_recorded() {
    let sessions = Arc::new(InMemorySessionStore::new());
    let orch = HybridMemoryOrchestrator::new(
        three_agents(),
        sessions.clone(),
        ExtractionConfig::default(),
    );
    orch.extract_memories(CONVERSATION, "u1", "s1").await;
    orch.extract_memories(CONVERSATION, "u1", "s2").await;

    let history = sessions.history("u1", "s1").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].committed_ids.len(), 3);
    assert_eq!(history[0].source_messages_count, 3);
}

#[tokio::test]
async fn sessions_persist_to_jsonl() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.jsonl");
    let orch = HybridMemoryOrchestrator::new(
        three_agents(),
        Arc::new(JsonlSessionStore::new(&path)),
        ExtractionConfig::default(),
    );
    orch.extract_memories(CONVERSATION, "u1", "s1").await;

    let reopened = JsonlSessionStore::new(&path);
    let history = reopened.history("u1", "s1").await.unwrap();
    assert_eq!(history.len(), 1);
    assert!((history[0].extraction_confidence - 0.9).abs() < 1e-6);
}

#[tokio::test]
async fn shared_quote_does_not_merge_across_domains() {
    let quote = "Keep answers short please, exams make me anxious";
    let orch = orchestrator(vec![
        Scripted::with_records(
            "emotional",
            AgentDomain::Emotional,
            vec![record(
                MemoryDomain::Emotional,
                "emotional",
                "anxiety",
                "anxious about exams",
                0.8,
                &[quote],
            )],
        ),
        Scripted::with_records(
            "preference",
            AgentDomain::Preference,
            vec![record(
                MemoryDomain::Preference,
                "preference",
                "communication",
                "prefers short answers",
                0.8,
                &[quote],
            )],
        ),
    ]);
    let result = orch.extract_memories(CONVERSATION, "u1", "s1").await;

    assert_eq!(result.total_records(), 2);
    assert_eq!(result.emotional_patterns.len(), 1);
    assert_eq!(result.user_preferences.len(), 1);
    assert!(orch.consensus_log().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_commit_every_record() {
    const CALLS: usize = 8;
    let orch = Arc::new(orchestrator(vec![
        Scripted::fresh(
            "factual",
            AgentDomain::Factual,
            vec![record(
                MemoryDomain::Factual,
                "factual",
                "home",
                "lives in lisbon",
                0.9,
                &[],
            )],
        ),
        Scripted::fresh(
            "factual_secondary",
            AgentDomain::Factual,
            vec![record(
                MemoryDomain::Factual,
                "factual_secondary",
                "home",
                "lives in lisbon",
                0.55,
                &[],
            )],
        ),
        Scripted::fresh(
            "emotional",
            AgentDomain::Emotional,
            vec![record(
                MemoryDomain::Emotional,
                "emotional",
                "anxiety",
                "anxious about exams",
                0.8,
                &[],
            )],
        ),
    ]));

    let handles: Vec<_> = (0..CALLS)
        .map(|i| {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move {
                orch.extract_memories(CONVERSATION, "u1", &format!("s{i}"))
                    .await
            })
        })
        .collect();
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert!(results.iter().all(|r| !r.is_fallback()));
    let committed: usize = results.iter().map(|r| r.total_records()).sum();
    assert_eq!(committed, CALLS * 2);

    let snapshot = orch.get_shared_memory_snapshot().await;
    assert_eq!(snapshot.factual_assertions, CALLS);
    assert_eq!(snapshot.emotional_patterns, CALLS);
    assert_eq!(
        snapshot.factual_assertions + snapshot.emotional_patterns,
        committed
    );
    assert_eq!(snapshot.consensus_resolutions, CALLS);
    assert_eq!(orch.consensus_log().await.len(), CALLS);
}

struct NeverSame;

impl SimilarityPolicy for NeverSame {
    fn similarity(&self, _a: &MemoryRecord, _b: &MemoryRecord) -> f32 {
        0.0
    }

    fn same_content(&self, _a: &MemoryRecord, _b: &MemoryRecord) -> bool {
        false
    }
}

#[tokio::test]
async fn custom_similarity_policy_is_used_for_consensus() {
    let content = "works night shifts at the hospital";
    let config = ExtractionConfig::default();
    let orch = orchestrator(vec![
        Scripted::with_records(
            "factual",
            AgentDomain::Factual,
            vec![record(
                MemoryDomain::Factual,
                "factual",
                "work",
                content,
                0.8,
                &["I work nights at the hospital"],
            )],
        ),
        Scripted::with_records(
            "preference",
            AgentDomain::Preference,
            vec![record(
                MemoryDomain::Preference,
                "preference",
                "schedule",
                content,
                0.7,
                &["I work nights at the hospital"],
            )],
        ),
    ])
    .with_consensus(ConsensusBuilder::with_policy(&config, Arc::new(NeverSame)));

    let result = orch.extract_memories(CONVERSATION, "u1", "s1").await;

    assert_eq!(result.total_records(), 2);
    assert_eq!(result.factual_memories.len(), 1);
    assert_eq!(result.user_preferences.len(), 1);
    assert!(orch.consensus_log().await.is_empty());
}

#[tokio::test]
async fn empty_survivor_with_failed_peer_is_not_fallback() {
    let orch = orchestrator(vec![
        Scripted::with_records("factual", AgentDomain::Factual, vec![]),
        Scripted::failing("emotional", AgentDomain::Emotional),
    ]);

    let result = orch.extract_memories(CONVERSATION, "u1", "s1").await;

    assert_eq!(result.total_records(), 0);
    assert_eq!(result.extraction_confidence, 0.0);
    assert!(result.notes.iter().any(|n| n.contains("emotional")));
    assert!(!result.is_fallback());
}
