use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::info;

use concord_config::AppConfig;
use concord_extractors::{build_llm_extractors, conversation_from_input};
use concord_llm::{ChatModel, RoutedChat};
use concord_memory::open_session_store;
use concord_runtime::HybridMemoryOrchestrator;

pub(crate) async fn run_extract(
    config: &AppConfig,
    file: &Path,
    user_id: &str,
    session_id: &str,
) -> Result<()> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("reading conversation from {}", file.display()))?;
    let conversation = conversation_from_input(&raw);
    if conversation.trim().is_empty() {
        bail!("{} contains no conversation", file.display());
    }

    let model: Arc<dyn ChatModel> = Arc::new(RoutedChat::from_config(&config.llm));
    let extractors = build_llm_extractors(&config.extraction.enabled_agents, model)?;
    if extractors.is_empty() {
        bail!("no extractors enabled; set extraction.enabled_agents in the config");
    }
    info!(
        provider = %config.llm.provider,
        model = %config.active_model(),
        agents = extractors.len(),
        "starting extraction"
    );

    let orchestrator = HybridMemoryOrchestrator::new(
        extractors,
        open_session_store(&config.memory),
        config.extraction.clone(),
    )
    .with_agent_timeout(config.agent_timeout());

    let result = orchestrator
        .extract_memories(&conversation, user_id, session_id)
        .await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.is_fallback() {
        bail!("extraction produced no memories: {}", result.notes.join("; "));
    }
    Ok(())
}

pub(crate) async fn run_history(config: &AppConfig, user_id: &str, session_id: &str) -> Result<()> {
    let store = open_session_store(&config.memory);
    let records = store.history(user_id, session_id).await?;
    if records.is_empty() {
        println!("no sessions recorded for {user_id}/{session_id}");
        return Ok(());
    }

    for record in records {
        println!(
            "{}  messages={} committed={} confidence={:.2}  {}",
            record.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            record.source_messages_count,
            record.committed_ids.len(),
            record.extraction_confidence,
            record.session_summary.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}
