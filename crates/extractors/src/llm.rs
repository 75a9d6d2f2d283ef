use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use concord_llm::ChatModel;
use concord_memory::schema::truncate_str;
use concord_memory::{AgentDomain, MemoryRecord};

use crate::error::ExtractorError;
use crate::prompt::extraction_prompt;
use crate::schema::DomainOutput;
use crate::summary::DomainSummary;
use crate::Extractor;

/// An extractor backed by a language model.
///
/// One model call serves both `extract` and `analyze_conversation` for the
/// same conversation; the parsed reply is kept until a different
/// conversation arrives.
pub struct LlmExtractor {
    name: String,
    domain: AgentDomain,
    model: Arc<dyn ChatModel>,
    last_reply: Mutex<Option<(String, DomainOutput)>>,
}

impl LlmExtractor {
    pub fn new(name: impl Into<String>, domain: AgentDomain, model: Arc<dyn ChatModel>) -> Self {
        Self {
            name: name.into(),
            domain,
            model,
            last_reply: Mutex::new(None),
        }
    }

    fn cached(&self, conversation: &str) -> Option<DomainOutput> {
        let guard = self.last_reply.lock().ok()?;
        match guard.as_ref() {
            Some((key, output)) if key == conversation => Some(output.clone()),
            _ => None,
        }
    }

    fn remember(&self, conversation: &str, output: &DomainOutput) {
        if let Ok(mut guard) = self.last_reply.lock() {
            *guard = Some((conversation.to_string(), output.clone()));
        }
    }

    async fn run(&self, conversation: &str) -> Result<DomainOutput, ExtractorError> {
        if let Some(output) = self.cached(conversation) {
            debug!(agent = %self.name, "reusing parsed reply");
            return Ok(output);
        }

        let prompt = extraction_prompt(self.domain, conversation);
        let reply = self.model.complete(&prompt).await.map_err(|err| {
            warn!(agent = %self.name, error = %err, "model call failed");
            ExtractorError::model(&err)
        })?;
        info!(agent = %self.name, reply_len = reply.len(), "extractor reply received");

        let output = DomainOutput::parse(self.domain, &reply).ok_or_else(|| {
            ExtractorError::MalformedReply {
                agent: self.name.clone(),
                excerpt: truncate_str(reply.trim(), 120).to_string(),
            }
        })?;
        self.remember(conversation, &output);
        Ok(output)
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn domain(&self) -> AgentDomain {
        self.domain
    }

    #[instrument(skip(self, conversation_text), fields(agent = %self.name))]
    async fn extract(
        &self,
        conversation_text: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<MemoryRecord>, ExtractorError> {
        let records = self.run(conversation_text).await?.into_records(&self.name);
        debug!(records = records.len(), "records extracted");
        Ok(records)
    }

    async fn analyze_conversation(
        &self,
        conversation_text: &str,
        _user_id: &str,
        _session_id: &str,
    ) -> Result<Option<DomainSummary>, ExtractorError> {
        Ok(Some(self.run(conversation_text).await?.summary()))
    }
}

/// Build the extractors named in `enabled`, in order.
///
/// Names are the agent domain slugs (`factual`, `emotional`, `preference`,
/// `analysis`); unknown names are an error.
pub fn build_llm_extractors(
    enabled: &[String],
    model: Arc<dyn ChatModel>,
) -> anyhow::Result<Vec<Arc<dyn Extractor>>> {
    let mut extractors: Vec<Arc<dyn Extractor>> = Vec::new();
    for name in enabled {
        let domain = match name.trim().to_ascii_lowercase().as_str() {
            "factual" => AgentDomain::Factual,
            "emotional" => AgentDomain::Emotional,
            "preference" => AgentDomain::Preference,
            "analysis" => AgentDomain::Analysis,
            other => anyhow::bail!("unknown extractor '{other}'"),
        };
        if extractors.iter().any(|e| e.domain() == domain) {
            warn!(agent = %name, "extractor listed twice, skipping duplicate");
            continue;
        }
        extractors.push(Arc::new(LlmExtractor::new(domain.slug(), domain, model.clone())));
    }
    Ok(extractors)
}
