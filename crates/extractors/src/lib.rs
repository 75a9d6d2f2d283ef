//! Extraction agents.
//!
//! The orchestrator consumes every agent through the [`Extractor`] trait and
//! never looks inside its prompting or model calls.

pub mod conversation;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod schema;
pub mod summary;

use async_trait::async_trait;

use concord_memory::{AgentDomain, MemoryRecord};

pub use conversation::{ChatMessage, conversation_from_input, count_messages, format_conversation};
pub use error::ExtractorError;
pub use llm::{LlmExtractor, build_llm_extractors};
pub use schema::DomainOutput;
pub use summary::{DEFAULT_PERSONALITY, DomainSummary};

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Stable agent name, used in logs, conflict records and tie-breaks.
    fn name(&self) -> &str;

    fn domain(&self) -> AgentDomain;

    /// Produce records for this agent's domain.
    ///
    /// Must not touch shared state.  `Ok(vec![])` means nothing was found;
    /// failures are `Err`.
    async fn extract(
        &self,
        conversation_text: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<MemoryRecord>, ExtractorError>;

    /// Optional narrative view of the conversation, used only for reporting.
    async fn analyze_conversation(
        &self,
        _conversation_text: &str,
        _user_id: &str,
        _session_id: &str,
    ) -> Result<Option<DomainSummary>, ExtractorError> {
        Ok(None)
    }
}
