use thiserror::Error;

/// Extraction failed.  Distinct from `Ok(vec![])`, which means the agent
/// ran and found nothing.
#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("model call failed: {0}")]
    Model(String),
    #[error("{agent} reply did not match its schema: {excerpt}")]
    MalformedReply { agent: String, excerpt: String },
    #[error("extractor unavailable: {0}")]
    Unavailable(String),
}

impl ExtractorError {
    pub fn model(err: &anyhow::Error) -> Self {
        Self::Model(format!("{err:#}"))
    }
}
