use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("agent {agent} failed: {reason}")]
    AgentFailure { agent: String, reason: String },
    #[error("agent {agent} did not finish within {timeout:?}")]
    AgentTimeout { agent: String, timeout: Duration },
    #[error("all {attempted} extraction agents failed")]
    NoSurvivingAgents { attempted: usize },
    #[error("commit to shared memory failed: {0}")]
    CommitFailure(String),
}
