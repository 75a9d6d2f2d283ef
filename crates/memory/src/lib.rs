pub mod consensus;
pub mod context;
pub mod intensity;
pub mod output;
pub mod private;
pub mod schema;
pub mod session;
pub mod shared;
pub mod similarity;

pub use consensus::{
    ConflictResolution, ConflictType, ConflictValue, ConsensusBuilder, ConsensusOutcome,
    ResolutionMethod,
};
pub use context::{
    AssumptionFlagging, CrossDomainContext, EmotionalContext, EvidenceThreshold,
    PreferenceContext, ProcessingPolicies, UncertaintyHandling,
};
pub use output::{AgentOutput, ProcessingMetadata, mean_confidence};
pub use private::{PrivateAgentMemory, PrivateMemorySummary};
pub use schema::{AgentDomain, MemoryDomain, MemoryRecord};
pub use session::{
    InMemorySessionStore, JsonlSessionStore, SessionRecord, SessionStore, open_session_store,
};
pub use shared::{CommitOutcome, CommittedEntry, SharedConsensusMemory, SharedMemorySnapshot};
pub use similarity::{SimilarityPolicy, TokenOverlapPolicy};
