//! Extraction runtime: fans a conversation out to the domain agents and
//! merges their findings into shared consensus memory.

mod enrich;
mod error;
mod orchestrator;
mod result;

pub use enrich::enrich;
pub use error::OrchestratorError;
pub use orchestrator::HybridMemoryOrchestrator;
pub use result::ExtractionResult;
