pub mod orchestrator;

pub use orchestrator::{ClientFactory, LiveClients, PipelineOrchestrator, RunOutcome, RunState};
