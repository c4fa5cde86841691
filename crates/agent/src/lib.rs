pub mod context;
pub mod dna;
pub mod handoff;
pub mod llm;
pub mod observability;
pub mod orchestrator;
pub mod tools;

pub use context::context_block;
pub use dna::{extract, parse_monetary, LeadDnaAgent};
pub use handoff::HandoffController;
pub use llm::LlmClient;
pub use observability::StepEmitter;
pub use orchestrator::{Orchestrator, TurnInput, TurnOutput};
pub use tools::{
    Tool, ToolAccess, ToolRegistry, CONVERSATIONAL_TOOL_NAMES, EXECUTOR_TOOL_NAMES,
};
