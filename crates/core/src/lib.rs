pub mod config;
pub mod domain;
pub mod errors;
pub mod handoff;
pub mod intent;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::conversation::{BoardId, ContactId, ConversationId, DealId, OrgId, UserId};
pub use domain::dna::{DnaSignal, DnaUpdate, LeadDna, SignalKind, SIGNAL_HISTORY_CAP};
pub use domain::state::{AgentRole, AgentState, OrchestratorStep, StepDraft, RECENT_STEPS_CAP};
pub use errors::RequestError;
pub use handoff::{HandoffMode, HandoffTransition, TransitionError};
pub use intent::{classify, resolve_skill, IntentTag};
