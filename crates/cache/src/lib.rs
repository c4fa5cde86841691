pub mod keys;
pub mod memory;
pub mod store;

pub use keys::{
    agent_state_key, handoff_mode_key, lead_dna_key, observability_log_key, AGENT_STATE_TTL,
    HANDOFF_TTL, LEAD_DNA_TTL, OBSERVABILITY_TTL,
};
pub use memory::{MemoryStore, UnavailableStore};
pub use store::{get_json, set_json, KvStore, StoreError};
