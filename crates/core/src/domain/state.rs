use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::{BoardId, ContactId, ConversationId, DealId, OrgId, UserId};
use crate::domain::dna::LeadDna;
use crate::handoff::HandoffMode;
use crate::intent::IntentTag;

/// How many steps the state keeps embedded. The full per-day log lives in
/// the state store under its own key.
pub const RECENT_STEPS_CAP: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentRole {
    /// User-facing role: conversation flow and read-only lookups.
    Conversational,
    /// Silent mutation role, triggered after an approved action.
    Executor,
    Dna,
    Researcher,
    FollowUp,
}

/// One immutable record of what the orchestration engine decided and did
/// during a turn. Written once, never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorStep {
    pub step_id: String,
    pub agent: AgentRole,
    #[serde(default)]
    pub intent: Option<IntentTag>,
    #[serde(default)]
    pub skill_invoked: Option<String>,
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub mutations: Vec<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// The caller-supplied part of a step; id and timestamp are assigned at
/// emission time.
#[derive(Clone, Debug, PartialEq)]
pub struct StepDraft {
    pub agent: AgentRole,
    pub intent: Option<IntentTag>,
    pub skill_invoked: Option<String>,
    pub tools_used: Vec<String>,
    pub duration_ms: Option<i64>,
    pub mutations: Vec<String>,
    pub reasoning: Option<String>,
}

impl StepDraft {
    pub fn new(agent: AgentRole) -> Self {
        Self {
            agent,
            intent: None,
            skill_invoked: None,
            tools_used: Vec::new(),
            duration_ms: None,
            mutations: Vec::new(),
            reasoning: None,
        }
    }
}

/// Canonical per-conversation state. One storage key per (org, conversation)
/// pair, 24 h sliding expiry, no locking: concurrent turns race and the
/// later write wins unconditionally.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentState {
    pub conversation_id: ConversationId,
    pub org_id: OrgId,
    pub user_id: UserId,

    /// Denormalized, turn-refreshed projection. The dedicated handoff key is
    /// the authoritative value consulted at the start of every turn.
    pub handoff_mode: HandoffMode,

    #[serde(default)]
    pub current_intent: Option<IntentTag>,
    #[serde(default)]
    pub current_skill: Option<String>,
    #[serde(default)]
    pub board_id: Option<BoardId>,
    #[serde(default)]
    pub deal_id: Option<DealId>,
    #[serde(default)]
    pub contact_id: Option<ContactId>,

    pub lead_dna: LeadDna,

    #[serde(default)]
    pub recent_steps: Vec<OrchestratorStep>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentState {
    pub fn new(
        org_id: OrgId,
        conversation_id: ConversationId,
        user_id: UserId,
        board_id: Option<BoardId>,
        deal_id: Option<DealId>,
        contact_id: Option<ContactId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            conversation_id,
            org_id,
            user_id,
            handoff_mode: HandoffMode::Ai,
            current_intent: None,
            current_skill: None,
            board_id,
            deal_id,
            contact_id,
            lead_dna: LeadDna::empty(),
            recent_steps: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump `updated_at`, keeping it monotonically non-decreasing even if
    /// the wall clock steps backwards between merges.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Append a step to the bounded recent-steps ring, dropping the oldest
    /// entries beyond [`RECENT_STEPS_CAP`].
    pub fn push_step(&mut self, step: OrchestratorStep) {
        self.recent_steps.push(step);
        if self.recent_steps.len() > RECENT_STEPS_CAP {
            let overflow = self.recent_steps.len() - RECENT_STEPS_CAP;
            self.recent_steps.drain(..overflow);
        }
    }
}
