//! The per-turn protocol: load or create conversation state, resolve the
//! handoff gate, classify, route, and leave a step in the observability
//! trail. Lead profiling runs outside the turn, triggered by the ingress.

use std::sync::Arc;
use std::time::{Duration, Instant};

use leadflow_cache::{agent_state_key, get_json, set_json, KvStore, AGENT_STATE_TTL};
use leadflow_core::{
    classify, resolve_skill, AgentRole, AgentState, BoardId, ContactId, ConversationId, DealId,
    HandoffMode, IntentTag, OrgId, StepDraft, UserId,
};

use crate::dna::LeadDnaAgent;
use crate::handoff::HandoffController;
use crate::observability::StepEmitter;

const REASONING_PREFIX_CHARS: usize = 80;

#[derive(Clone, Debug)]
pub struct TurnInput {
    pub org_id: OrgId,
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub message: String,
    pub board_id: Option<BoardId>,
    pub deal_id: Option<DealId>,
    pub contact_id: Option<ContactId>,
}

#[derive(Clone, Debug)]
pub struct TurnOutput {
    pub state: AgentState,
    pub handoff_mode: HandoffMode,
    pub intent: IntentTag,
    pub skill: Option<String>,
    pub should_respond: bool,
}

pub struct Orchestrator {
    store: Arc<dyn KvStore>,
    handoff: HandoffController,
    emitter: StepEmitter,
    dna: Arc<LeadDnaAgent>,
    state_ttl: Duration,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn KvStore>,
        handoff: HandoffController,
        emitter: StepEmitter,
        dna: Arc<LeadDnaAgent>,
    ) -> Self {
        Self { store, handoff, emitter, dna, state_ttl: AGENT_STATE_TTL }
    }

    /// Override the conversation state lifetime.
    pub fn with_state_ttl(mut self, ttl: Duration) -> Self {
        self.state_ttl = ttl;
        self
    }

    /// Process one inbound user message.
    ///
    /// The conversation state is created and persisted on first contact even
    /// under HUMAN mode; the gate then decides whether anything else runs. A
    /// suppressed turn classifies nothing, emits no step and leaves the
    /// stored state exactly as it found it.
    pub async fn run_turn(&self, input: TurnInput) -> TurnOutput {
        let started = Instant::now();
        let mut state = self.get_or_create_state(&input).await;

        let mode = self.handoff.current_mode(&input.org_id, &input.conversation_id).await;
        if !HandoffController::should_ai_respond(mode) {
            tracing::info!(
                event_name = "turn.suppressed",
                organization_id = %input.org_id.0,
                conversation_id = %input.conversation_id.0,
                mode = mode.as_str(),
            );
            return TurnOutput {
                state,
                handoff_mode: mode,
                intent: IntentTag::Unknown,
                skill: None,
                should_respond: false,
            };
        }

        let intent = classify(&input.message);
        let skill = resolve_skill(intent).to_string();

        // Enrichment reads the cached profile only; extraction itself is the
        // ingress caller's job and never runs inside the turn.
        if let Some(contact_id) = input.contact_id.clone() {
            if let Some(dna) = self.dna.load_cached(&input.org_id, &contact_id).await {
                state.lead_dna = dna;
            }
            state.contact_id = Some(contact_id);
        }

        state.handoff_mode = mode;
        state.current_intent = Some(intent);
        state.current_skill = Some(skill.clone());
        if input.board_id.is_some() {
            state.board_id = input.board_id.clone();
        }
        if input.deal_id.is_some() {
            state.deal_id = input.deal_id.clone();
        }

        let draft = StepDraft {
            agent: AgentRole::Conversational,
            intent: Some(intent),
            skill_invoked: Some(skill.clone()),
            tools_used: Vec::new(),
            duration_ms: Some(started.elapsed().as_millis() as i64),
            mutations: Vec::new(),
            reasoning: Some(format!(
                "{intent:?} -> {skill} | \"{}\"",
                message_prefix(&input.message)
            )),
        };
        let step = self.emitter.emit(&input.org_id, draft).await;
        state.push_step(step);
        state.touch();

        self.save_state(&state).await;

        TurnOutput {
            state,
            handoff_mode: mode,
            intent,
            skill: Some(skill),
            should_respond: true,
        }
    }

    async fn load_state(&self, org: &OrgId, conversation: &ConversationId) -> Option<AgentState> {
        let key = agent_state_key(org, conversation);
        match get_json::<AgentState>(self.store.as_ref(), &key).await {
            Ok(state) => state,
            Err(error) => {
                tracing::warn!(
                    event_name = "turn.state_read_failed",
                    organization_id = %org.0,
                    conversation_id = %conversation.0,
                    error = %error,
                    "continuing from a fresh state"
                );
                None
            }
        }
    }

    async fn get_or_create_state(&self, input: &TurnInput) -> AgentState {
        match self.load_state(&input.org_id, &input.conversation_id).await {
            Some(state) => state,
            None => {
                let state = fresh_state(input);
                self.save_state(&state).await;
                state
            }
        }
    }

    /// Last write wins: concurrent turns over the same conversation race and
    /// the later save replaces the earlier one wholesale.
    async fn save_state(&self, state: &AgentState) {
        let key = agent_state_key(&state.org_id, &state.conversation_id);
        if let Err(error) =
            set_json(self.store.as_ref(), &key, state, self.state_ttl).await
        {
            tracing::warn!(
                event_name = "turn.state_write_failed",
                organization_id = %state.org_id.0,
                conversation_id = %state.conversation_id.0,
                error = %error,
            );
        }
    }
}

fn fresh_state(input: &TurnInput) -> AgentState {
    AgentState::new(
        input.org_id.clone(),
        input.conversation_id.clone(),
        input.user_id.clone(),
        input.board_id.clone(),
        input.deal_id.clone(),
        input.contact_id.clone(),
    )
}

fn message_prefix(message: &str) -> String {
    message.chars().take(REASONING_PREFIX_CHARS).collect()
}
