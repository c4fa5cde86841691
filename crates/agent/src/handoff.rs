use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use leadflow_cache::{handoff_mode_key, KvStore, HANDOFF_TTL};
use leadflow_core::{
    handoff::is_valid_transition, ConversationId, HandoffMode, HandoffTransition, OrgId,
    RequestError,
};

/// Authoritative owner of the per-conversation handoff mode.
///
/// Reads fail open: a missing key, an undecodable value or an unreachable
/// store all resolve to AI, so a degraded state store can silence the
/// assistant for a takeover that never happened but can never mute it by
/// default.
pub struct HandoffController {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl HandoffController {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store, ttl: HANDOFF_TTL }
    }

    /// Override the mode key lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn current_mode(&self, org: &OrgId, conversation: &ConversationId) -> HandoffMode {
        let key = handoff_mode_key(org, conversation);
        let raw = match self.store.get(&key).await {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(
                    event_name = "handoff.read_failed",
                    organization_id = %org.0,
                    conversation_id = %conversation.0,
                    error = %error,
                    "assuming AI mode"
                );
                return HandoffMode::default();
            }
        };

        match raw {
            Some(value) => value.parse().unwrap_or_else(|error| {
                tracing::warn!(
                    event_name = "handoff.decode_failed",
                    organization_id = %org.0,
                    conversation_id = %conversation.0,
                    error = %error,
                    "assuming AI mode"
                );
                HandoffMode::default()
            }),
            None => HandoffMode::default(),
        }
    }

    /// Switch the mode, enforcing the transition matrix. The write is not
    /// fail-open: a caller asking for a takeover must know whether it stuck.
    pub async fn transition(
        &self,
        org: &OrgId,
        conversation: &ConversationId,
        to: HandoffMode,
    ) -> Result<HandoffTransition, RequestError> {
        let from = self.current_mode(org, conversation).await;
        if !is_valid_transition(from, to) {
            return Err(RequestError::StateConflict { from, to });
        }

        let key = handoff_mode_key(org, conversation);
        self.store
            .set(&key, to.as_str(), self.ttl)
            .await
            .map_err(|error| RequestError::Persistence(error.to_string()))?;

        tracing::info!(
            event_name = "handoff.transitioned",
            organization_id = %org.0,
            conversation_id = %conversation.0,
            from = from.as_str(),
            to = to.as_str(),
        );

        Ok(HandoffTransition {
            previous_mode: from,
            new_mode: to,
            changed: from != to,
            timestamp: Utc::now(),
        })
    }

    /// A human operator sent a message: take the conversation over. Already
    /// being in HUMAN mode is a no-op, not a conflict.
    pub async fn note_human_message(
        &self,
        org: &OrgId,
        conversation: &ConversationId,
    ) -> Result<HandoffTransition, RequestError> {
        let current = self.current_mode(org, conversation).await;
        if current == HandoffMode::Human {
            return Ok(HandoffTransition {
                previous_mode: current,
                new_mode: current,
                changed: false,
                timestamp: Utc::now(),
            });
        }
        self.transition(org, conversation, HandoffMode::Human).await
    }

    /// Whether the assistant may produce a reply under the given mode.
    pub fn should_ai_respond(mode: HandoffMode) -> bool {
        mode != HandoffMode::Human
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use leadflow_cache::{KvStore, MemoryStore, UnavailableStore};
    use leadflow_core::{ConversationId, HandoffMode, OrgId, RequestError};

    use super::HandoffController;

    fn ids() -> (OrgId, ConversationId) {
        (OrgId("org-1".to_string()), ConversationId("conv-1".to_string()))
    }

    #[tokio::test]
    async fn absent_key_reads_as_ai_mode() {
        let controller = HandoffController::new(Arc::new(MemoryStore::new()));
        let (org, conversation) = ids();
        assert_eq!(controller.current_mode(&org, &conversation).await, HandoffMode::Ai);
    }

    #[tokio::test]
    async fn unreachable_store_fails_open_to_ai() {
        let controller = HandoffController::new(Arc::new(UnavailableStore));
        let (org, conversation) = ids();
        assert_eq!(controller.current_mode(&org, &conversation).await, HandoffMode::Ai);
    }

    #[tokio::test]
    async fn garbage_stored_value_falls_back_to_ai() {
        let store = Arc::new(MemoryStore::new());
        let (org, conversation) = ids();
        store
            .set("handoffMode:org-1:conv-1", "PAUSED", Duration::from_secs(60))
            .await
            .unwrap();

        let controller = HandoffController::new(store);
        assert_eq!(controller.current_mode(&org, &conversation).await, HandoffMode::Ai);
    }

    #[tokio::test]
    async fn transition_persists_and_reports_the_previous_mode() {
        let controller = HandoffController::new(Arc::new(MemoryStore::new()));
        let (org, conversation) = ids();

        let transition =
            controller.transition(&org, &conversation, HandoffMode::Human).await.expect("switch");
        assert_eq!(transition.previous_mode, HandoffMode::Ai);
        assert_eq!(transition.new_mode, HandoffMode::Human);
        assert!(transition.changed);

        assert_eq!(controller.current_mode(&org, &conversation).await, HandoffMode::Human);
    }

    #[tokio::test]
    async fn self_transition_is_a_state_conflict() {
        let controller = HandoffController::new(Arc::new(MemoryStore::new()));
        let (org, conversation) = ids();

        let result = controller.transition(&org, &conversation, HandoffMode::Ai).await;
        assert!(matches!(
            result,
            Err(RequestError::StateConflict { from: HandoffMode::Ai, to: HandoffMode::Ai })
        ));
    }

    #[tokio::test]
    async fn failed_write_surfaces_as_a_persistence_error() {
        let controller = HandoffController::new(Arc::new(UnavailableStore));
        let (org, conversation) = ids();

        let result = controller.transition(&org, &conversation, HandoffMode::Human).await;
        assert!(matches!(result, Err(RequestError::Persistence(_))));
    }

    #[tokio::test]
    async fn human_message_takes_over_and_is_idempotent() {
        let controller = HandoffController::new(Arc::new(MemoryStore::new()));
        let (org, conversation) = ids();

        let first = controller.note_human_message(&org, &conversation).await.expect("take over");
        assert!(first.changed);
        assert_eq!(first.new_mode, HandoffMode::Human);

        let second = controller.note_human_message(&org, &conversation).await.expect("repeat");
        assert!(!second.changed);
        assert_eq!(controller.current_mode(&org, &conversation).await, HandoffMode::Human);
    }

    #[tokio::test]
    async fn configured_ttl_expires_the_stored_mode() {
        let controller =
            HandoffController::new(Arc::new(MemoryStore::new())).with_ttl(Duration::from_millis(20));
        let (org, conversation) = ids();

        controller.transition(&org, &conversation, HandoffMode::Human).await.expect("switch");
        assert_eq!(controller.current_mode(&org, &conversation).await, HandoffMode::Human);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(controller.current_mode(&org, &conversation).await, HandoffMode::Ai);
    }

    #[test]
    fn ai_and_hybrid_respond_human_does_not() {
        assert!(HandoffController::should_ai_respond(HandoffMode::Ai));
        assert!(HandoffController::should_ai_respond(HandoffMode::Hybrid));
        assert!(!HandoffController::should_ai_respond(HandoffMode::Human));
    }
}
