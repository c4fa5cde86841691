use leadflow_core::AgentState;

/// Render the turn context handed to the language model: conversation
/// anchors plus everything the lead profile has learned so far. Plain text,
/// one fact per line, Portuguese labels matching the assistant's voice.
pub fn context_block(state: &AgentState) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Conversa: {}", state.conversation_id.0));
    if let Some(board) = &state.board_id {
        lines.push(format!("Board atual: {}", board.0));
    }
    if let Some(deal) = &state.deal_id {
        lines.push(format!("Deal em foco: {}", deal.0));
    }
    if let Some(intent) = state.current_intent {
        lines.push(format!("Última intenção: {intent:?}"));
    }

    let dna = &state.lead_dna;
    if !dna.pains.is_empty() {
        lines.push(format!("Dores do lead: {}", dna.pains.join("; ")));
    }
    if !dna.objections.is_empty() {
        lines.push(format!("Objeções levantadas: {}", dna.objections.join("; ")));
    }
    if let Some(ticket) = dna.avg_ticket {
        lines.push(format!("Ticket médio: R$ {ticket:.2}"));
    }
    if let Some(revenue) = dna.revenue {
        lines.push(format!("Faturamento: R$ {revenue:.2}"));
    }
    if let Some(decision_maker) = &dna.decision_maker {
        lines.push(format!("Decisor: {decision_maker}"));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use leadflow_core::{
        AgentState, BoardId, ContactId, ConversationId, DnaUpdate, LeadDna, OrgId, UserId,
    };

    use super::context_block;

    fn state_fixture() -> AgentState {
        AgentState::new(
            OrgId("org-1".to_string()),
            ConversationId("conv-1".to_string()),
            UserId("user-1".to_string()),
            Some(BoardId("board-9".to_string())),
            None,
            Some(ContactId("contact-3".to_string())),
        )
    }

    #[test]
    fn context_includes_profile_facts_when_present() {
        let mut state = state_fixture();
        state.lead_dna = LeadDna::merged(
            None,
            DnaUpdate {
                pains: vec!["perder leads no funil".to_string()],
                objections: vec!["muito caro".to_string()],
                avg_ticket: Some(5_000.0),
                revenue: None,
                signals: Vec::new(),
            },
        );

        let block = context_block(&state);
        assert!(block.contains("conv-1"));
        assert!(block.contains("board-9"));
        assert!(block.contains("perder leads no funil"));
        assert!(block.contains("muito caro"));
        assert!(block.contains("R$ 5000.00"));
        assert!(!block.contains("Faturamento"));
    }

    #[test]
    fn empty_profile_renders_only_conversation_anchors() {
        let block = context_block(&state_fixture());
        assert!(block.contains("Conversa: conv-1"));
        assert!(!block.contains("Dores do lead"));
        assert!(!block.contains("Decisor"));
    }
}
