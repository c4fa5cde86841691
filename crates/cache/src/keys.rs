//! Key namespacing for the state store.
//!
//! Every key embeds the organization id as the first segment after the
//! namespace, so tenants can never read or overwrite each other's state.

use std::time::Duration;

use chrono::NaiveDate;
use leadflow_core::{ContactId, ConversationId, OrgId};

pub const AGENT_STATE_TTL: Duration = Duration::from_secs(60 * 60 * 24);
pub const LEAD_DNA_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 30);
pub const HANDOFF_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 7);
pub const OBSERVABILITY_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 7);

/// Canonical per-conversation state, 24 h sliding expiry.
pub fn agent_state_key(org: &OrgId, conversation: &ConversationId) -> String {
    format!("agentState:{}:{}", org.0, conversation.0)
}

/// Cached lead profile, 30 d sliding expiry. The durable copy lives in the
/// database; this key only accelerates reads.
pub fn lead_dna_key(org: &OrgId, contact: &ContactId) -> String {
    format!("leadDna:{}:{}", org.0, contact.0)
}

/// Authoritative handoff mode, 7 d sliding expiry. Absence means AI.
pub fn handoff_mode_key(org: &OrgId, conversation: &ConversationId) -> String {
    format!("handoffMode:{}:{}", org.0, conversation.0)
}

/// Per-day observability log, newest first, 7 d expiry from last write.
pub fn observability_log_key(org: &OrgId, date: NaiveDate) -> String {
    format!("obs:{}:{}", org.0, date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use leadflow_core::{ContactId, ConversationId, OrgId};

    use super::{agent_state_key, handoff_mode_key, lead_dna_key, observability_log_key};

    #[test]
    fn keys_are_namespaced_by_organization() {
        let org_a = OrgId("org-a".to_string());
        let org_b = OrgId("org-b".to_string());
        let conversation = ConversationId("conv-1".to_string());

        assert_eq!(agent_state_key(&org_a, &conversation), "agentState:org-a:conv-1");
        assert_ne!(
            agent_state_key(&org_a, &conversation),
            agent_state_key(&org_b, &conversation)
        );
        assert_eq!(handoff_mode_key(&org_a, &conversation), "handoffMode:org-a:conv-1");
    }

    #[test]
    fn dna_key_uses_the_contact_not_the_conversation() {
        let org = OrgId("org-a".to_string());
        let contact = ContactId("contact-9".to_string());
        assert_eq!(lead_dna_key(&org, &contact), "leadDna:org-a:contact-9");
    }

    #[test]
    fn observability_key_embeds_the_iso_date() {
        let org = OrgId("org-a".to_string());
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(observability_log_key(&org, date), "obs:org-a:2026-03-07");
    }
}
