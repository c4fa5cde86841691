//! Deterministic intent classification and skill routing.
//!
//! The classifier is a pure function over an explicit ordered table of
//! phrase sets: the first tag with a matching phrase wins, so the order of
//! `INTENT_RULES` is part of the contract, not an accident of iteration.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentTag {
    Scheduling,
    GenerateProposal,
    ClassifyInbox,
    DealAction,
    ContactResearch,
    PipelineAnalysis,
    GeneralQuery,
    Unknown,
}

pub const ALL_INTENTS: [IntentTag; 8] = [
    IntentTag::Scheduling,
    IntentTag::GenerateProposal,
    IntentTag::ClassifyInbox,
    IntentTag::DealAction,
    IntentTag::ContactResearch,
    IntentTag::PipelineAnalysis,
    IntentTag::GeneralQuery,
    IntentTag::Unknown,
];

/// Priority-ordered phrase sets over Portuguese CRM vocabulary. Phrases are
/// lowercase; matching is case-insensitive substring containment. Accented
/// and plain spellings are both listed where users commonly drop accents.
const INTENT_RULES: &[(IntentTag, &[&str])] = &[
    (
        IntentTag::Scheduling,
        &[
            "agend", "reunião", "reuniao", "encontro", "call", "marcar", "hora", "horário",
            "horario",
        ],
    ),
    (IntentTag::GenerateProposal, &["proposta", "orçamento", "orcamento"]),
    (
        IntentTag::ClassifyInbox,
        &["classific", "categoriz", "inbox", "caixa de entrada", "etiquet"],
    ),
    (
        IntentTag::DealAction,
        &["mover", "criar deal", "ganho", "perdido", "atualizar deal"],
    ),
    (
        IntentTag::ContactResearch,
        &[
            "pesquisar contato",
            "linkedin",
            "enriquecer",
            "empresa do lead",
            "site da empresa",
        ],
    ),
    (
        IntentTag::PipelineAnalysis,
        &[
            "pipeline", "funil", "métricas", "metricas", "análise", "analise", "win rate", "kpi",
            "convertidos",
        ],
    ),
    (
        IntentTag::GeneralQuery,
        &["buscar", "listar", "mostrar", "quais", "quantos", "deal", "contato"],
    ),
];

/// Classify one user message. Pure and deterministic: identical input always
/// yields the identical tag; no phrase set matching yields `Unknown`.
pub fn classify(message: &str) -> IntentTag {
    let normalized = message.to_lowercase();
    for (tag, phrases) in INTENT_RULES {
        if phrases.iter().any(|phrase| normalized.contains(phrase)) {
            return *tag;
        }
    }
    IntentTag::Unknown
}

pub const SKILL_SCHEDULING: &str = "skill-scheduling";
pub const SKILL_GENERATE_PROPOSAL: &str = "skill-generate-proposal";
pub const SKILL_CLASSIFY_INBOX: &str = "skill-classify-inbox";
pub const SKILL_DEAL_ACTIONS: &str = "skill-deal-actions";
pub const SKILL_CONTACT_RESEARCH: &str = "skill-contact-research";

/// Map an intent to the skill that should handle it. Total: every tag,
/// including `Unknown`, routes somewhere — analytics, generic queries and
/// unknowns all fall through to the deal-actions skill.
pub fn resolve_skill(intent: IntentTag) -> &'static str {
    match intent {
        IntentTag::Scheduling => SKILL_SCHEDULING,
        IntentTag::GenerateProposal => SKILL_GENERATE_PROPOSAL,
        IntentTag::ClassifyInbox => SKILL_CLASSIFY_INBOX,
        IntentTag::ContactResearch => SKILL_CONTACT_RESEARCH,
        IntentTag::DealAction
        | IntentTag::PipelineAnalysis
        | IntentTag::GeneralQuery
        | IntentTag::Unknown => SKILL_DEAL_ACTIONS,
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, resolve_skill, IntentTag, ALL_INTENTS};

    #[test]
    fn scheduling_phrase_classifies_as_scheduling() {
        assert_eq!(classify("quero agendar uma reunião amanhã"), IntentTag::Scheduling);
    }

    #[test]
    fn small_talk_classifies_as_unknown() {
        assert_eq!(classify("bom dia, como vai?"), IntentTag::Unknown);
    }

    #[test]
    fn classification_is_deterministic_across_repeated_calls() {
        let message = "pode gerar uma proposta para o cliente?";
        let first = classify(message);
        for _ in 0..50 {
            assert_eq!(classify(message), first);
        }
        assert_eq!(first, IntentTag::GenerateProposal);
    }

    #[test]
    fn earlier_rules_win_over_later_ones() {
        // "marcar" (scheduling) appears before the deal-action vocabulary,
        // so a message carrying both routes to scheduling.
        assert_eq!(classify("marcar o deal como ganho"), IntentTag::Scheduling);
        // Without the scheduling verb the same request is a deal action.
        assert_eq!(classify("atualizar deal para ganho"), IntentTag::DealAction);
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(classify("MOSTRAR os contatos convertidos"), IntentTag::PipelineAnalysis);
        assert_eq!(classify("LISTAR deals"), IntentTag::GeneralQuery);
    }

    #[test]
    fn covers_each_category() {
        assert_eq!(classify("preciso de um orçamento"), IntentTag::GenerateProposal);
        assert_eq!(classify("classificar a caixa de entrada"), IntentTag::ClassifyInbox);
        assert_eq!(classify("mover o card para fechamento"), IntentTag::DealAction);
        assert_eq!(classify("enriquecer esse lead pelo linkedin"), IntentTag::ContactResearch);
        assert_eq!(classify("como está o funil este mês?"), IntentTag::PipelineAnalysis);
        assert_eq!(classify("quantos fechamos ontem?"), IntentTag::GeneralQuery);
    }

    #[test]
    fn skill_resolution_is_total_and_non_empty() {
        for intent in ALL_INTENTS {
            assert!(!resolve_skill(intent).is_empty(), "{intent:?} must map to a skill");
        }
    }

    #[test]
    fn unknown_routes_to_deal_actions() {
        assert_eq!(resolve_skill(IntentTag::Unknown), "skill-deal-actions");
        assert_eq!(resolve_skill(IntentTag::PipelineAnalysis), "skill-deal-actions");
        assert_eq!(resolve_skill(IntentTag::Scheduling), "skill-scheduling");
    }
}
