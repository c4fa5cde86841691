//! Background lead-signal extraction.
//!
//! Extraction is heuristic and deterministic over Portuguese sales
//! vocabulary: marker phrases followed by free-text captures for pains and
//! objections, monetary snippets for ticket and revenue. No language model
//! is involved, so extraction costs nothing per message.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use leadflow_cache::{get_json, lead_dna_key, set_json, KvStore, LEAD_DNA_TTL};
use leadflow_core::{ContactId, DnaSignal, DnaUpdate, LeadDna, OrgId, SignalKind};
use leadflow_db::LeadDnaRepository;

/// Free-text captures shorter than this are noise, longer ones are clipped.
const MIN_CAPTURE_LEN: usize = 5;
const MAX_CAPTURE_LEN: usize = 120;

/// Markers whose trailing clause names a pain point.
const PAIN_MARKERS: &[&str] = &[
    "nosso maior problema é ",
    "nosso maior problema e ",
    "sofremos com ",
    "temos dificuldade com ",
    "temos dificuldade em ",
    "temos dificuldade para ",
    "temos dificuldades com ",
    "temos dificuldades em ",
    "temos dificuldades para ",
    "não conseguimos ",
    "nao conseguimos ",
    "falta ",
    "faltam ",
    "perdemos tempo com ",
    "perdemos tempo por ",
    "perdemos dinheiro com ",
    "perdemos dinheiro por ",
    "perdemos cliente com ",
    "perdemos cliente por ",
];

/// Markers whose trailing clause names who or what blocks the deal.
const OBJECTION_CAPTURE_MARKERS: &[&str] = &[
    "já temos ",
    "ja temos ",
    "já usamos ",
    "ja usamos ",
    "já trabalhamos com ",
    "ja trabalhamos com ",
    "preciso conversar ",
    "falar com ",
    "aprovação do ",
    "aprovação da ",
    "aprovacao do ",
    "aprovacao da ",
];

/// Objections recorded verbatim, no capture needed.
const OBJECTION_PHRASES: &[&str] = &[
    "muito caro",
    "não temos orçamento",
    "nao temos orcamento",
    "orçamento limitado",
    "orcamento limitado",
    "preço alto",
    "preco alto",
    "não é o momento",
    "nao e o momento",
    "momento errado",
    "agora não",
    "agora nao",
    "vou pensar",
    "não estou convencido",
    "nao estou convencido",
    "não vi valor",
    "nao vi valor",
    "sem roi",
];

const TICKET_MARKERS: &[&str] = &[
    "ticket médio",
    "ticket medio",
    "ticket de",
    "investimento de",
    "investimento em",
    "investimento até",
    "investimento ate",
    "investir ",
];

const REVENUE_MARKERS: &[&str] = &[
    "faturamento de",
    "faturamento é",
    "faturamento e ",
    "faturamento mensal de",
    "faturamento anual de",
    "fatura ",
    "receita de",
    "receita anual de",
    "receita mensal de",
];

const THOUSAND_WORDS: &[&str] = &["mil", "k"];
const MILLION_WORDS: &[&str] = &[
    "m", "mi", "milhao", "milhão", "milhoes", "milhões", "bilhao", "bilhão", "bilhoes", "bilhões",
];

/// Extract a partial profile update from one user message. Pure function;
/// identical input always yields the identical capture set.
pub fn extract(message: &str) -> DnaUpdate {
    let normalized = message.to_lowercase();
    let now = Utc::now();
    let mut update = DnaUpdate::default();

    for pain in captures_after(&normalized, PAIN_MARKERS) {
        update.signals.push(DnaSignal {
            kind: SignalKind::Pain,
            value: pain.clone(),
            confidence: 0.75,
            extracted_at: now,
        });
        update.pains.push(pain);
    }

    let mut objections = captures_after(&normalized, OBJECTION_CAPTURE_MARKERS);
    for phrase in OBJECTION_PHRASES {
        if normalized.contains(phrase) && !objections.contains(&(*phrase).to_string()) {
            objections.push((*phrase).to_string());
        }
    }
    for objection in objections {
        update.signals.push(DnaSignal {
            kind: SignalKind::Objection,
            value: objection.clone(),
            confidence: 0.7,
            extracted_at: now,
        });
        update.objections.push(objection);
    }

    let revenue = REVENUE_MARKERS
        .iter()
        .filter_map(|marker| monetary_after(&normalized, marker))
        .next();
    if let Some((revenue, snippet)) = &revenue {
        update.revenue = Some(*revenue);
        update.signals.push(DnaSignal {
            kind: SignalKind::Revenue,
            value: snippet.clone(),
            confidence: 0.78,
            extracted_at: now,
        });
    }

    // A currency amount introduced by a revenue marker still counts as the
    // ticket when no dedicated ticket marker is present.
    let ticket = TICKET_MARKERS
        .iter()
        .filter_map(|marker| monetary_after(&normalized, marker))
        .next()
        .or_else(|| first_currency_snippet(&normalized));
    if let Some((ticket, snippet)) = ticket {
        update.avg_ticket = Some(ticket);
        update.signals.push(DnaSignal {
            kind: SignalKind::Ticket,
            value: snippet,
            confidence: 0.8,
            extracted_at: now,
        });
    }

    update
}

/// Parse a Brazilian-format monetary snippet like `R$ 1.200,50`, `5 mil` or
/// `2,5 milhões`. Dots are thousand separators and are stripped; the comma
/// is the decimal mark. Returns `None` when no number is present.
pub fn parse_monetary(snippet: &str) -> Option<f64> {
    let normalized = snippet.to_lowercase();
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    let position = tokens.iter().position(|t| t.chars().any(|c| c.is_ascii_digit()))?;

    let number_token = tokens[position].trim_start_matches("r$").trim_start_matches("brl");
    let (digits, inline_scale) = split_inline_scale(number_token);

    let cleaned: String = digits
        .chars()
        .filter(|c| *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    let amount: f64 = cleaned.parse().ok()?;

    let scale_word = inline_scale.or_else(|| {
        tokens
            .get(position + 1)
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|t| !t.is_empty())
    });

    Some(amount * scale_factor(scale_word))
}

fn split_inline_scale(token: &str) -> (&str, Option<&str>) {
    for scale in THOUSAND_WORDS.iter().chain(MILLION_WORDS) {
        if let Some(prefix) = token.strip_suffix(scale) {
            if !prefix.is_empty() && prefix.chars().any(|c| c.is_ascii_digit()) {
                return (prefix, Some(*scale));
            }
        }
    }
    (token, None)
}

fn scale_factor(word: Option<&str>) -> f64 {
    match word {
        Some(word) if THOUSAND_WORDS.contains(&word) => 1_000.0,
        Some(word) if MILLION_WORDS.contains(&word) => 1_000_000.0,
        _ => 1.0,
    }
}

fn captures_after(text: &str, markers: &[&str]) -> Vec<String> {
    let mut captures = Vec::new();
    for marker in markers {
        let mut search_from = 0;
        while let Some(found) = text[search_from..].find(marker) {
            let capture_start = search_from + found + marker.len();
            search_from = capture_start;

            let tail = &text[capture_start..];
            let end = tail
                .find(|c: char| matches!(c, ',' | '.' | '!' | '?' | '\n'))
                .unwrap_or(tail.len());
            let capture = clip(tail[..end].trim(), MAX_CAPTURE_LEN);

            if capture.chars().count() >= MIN_CAPTURE_LEN && !captures.contains(&capture) {
                captures.push(capture);
            }
        }
    }
    captures
}

fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Money found within a short window after a marker phrase.
fn monetary_after(text: &str, marker: &str) -> Option<(f64, String)> {
    let position = text.find(marker)?;
    let window_start = position + marker.len();
    let window = clip(&text[window_start..], 48);

    let snippet = currency_snippet(&window)?;
    let value = parse_monetary(&snippet)?;
    Some((value, snippet))
}

/// First standalone currency mention anywhere in the text.
fn first_currency_snippet(text: &str) -> Option<(f64, String)> {
    let mut search_from = 0;
    while let Some(found) = text[search_from..].find("r$") {
        let at = search_from + found;
        let window = clip(&text[at..], 48);
        search_from = at + 2;

        let Some(snippet) = currency_snippet(&window) else { continue };
        if let Some(value) = parse_monetary(&snippet) {
            return Some((value, snippet));
        }
    }
    None
}

/// Pull `r$ <number> [scale-word]` out of a window of text.
fn currency_snippet(window: &str) -> Option<String> {
    let digit_at = window.find(|c: char| c.is_ascii_digit())?;

    let number: String = window[digit_at..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | ','))
        .collect();
    let number = number.trim_end_matches(['.', ',']).to_string();
    if number.is_empty() {
        return None;
    }

    let after_number = digit_at + number.len();
    let scale = window[after_number..]
        .split_whitespace()
        .next()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|t| {
            THOUSAND_WORDS.contains(&t.as_str()) || MILLION_WORDS.contains(&t.as_str())
        });

    Some(match scale {
        Some(scale) => format!("r$ {number} {scale}"),
        None => format!("r$ {number}"),
    })
}

/// Owns the profile lifecycle: load-through cache, merge, write back to both
/// the state store and the durable table.
pub struct LeadDnaAgent {
    store: Arc<dyn KvStore>,
    repository: Arc<dyn LeadDnaRepository>,
    ttl: Duration,
}

impl LeadDnaAgent {
    pub fn new(store: Arc<dyn KvStore>, repository: Arc<dyn LeadDnaRepository>) -> Self {
        Self { store, repository, ttl: LEAD_DNA_TTL }
    }

    /// Override the cached profile lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Cached profile only; the durable table is never consulted. The turn
    /// path reads through this so a slow database cannot stall a reply.
    pub async fn load_cached(&self, org: &OrgId, contact: &ContactId) -> Option<LeadDna> {
        let key = lead_dna_key(org, contact);
        match get_json::<LeadDna>(self.store.as_ref(), &key).await {
            Ok(dna) => dna,
            Err(error) => {
                tracing::warn!(
                    event_name = "dna.cache_read_failed",
                    organization_id = %org.0,
                    error = %error,
                );
                None
            }
        }
    }

    /// Current profile for a contact: cache first, durable table on a miss,
    /// empty when the contact has never been profiled. Never fails; a broken
    /// store degrades to the durable copy, a broken database to empty.
    pub async fn load(&self, org: &OrgId, contact: &ContactId) -> LeadDna {
        let key = lead_dna_key(org, contact);
        match get_json::<LeadDna>(self.store.as_ref(), &key).await {
            Ok(Some(dna)) => return dna,
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(
                    event_name = "dna.cache_read_failed",
                    organization_id = %org.0,
                    error = %error,
                    "falling back to durable profile"
                );
            }
        }

        match self.repository.find(org, contact).await {
            Ok(Some(dna)) => {
                if let Err(error) =
                    set_json(self.store.as_ref(), &key, &dna, self.ttl).await
                {
                    tracing::warn!(
                        event_name = "dna.cache_backfill_failed",
                        organization_id = %org.0,
                        error = %error,
                    );
                }
                dna
            }
            Ok(None) => LeadDna::empty(),
            Err(error) => {
                tracing::warn!(
                    event_name = "dna.durable_read_failed",
                    organization_id = %org.0,
                    error = %error,
                    "profiling continues from an empty profile"
                );
                LeadDna::empty()
            }
        }
    }

    /// Run one extraction pass over a message and persist the merged
    /// profile. The cache write is synchronous; the durable upsert runs
    /// detached with its own error log, so the caller always gets the
    /// merged profile back.
    pub async fn ingest(&self, org: &OrgId, contact: &ContactId, message: &str) -> LeadDna {
        let update = extract(message);
        let existing = self.load(org, contact).await;
        let merged = LeadDna::merged(Some(existing), update);

        let key = lead_dna_key(org, contact);
        if let Err(error) = set_json(self.store.as_ref(), &key, &merged, self.ttl).await {
            tracing::warn!(
                event_name = "dna.cache_write_failed",
                organization_id = %org.0,
                error = %error,
            );
        }

        let repository = Arc::clone(&self.repository);
        let durable = merged.clone();
        let org_id = org.clone();
        let contact_id = contact.clone();
        tokio::spawn(async move {
            if let Err(error) = repository.upsert(&org_id, &contact_id, &durable).await {
                tracing::error!(
                    event_name = "dna.durable_upsert_failed",
                    organization_id = %org_id.0,
                    contact_id = %contact_id.0,
                    error = %error,
                );
            }
        });

        if !merged.pains.is_empty() || !merged.objections.is_empty() {
            tracing::debug!(
                event_name = "dna.extracted",
                organization_id = %org.0,
                pains = merged.pains.len(),
                objections = merged.objections.len(),
                has_ticket = merged.avg_ticket.is_some(),
                has_revenue = merged.revenue.is_some(),
            );
        }

        merged
    }

    /// Fire-and-forget extraction. The turn never waits on it and never
    /// fails because of it; errors surface only in the log.
    pub fn spawn_extraction(self: &Arc<Self>, org: OrgId, contact: ContactId, message: String) {
        let agent = Arc::clone(self);
        tokio::spawn(async move {
            agent.ingest(&org, &contact, &message).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use leadflow_cache::{MemoryStore, UnavailableStore};
    use leadflow_core::{ContactId, LeadDna, OrgId, SignalKind};
    use leadflow_db::{InMemoryLeadDnaRepository, LeadDnaRepository, RepositoryError};

    use super::{extract, parse_monetary, LeadDnaAgent};

    struct RejectingLeadDnaRepository;

    #[async_trait]
    impl LeadDnaRepository for RejectingLeadDnaRepository {
        async fn find(
            &self,
            _org: &OrgId,
            _contact: &ContactId,
        ) -> Result<Option<LeadDna>, RepositoryError> {
            Ok(None)
        }

        async fn upsert(
            &self,
            _org: &OrgId,
            _contact: &ContactId,
            _dna: &LeadDna,
        ) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("durable store down".to_string()))
        }
    }

    #[test]
    fn extracts_a_pain_clause_after_a_marker() {
        let update = extract("Nosso maior problema é perder leads no funil, sem dúvida.");
        assert_eq!(update.pains, vec!["perder leads no funil".to_string()]);
        assert_eq!(update.signals[0].kind, SignalKind::Pain);
        assert_eq!(update.signals[0].confidence, 0.75);
    }

    #[test]
    fn short_captures_are_discarded() {
        let update = extract("falta foco.");
        assert!(update.pains.is_empty());
    }

    #[test]
    fn verbatim_objection_phrases_are_recorded() {
        let update = extract("Achei muito caro, vou pensar.");
        assert_eq!(
            update.objections,
            vec!["muito caro".to_string(), "vou pensar".to_string()]
        );
        assert!(update.signals.iter().all(|s| s.confidence == 0.7));
    }

    #[test]
    fn ticket_in_thousands_is_scaled() {
        let update = extract("Nosso ticket médio é R$ 5 mil por cliente.");
        assert_eq!(update.avg_ticket, Some(5_000.0));
        assert!(update.signals.iter().any(|s| s.kind == SignalKind::Ticket));
    }

    #[test]
    fn revenue_with_comma_decimal_and_million_scale() {
        let update = extract("Temos faturamento de R$ 2,5 milhões por ano.");
        assert_eq!(update.revenue, Some(2_500_000.0));
    }

    #[test]
    fn revenue_amount_counts_for_both_revenue_and_ticket() {
        let update = extract("Nossa receita de R$ 300 mil mensais.");
        assert_eq!(update.revenue, Some(300_000.0));
        assert_eq!(update.avg_ticket, Some(300_000.0));
    }

    #[test]
    fn standalone_currency_counts_as_ticket() {
        let update = extract("Podemos pagar R$ 1.200,50 por mês.");
        assert_eq!(update.avg_ticket, Some(1_200.5));
    }

    #[test]
    fn message_without_signals_yields_an_empty_update() {
        let update = extract("bom dia, tudo bem?");
        assert!(update.pains.is_empty());
        assert!(update.objections.is_empty());
        assert_eq!(update.avg_ticket, None);
        assert_eq!(update.revenue, None);
        assert!(update.signals.is_empty());
    }

    #[test]
    fn parse_monetary_handles_brazilian_formats() {
        assert_eq!(parse_monetary("r$ 5 mil"), Some(5_000.0));
        assert_eq!(parse_monetary("r$ 1.200,50"), Some(1_200.5));
        assert_eq!(parse_monetary("2,5 milhões"), Some(2_500_000.0));
        assert_eq!(parse_monetary("r$ 80k"), Some(80_000.0));
        assert_eq!(parse_monetary("sem número"), None);
    }

    #[tokio::test]
    async fn ingest_merges_into_the_existing_profile() {
        let store = Arc::new(MemoryStore::new());
        let repository = Arc::new(InMemoryLeadDnaRepository::default());
        let agent = LeadDnaAgent::new(store, repository.clone());
        let org = OrgId("org-1".to_string());
        let contact = ContactId("contact-1".to_string());

        agent.ingest(&org, &contact, "Nosso maior problema é perder leads no funil.").await;
        let merged = agent.ingest(&org, &contact, "Achei muito caro. Ticket médio R$ 5 mil.").await;

        assert_eq!(merged.pains.len(), 1);
        assert_eq!(merged.objections, vec!["muito caro".to_string()]);
        assert_eq!(merged.avg_ticket, Some(5_000.0));

        // The durable upsert is detached from the ingest call; poll for it.
        let mut durable = repository.find(&org, &contact).await.expect("find");
        for _ in 0..100 {
            if durable.as_ref().is_some_and(|dna| dna.avg_ticket == Some(5_000.0)) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            durable = repository.find(&org, &contact).await.expect("find");
        }
        assert_eq!(durable.expect("durable copy exists").avg_ticket, Some(5_000.0));
    }

    #[tokio::test]
    async fn durable_failure_still_yields_the_merged_profile() {
        let agent =
            LeadDnaAgent::new(Arc::new(MemoryStore::new()), Arc::new(RejectingLeadDnaRepository));
        let org = OrgId("org-1".to_string());
        let contact = ContactId("contact-1".to_string());

        let merged =
            agent.ingest(&org, &contact, "Nosso maior problema é perder leads no funil.").await;
        assert_eq!(merged.pains, vec!["perder leads no funil".to_string()]);

        // The cached copy survives for the next read even though the durable
        // write keeps failing.
        assert_eq!(agent.load(&org, &contact).await.pains, merged.pains);
    }

    #[tokio::test]
    async fn cache_only_read_never_consults_the_durable_table() {
        let repository = Arc::new(InMemoryLeadDnaRepository::default());
        let org = OrgId("org-1".to_string());
        let contact = ContactId("contact-1".to_string());
        let seeded = LeadDna::merged(None, extract("Sofremos com retrabalho manual."));
        repository.upsert(&org, &contact, &seeded).await.expect("seed");

        let agent = LeadDnaAgent::new(Arc::new(MemoryStore::new()), repository);
        assert!(agent.load_cached(&org, &contact).await.is_none());
        assert_eq!(agent.load(&org, &contact).await.pains, seeded.pains);
    }

    #[tokio::test]
    async fn broken_store_degrades_to_the_durable_copy() {
        let repository = Arc::new(InMemoryLeadDnaRepository::default());
        let seeded = LeadDna::merged(None, super::extract("Sofremos com retrabalho manual."));
        repository
            .upsert(&OrgId("org-1".to_string()), &ContactId("contact-1".to_string()), &seeded)
            .await
            .expect("seed");

        let agent = LeadDnaAgent::new(Arc::new(UnavailableStore), repository);
        let loaded = agent
            .load(&OrgId("org-1".to_string()), &ContactId("contact-1".to_string()))
            .await;
        assert_eq!(loaded.pains, vec!["retrabalho manual".to_string()]);
    }
}
