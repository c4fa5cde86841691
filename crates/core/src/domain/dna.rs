use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signal history is an append log, not a set: the newest 50 records are
/// kept, oldest dropped first. Only pains/objections are deduplicated.
pub const SIGNAL_HISTORY_CAP: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    Pain,
    Objection,
    Ticket,
    Revenue,
    DecisionMaker,
}

/// One immutable extraction event. Appended to a profile's history and never
/// mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnaSignal {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub value: String,
    /// Heuristic confidence in 0.0..=1.0.
    pub confidence: f32,
    pub extracted_at: DateTime<Utc>,
}

/// Durable, incrementally-extracted profile of a contact: expressed pain
/// points, objections, and monetary indicators. Mutated only through
/// [`LeadDna::merged`]; read by the orchestrator to enrich turn context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadDna {
    #[serde(default)]
    pub pains: Vec<String>,
    #[serde(default)]
    pub objections: Vec<String>,
    #[serde(default)]
    pub avg_ticket: Option<f64>,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub decision_maker: Option<String>,
    #[serde(default)]
    pub signals: Vec<DnaSignal>,
    pub last_updated: DateTime<Utc>,
}

/// Partial result of one extraction pass over a single message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DnaUpdate {
    pub pains: Vec<String>,
    pub objections: Vec<String>,
    pub avg_ticket: Option<f64>,
    pub revenue: Option<f64>,
    pub signals: Vec<DnaSignal>,
}

impl LeadDna {
    pub fn empty() -> Self {
        Self {
            pains: Vec::new(),
            objections: Vec::new(),
            avg_ticket: None,
            revenue: None,
            decision_maker: None,
            signals: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    /// Merge a fresh extraction into an existing profile.
    ///
    /// Pains and objections are unioned as ordered sets; ticket/revenue take
    /// the fresh value when present and fall back to the existing one;
    /// `decision_maker` is carried over unchanged (the extraction pipeline
    /// never sets it); the signal history is existing + fresh truncated to
    /// the newest [`SIGNAL_HISTORY_CAP`] records.
    pub fn merged(existing: Option<LeadDna>, update: DnaUpdate) -> LeadDna {
        let existing = existing.unwrap_or_else(LeadDna::empty);

        let pains = ordered_union(existing.pains, update.pains);
        let objections = ordered_union(existing.objections, update.objections);

        let mut signals = existing.signals;
        signals.extend(update.signals);
        if signals.len() > SIGNAL_HISTORY_CAP {
            let overflow = signals.len() - SIGNAL_HISTORY_CAP;
            signals.drain(..overflow);
        }

        LeadDna {
            pains,
            objections,
            avg_ticket: update.avg_ticket.or(existing.avg_ticket),
            revenue: update.revenue.or(existing.revenue),
            decision_maker: existing.decision_maker,
            signals,
            last_updated: Utc::now(),
        }
    }
}

fn ordered_union(existing: Vec<String>, fresh: Vec<String>) -> Vec<String> {
    let mut union = existing;
    for value in fresh {
        if !union.contains(&value) {
            union.push(value);
        }
    }
    union
}
