//! Tri-state handoff machine for a conversation: who is authorized to
//! respond — the automated agent, a supervised hybrid, or a human rep.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandoffMode {
    /// Automation handles all messages. The fail-open default.
    #[default]
    Ai,
    /// Automation still responds but a rep is watching and can intervene.
    Hybrid,
    /// Automation is paused; a rep handles all messages manually.
    Human,
}

pub const ALL_MODES: [HandoffMode; 3] = [HandoffMode::Ai, HandoffMode::Hybrid, HandoffMode::Human];

/// Legal transitions. Every mode may move to either of the other two;
/// self-transitions are rejected before any write happens.
const ALLOWED_TRANSITIONS: &[(HandoffMode, &[HandoffMode])] = &[
    (HandoffMode::Ai, &[HandoffMode::Hybrid, HandoffMode::Human]),
    (HandoffMode::Hybrid, &[HandoffMode::Ai, HandoffMode::Human]),
    (HandoffMode::Human, &[HandoffMode::Ai, HandoffMode::Hybrid]),
];

pub fn is_valid_transition(from: HandoffMode, to: HandoffMode) -> bool {
    ALLOWED_TRANSITIONS
        .iter()
        .find(|(mode, _)| *mode == from)
        .is_some_and(|(_, targets)| targets.contains(&to))
}

impl HandoffMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ai => "AI",
            Self::Hybrid => "HYBRID",
            Self::Human => "HUMAN",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("unsupported handoff mode `{0}` (expected AI|HYBRID|HUMAN)")]
    UnknownMode(String),
    #[error("illegal handoff transition {from:?} -> {to:?}")]
    IllegalTransition { from: HandoffMode, to: HandoffMode },
}

impl std::str::FromStr for HandoffMode {
    type Err = TransitionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "AI" => Ok(Self::Ai),
            "HYBRID" => Ok(Self::Hybrid),
            "HUMAN" => Ok(Self::Human),
            other => Err(TransitionError::UnknownMode(other.to_string())),
        }
    }
}

/// Outcome of a committed mode change, echoed back to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffTransition {
    pub previous_mode: HandoffMode,
    pub new_mode: HandoffMode,
    pub changed: bool,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::{is_valid_transition, HandoffMode, TransitionError, ALL_MODES};

    #[test]
    fn every_distinct_pair_is_legal_and_self_transitions_are_not() {
        for from in ALL_MODES {
            for to in ALL_MODES {
                if from == to {
                    assert!(!is_valid_transition(from, to), "{from:?} -> {to:?} must be illegal");
                } else {
                    assert!(is_valid_transition(from, to), "{from:?} -> {to:?} must be legal");
                }
            }
        }
    }

    #[test]
    fn mode_parses_from_wire_strings() {
        assert_eq!("AI".parse::<HandoffMode>(), Ok(HandoffMode::Ai));
        assert_eq!("hybrid".parse::<HandoffMode>(), Ok(HandoffMode::Hybrid));
        assert_eq!(" HUMAN ".parse::<HandoffMode>(), Ok(HandoffMode::Human));
        assert_eq!(
            "robot".parse::<HandoffMode>(),
            Err(TransitionError::UnknownMode("ROBOT".to_string()))
        );
    }

    #[test]
    fn mode_serializes_to_screaming_case() {
        assert_eq!(serde_json::to_string(&HandoffMode::Hybrid).unwrap(), "\"HYBRID\"");
        assert_eq!(HandoffMode::Ai.as_str(), "AI");
    }

    #[test]
    fn default_mode_is_ai() {
        assert_eq!(HandoffMode::default(), HandoffMode::Ai);
    }
}
