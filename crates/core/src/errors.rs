use thiserror::Error;

use crate::handoff::HandoffMode;

/// Request-path error taxonomy. Persistence failures inside the synchronous
/// conversational path are caught and logged where they occur; only the
/// variants below cross a component boundary and reach the HTTP surface.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("no organization could be resolved for the caller")]
    AuthResolution,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("illegal handoff transition {from:?} -> {to:?}")]
    StateConflict { from: HandoffMode, to: HandoffMode },
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl RequestError {
    /// HTTP status this error maps to at the endpoint boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::AuthResolution => 401,
            Self::Validation(_) => 400,
            Self::StateConflict { .. } => 422,
            Self::Persistence(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::handoff::HandoffMode;

    use super::RequestError;

    #[test]
    fn taxonomy_maps_to_contract_status_codes() {
        assert_eq!(RequestError::AuthResolution.status_code(), 401);
        assert_eq!(
            RequestError::Validation("missing conversationId".to_string()).status_code(),
            400
        );
        assert_eq!(
            RequestError::StateConflict { from: HandoffMode::Ai, to: HandoffMode::Ai }
                .status_code(),
            422
        );
        assert_eq!(RequestError::Persistence("store unreachable".to_string()).status_code(), 500);
    }
}
