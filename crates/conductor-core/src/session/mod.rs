//! Session identity and lifecycle state

mod session;

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use session::SessionInfo;
pub(crate) use session::Session;

/// Unique identifier of one negotiation attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(format!("sess_{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of the (at most one) session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// No session
    Idle,
    /// Waiting for the transport factory to build a session handle
    AwaitingFactory,
    /// Offer/answer and candidate exchange in progress
    Negotiating,
    /// Remote stream arrived
    Active,
    /// Negotiation failed; transport released
    Failed,
    /// Stopped; transport released
    Closed,
}

impl SessionState {
    /// Whether a session in this state blocks a new one from starting
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::AwaitingFactory | Self::Negotiating | Self::Active)
    }

    /// Whether a session in this state owns a live transport handle
    pub fn has_transport(&self) -> bool {
        matches!(self, Self::Negotiating | Self::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AwaitingFactory => "awaiting-factory",
            Self::Negotiating => "negotiating",
            Self::Active => "active",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(SessionState::Negotiating.is_busy());
        assert!(SessionState::AwaitingFactory.is_busy());
        assert!(!SessionState::AwaitingFactory.has_transport());
        assert!(SessionState::Active.has_transport());
        for state in [SessionState::Idle, SessionState::Failed, SessionState::Closed] {
            assert!(!state.is_busy());
            assert!(!state.has_transport());
        }
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("sess_"));
    }
}
