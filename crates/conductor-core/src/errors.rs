//! Error types for the session conductor
//!
//! Every failure in this crate is scoped to a single negotiation attempt.
//! Nothing here is allowed to take the hosting process down.

use thiserror::Error;

use crate::render::RenderRole;

/// Result type for conductor operations
pub type Result<T> = std::result::Result<T, ConductorError>;

/// Which kind of inbound payload failed to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// A session description (offer/answer)
    Description,
    /// A trickled network candidate
    Candidate,
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Description => write!(f, "session description"),
            Self::Candidate => write!(f, "candidate"),
        }
    }
}

/// Errors returned by the session conductor
#[derive(Debug, Error)]
pub enum ConductorError {
    /// A session is already negotiating or active
    #[error("Already connected: only one peer session is supported at a time")]
    AlreadyConnected,

    /// The transport service could not construct a session handle
    #[error("Transport factory initialization failed: {reason}")]
    FactoryInitFailed { reason: String },

    /// Malformed description or candidate payload
    #[error("Can't parse received {kind}: {reason}")]
    ParseError { kind: PayloadKind, reason: String },

    /// The transport refused a structurally valid candidate
    #[error("Candidate rejected by transport: {reason}")]
    CandidateRejected { reason: String },

    /// A candidate arrived with no live session to apply it to
    #[error("No active session")]
    NoActiveSession,

    /// A render sink could not attach a track
    #[error("Render attach failed for {role} track: {reason}")]
    RenderAttachFailed { role: RenderRole, reason: String },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ConductorError {
    /// Create a factory initialization error
    pub fn factory(reason: impl Into<String>) -> Self {
        Self::FactoryInitFailed {
            reason: reason.into(),
        }
    }

    /// Create a description parse error
    pub fn parse_description(reason: impl Into<String>) -> Self {
        Self::ParseError {
            kind: PayloadKind::Description,
            reason: reason.into(),
        }
    }

    /// Create a candidate parse error
    pub fn parse_candidate(reason: impl Into<String>) -> Self {
        Self::ParseError {
            kind: PayloadKind::Candidate,
            reason: reason.into(),
        }
    }

    /// Create a candidate rejection error
    pub fn candidate_rejected(reason: impl Into<String>) -> Self {
        Self::CandidateRejected {
            reason: reason.into(),
        }
    }

    /// Create a render attach error
    pub fn render_attach(role: RenderRole, reason: impl Into<String>) -> Self {
        Self::RenderAttachFailed {
            role,
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether this error ends the current negotiation attempt.
    ///
    /// Only a factory failure does; it returns the conductor to idle.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::FactoryInitFailed { .. })
    }

    /// Whether the conductor keeps running the current session after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ParseError { .. }
                | Self::CandidateRejected { .. }
                | Self::NoActiveSession
                | Self::RenderAttachFailed { .. }
        )
    }
}

/// Errors reported by the transport service facade
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The engine is not available (factory or handle construction)
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    /// The engine refused the input (candidate for an unknown media line, ...)
    #[error("Transport rejected input: {0}")]
    Rejected(String),

    /// Any other engine failure
    #[error("Transport operation failed: {0}")]
    Failed(String),
}

/// Result type for transport facade operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Errors reported by a render sink
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    /// The sink could not attach to the track
    #[error("attach failed: {0}")]
    AttachFailed(String),

    /// The sink does not support this kind of track
    #[error("unsupported track: {0}")]
    Unsupported(String),
}
