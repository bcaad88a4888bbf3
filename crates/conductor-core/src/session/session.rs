//! Session record
//!
//! Owned by the conductor under its state lock. The transport handle is
//! present iff the state is Negotiating or Active.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::{IceServerConfig, MediaConstraintSet};
use crate::render::RenderRole;
use crate::transport::{Generation, LocalMediaStream, TrackHandle, TransportSession};

use super::{SessionId, SessionState};

pub(crate) struct Session {
    pub id: SessionId,
    pub generation: Generation,
    pub state: SessionState,
    pub dtls_enabled: bool,
    pub ice_servers: Vec<IceServerConfig>,
    pub constraints: MediaConstraintSet,
    transport: Option<Arc<dyn TransportSession>>,
    pub local_stream: Option<LocalMediaStream>,
    /// Stream reported by the transport; only its id is kept
    pub remote_stream_id: Option<String>,
    /// Media section count of the applied remote description
    pub remote_media_sections: Option<usize>,
    /// Outstanding offer/answer completions, aborted on release
    pending: Vec<JoinHandle<()>>,
    pub created_at: Instant,
    pub updated_at: Instant,
}

impl Session {
    pub fn new(generation: Generation, dtls_enabled: bool, ice_servers: Vec<IceServerConfig>) -> Self {
        let now = Instant::now();
        Self {
            id: SessionId::new(),
            generation,
            state: SessionState::AwaitingFactory,
            dtls_enabled,
            constraints: MediaConstraintSet::from_dtls(dtls_enabled),
            ice_servers,
            transport: None,
            local_stream: None,
            remote_stream_id: None,
            remote_media_sections: None,
            pending: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `new_state`, returning the previous state
    pub fn set_state(&mut self, new_state: SessionState) -> SessionState {
        let old_state = self.state;
        self.state = new_state;
        self.updated_at = Instant::now();
        tracing::debug!("Session {} state: {} -> {}", self.id, old_state, new_state);
        old_state
    }

    /// Install the transport handle; the session starts negotiating
    pub fn attach_transport(&mut self, transport: Arc<dyn TransportSession>) {
        self.transport = Some(transport);
        self.set_state(SessionState::Negotiating);
    }

    pub fn transport(&self) -> Option<Arc<dyn TransportSession>> {
        self.transport.clone()
    }

    pub fn track_pending(&mut self, handle: JoinHandle<()>) {
        self.pending.retain(|h| !h.is_finished());
        self.pending.push(handle);
    }

    /// Cancel outstanding completions and hand back the transport for closing.
    /// Local stream ownership ends here as well.
    pub fn release(&mut self) -> Option<Arc<dyn TransportSession>> {
        for handle in self.pending.drain(..) {
            handle.abort();
        }
        self.local_stream = None;
        self.remote_stream_id = None;
        self.transport.take()
    }

    pub fn info(&self, bound_roles: Vec<RenderRole>) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            state: self.state,
            generation: self.generation,
            dtls_enabled: self.dtls_enabled,
            has_transport: self.transport.is_some(),
            local_tracks: self
                .local_stream
                .as_ref()
                .map(|s| s.tracks().to_vec())
                .unwrap_or_default(),
            remote_stream_id: self.remote_stream_id.clone(),
            bound_roles,
            age: self.created_at.elapsed(),
        }
    }
}

/// Point-in-time view of the current session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub state: SessionState,
    pub generation: Generation,
    pub dtls_enabled: bool,
    pub has_transport: bool,
    pub local_tracks: Vec<TrackHandle>,
    pub remote_stream_id: Option<String>,
    pub bound_roles: Vec<RenderRole>,
    pub age: Duration,
}
