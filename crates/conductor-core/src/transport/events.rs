//! Asynchronous notifications from the transport engine
//!
//! Every event is stamped with the generation of the session that produced
//! it. The conductor drops events whose generation is no longer live.

use tokio::sync::mpsc;

use crate::sdp::{IceCandidate, SessionDescription};

use super::types::RemoteStream;

/// Monotonic session generation
pub type Generation = u64;

/// Events the transport engine emits for a live session
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A local candidate was discovered; relayed immediately
    CandidateDiscovered(IceCandidate),
    /// Local candidate gathering finished
    GatheringComplete,
    /// The remote peer's stream arrived
    StreamAdded(RemoteStream),
    /// The remote peer's stream went away
    StreamRemoved { stream_id: String },
}

/// Everything the conductor's event loop consumes
#[derive(Debug)]
pub(crate) enum ConductorEvent {
    Transport(TransportEvent),
    /// `create_offer`/`create_answer` completed
    LocalDescriptionCreated(SessionDescription),
    /// `create_offer`/`create_answer` (or applying the remote offer) failed
    NegotiationFailed(String),
}

/// An event tagged with the generation it belongs to
#[derive(Debug)]
pub(crate) struct StampedEvent {
    pub generation: Generation,
    pub event: ConductorEvent,
}

/// Handle the engine uses to deliver events for one session
#[derive(Debug, Clone)]
pub struct TransportEventSink {
    generation: Generation,
    tx: mpsc::UnboundedSender<StampedEvent>,
}

impl TransportEventSink {
    pub(crate) fn new(generation: Generation, tx: mpsc::UnboundedSender<StampedEvent>) -> Self {
        Self { generation, tx }
    }

    /// Generation of the session this sink was created for
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Deliver an event. Returns false once the conductor is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.send(ConductorEvent::Transport(event))
    }

    pub(crate) fn send(&self, event: ConductorEvent) -> bool {
        self.tx
            .send(StampedEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    /// Whether the conductor has shut down
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
