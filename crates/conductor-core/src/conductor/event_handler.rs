//! Event loop: transport events and offer/answer completions

use std::sync::Weak;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::render::RenderRole;
use crate::sdp::{IceCandidate, SessionDescription};
use crate::session::{Session, SessionState};
use crate::transport::events::{ConductorEvent, StampedEvent};
use crate::transport::{RemoteStream, TransportEvent};

use super::conductor::ConductorInner;

impl ConductorInner {
    /// Main event loop. Holds only a weak reference so dropping the
    /// conductor is never blocked by it.
    pub(crate) async fn run_event_loop(this: Weak<Self>, mut event_rx: mpsc::UnboundedReceiver<StampedEvent>) {
        info!("Starting conductor event loop");

        while let Some(stamped) = event_rx.recv().await {
            let Some(inner) = this.upgrade() else {
                break;
            };
            inner.handle_event(stamped).await;
            inner.dispatch_notifications().await;
        }

        info!("Conductor event loop ended");
    }

    async fn handle_event(&self, stamped: StampedEvent) {
        let StampedEvent { generation, event } = stamped;

        let mut slot = self.session.lock().await;
        let session = match slot.as_mut() {
            Some(session)
                if session.generation == generation
                    && self.is_current(generation)
                    && session.state.has_transport() =>
            {
                session
            }
            _ => {
                debug!(generation, ?event, "Discarding event from a stale session");
                return;
            }
        };

        match event {
            ConductorEvent::LocalDescriptionCreated(description) => {
                self.on_local_description(session, description).await;
            }
            ConductorEvent::NegotiationFailed(reason) => {
                self.fail_session(session, &reason).await;
            }
            ConductorEvent::Transport(TransportEvent::CandidateDiscovered(candidate)) => {
                self.on_local_candidate(session, candidate).await;
            }
            ConductorEvent::Transport(TransportEvent::GatheringComplete) => {
                debug!(session_id = %session.id, "Local candidate gathering complete");
            }
            ConductorEvent::Transport(TransportEvent::StreamAdded(stream)) => {
                self.on_stream_added(session, stream).await;
            }
            ConductorEvent::Transport(TransportEvent::StreamRemoved { stream_id }) => {
                self.on_stream_removed(session, &stream_id).await;
            }
        }
    }

    /// Set the description locally, then relay it unmodified
    async fn on_local_description(&self, session: &mut Session, description: SessionDescription) {
        let Some(transport) = session.transport() else {
            return;
        };
        let sdp_type = description.sdp_type();
        let payload = description.to_sdp_string().to_string();

        if let Err(e) = transport.set_local_description(description).await {
            warn!(session_id = %session.id, %sdp_type, "Failed to set local description: {}", e);
        }

        self.relay
            .send_session_description(&payload, sdp_type.as_str(), true)
            .await;
        info!(session_id = %session.id, %sdp_type, "Local description relayed");
    }

    async fn on_local_candidate(&self, session: &Session, candidate: IceCandidate) {
        let payload = candidate.to_sdp_string();
        debug!(
            session_id = %session.id,
            media_id = %candidate.media_id,
            line_index = candidate.line_index,
            "Relaying local candidate"
        );
        self.relay
            .send_network_candidate(&candidate.media_id, candidate.line_index, &payload)
            .await;
    }

    /// Relay the failure, then release the session's transport and bindings.
    /// Bumping the generation first makes this run at most once per session.
    pub(super) async fn fail_session(&self, session: &mut Session, reason: &str) {
        self.next_generation();
        warn!(session_id = %session.id, "Negotiation failed: {}", reason);

        self.relay.send_session_description("", "", false).await;

        if let Some(transport) = session.release() {
            transport.close().await;
        }
        self.binder.release_all().await;
        self.transition(session, SessionState::Failed);
    }

    /// Render the first video track (unless monitoring) and go Active.
    /// Engines that announce a stream one track at a time raise this once per
    /// track; the stream's first video track keeps the Remote renderer.
    async fn on_stream_added(&self, session: &mut Session, stream: RemoteStream) {
        let monitor = self.context.read().monitor;
        info!(
            session_id = %session.id,
            stream_id = %stream.id,
            audio_tracks = stream.audio_tracks.len(),
            video_tracks = stream.video_tracks.len(),
            "Remote stream added"
        );

        let already_rendering = self
            .binder
            .binding(RenderRole::Remote)
            .map_or(false, |b| b.track.stream_id == stream.id);

        match stream.first_video_track() {
            Some(_) if already_rendering => {
                debug!(session_id = %session.id, stream_id = %stream.id, "Remote stream already rendered, keeping its first video track");
            }
            Some(track) => {
                if stream.video_tracks.len() > 1 {
                    debug!(session_id = %session.id, "Rendering only the first of {} video tracks", stream.video_tracks.len());
                }
                if let Err(e) = self.binder.bind(track, RenderRole::Remote, monitor).await {
                    warn!(session_id = %session.id, role = %RenderRole::Remote, "{}", e);
                }
            }
            None => debug!(session_id = %session.id, stream_id = %stream.id, "Remote stream has no video track"),
        }

        session.remote_stream_id = Some(stream.id);
        if self.transition(session, SessionState::Active) {
            self.notify_active(&session.id);
        }
    }

    async fn on_stream_removed(&self, session: &mut Session, stream_id: &str) {
        let released = self.binder.release_stream(stream_id).await;
        if session.remote_stream_id.as_deref() == Some(stream_id) {
            session.remote_stream_id = None;
        }
        info!(session_id = %session.id, stream_id, released, "Remote stream removed");
    }
}
