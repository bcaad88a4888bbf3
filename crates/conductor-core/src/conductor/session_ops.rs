//! Inbound operations: initiate, accept_remote, receive_candidate, stop

use std::sync::atomic::Ordering;

use tracing::{debug, error, info, warn};

use crate::errors::{ConductorError, Result};
use crate::render::RenderRole;
use crate::sdp::{IceCandidate, SdpType, SessionDescription};
use crate::session::{Session, SessionState};
use crate::transport::events::ConductorEvent;
use crate::transport::{LocalMediaStream, TransportEventSink, TransportParams};

use super::conductor::{ConductorInner, SessionConductor};
use super::{AUDIO_TRACK_ID, VIDEO_TRACK_ID};

/// Which local description to ask the transport for
#[derive(Debug, Clone, Copy)]
enum LocalDescription {
    Offer,
    Answer,
}

/// A candidate without a media id is located by line index alone, which
/// must name a section of the applied remote description
fn check_section(candidate: IceCandidate, remote_sections: Option<usize>) -> Result<IceCandidate> {
    if !candidate.media_id.is_empty() {
        return Ok(candidate);
    }
    match remote_sections {
        Some(count) if usize::from(candidate.line_index) < count => Ok(candidate),
        Some(count) => Err(ConductorError::parse_candidate(format!(
            "no media id and line index {} is outside the {} remote media sections",
            candidate.line_index, count
        ))),
        None => Err(ConductorError::parse_candidate(
            "no media id and no remote description to resolve the line index against",
        )),
    }
}

impl SessionConductor {
    /// Start a session and request a local offer.
    ///
    /// The offer is relayed once the transport produces it.
    pub async fn initiate(&self) -> Result<()> {
        let result = self.inner.initiate().await;
        self.inner.dispatch_notifications().await;
        result
    }

    /// Apply a description received from the remote peer, creating the
    /// session first if there is none. An offer triggers a local answer.
    pub async fn accept_remote(&self, sdp: &str, sdp_type: &str) -> Result<()> {
        let result = self.inner.accept_remote(sdp, sdp_type).await;
        self.inner.dispatch_notifications().await;
        result
    }

    /// Apply a candidate trickled by the remote peer
    pub async fn receive_candidate(&self, media_id: &str, line_index: u16, payload: &str) -> Result<()> {
        let result = self.inner.receive_candidate(media_id, line_index, payload).await;
        self.inner.dispatch_notifications().await;
        result
    }

    /// Release the session and return to Idle. Idempotent.
    pub async fn stop(&self) {
        self.inner.stop().await;
        self.inner.dispatch_notifications().await;
    }
}

impl ConductorInner {
    pub(crate) async fn initiate(&self) -> Result<()> {
        let mut slot = self.session.lock().await;
        if let Some(current) = slot.as_ref() {
            if current.state.is_busy() {
                warn!(session_id = %current.id, state = %current.state, "Already connected, refusing to initiate");
                return Err(ConductorError::AlreadyConnected);
            }
        }

        let session = self.open_session(&mut slot).await?;
        info!(session_id = %session.id, generation = session.generation, "Initiating session, creating offer");
        self.request_local_description(session, LocalDescription::Offer);
        Ok(())
    }

    pub(crate) async fn accept_remote(&self, sdp: &str, sdp_type: &str) -> Result<()> {
        let description = SessionDescription::parse(sdp, sdp_type).map_err(|e| {
            warn!("{}", e);
            e
        })?;

        let mut slot = self.session.lock().await;
        let live = slot.as_ref().map_or(false, |s| s.state.has_transport());
        if !live {
            self.open_session(&mut slot).await?;
        }
        let Some(session) = slot.as_mut() else {
            return Err(ConductorError::NoActiveSession);
        };
        let Some(transport) = session.transport() else {
            return Err(ConductorError::NoActiveSession);
        };

        let sdp_type = description.sdp_type();
        let media_sections = description.media_sections().len();
        debug!(session_id = %session.id, %sdp_type, media_sections, "Setting remote description");

        if let Err(e) = transport.set_remote_description(description).await {
            if sdp_type == SdpType::Offer {
                self.fail_session(session, &e.to_string()).await;
            } else {
                warn!(session_id = %session.id, %sdp_type, "Failed to set remote description: {}", e);
            }
            return Ok(());
        }
        session.remote_media_sections = Some(media_sections);

        if sdp_type == SdpType::Offer {
            info!(session_id = %session.id, "Remote offer applied, creating answer");
            self.request_local_description(session, LocalDescription::Answer);
        }
        Ok(())
    }

    pub(crate) async fn receive_candidate(&self, media_id: &str, line_index: u16, payload: &str) -> Result<()> {
        let slot = self.session.lock().await;
        let Some(session) = slot.as_ref().filter(|s| s.state.has_transport()) else {
            warn!(media_id, line_index, "Candidate received with no active session, dropped");
            return Err(ConductorError::NoActiveSession);
        };
        let Some(transport) = session.transport() else {
            return Err(ConductorError::NoActiveSession);
        };

        let candidate = IceCandidate::parse(media_id, line_index, payload)
            .and_then(|candidate| check_section(candidate, session.remote_media_sections))
            .map_err(|e| {
                warn!(session_id = %session.id, media_id, line_index, "{}", e);
                e
            })?;

        transport.add_ice_candidate(candidate).await.map_err(|e| {
            warn!(session_id = %session.id, media_id, line_index, "Failed to apply candidate: {}", e);
            ConductorError::candidate_rejected(e.to_string())
        })?;

        debug!(session_id = %session.id, media_id, line_index, "Remote candidate applied");
        Ok(())
    }

    pub(crate) async fn stop(&self) {
        // Invalidate in-flight events before waiting for the lock
        self.next_generation();

        let mut slot = self.session.lock().await;
        let Some(mut session) = slot.take() else {
            debug!("Stop requested with no session");
            self.state_tx.send_replace(SessionState::Idle);
            return;
        };

        info!(session_id = %session.id, state = %session.state, "Stopping session");
        if let Some(transport) = session.release() {
            transport.close().await;
        }
        self.binder.release_all().await;

        self.transition(&mut session, SessionState::Closed);
        self.publish_state(&session.id, SessionState::Closed, SessionState::Idle);
    }

    /// Replace whatever is in `slot` with a fresh session holding a live
    /// transport handle and local media. On factory failure the slot is
    /// left empty (Idle).
    async fn open_session<'a>(&self, slot: &'a mut Option<Session>) -> Result<&'a mut Session> {
        let previous_state = slot.as_ref().map_or(SessionState::Idle, |s| s.state);
        if let Some(mut previous) = slot.take() {
            debug!(session_id = %previous.id, state = %previous.state, "Replacing previous session");
            if let Some(transport) = previous.release() {
                transport.close().await;
            }
            self.binder.release_all().await;
        }

        let generation = self.next_generation();
        let dtls_enabled = self.dtls_enabled.load(Ordering::SeqCst);
        let mut session = Session::new(generation, dtls_enabled, self.config.ice_servers());
        self.publish_state(&session.id, previous_state, SessionState::AwaitingFactory);

        let params = TransportParams {
            session_id: session.id.clone(),
            ice_servers: session.ice_servers.clone(),
            constraints: session.constraints.clone(),
        };
        let events = TransportEventSink::new(generation, self.event_tx.clone());

        let transport = match self.factory.create_session(params, events).await {
            Ok(transport) => transport,
            Err(e) => {
                error!(session_id = %session.id, "Failed to create transport session: {}", e);
                self.publish_state(&session.id, SessionState::AwaitingFactory, SessionState::Idle);
                return Err(ConductorError::factory(e.to_string()));
            }
        };

        session.attach_transport(transport);
        self.publish_state(&session.id, SessionState::AwaitingFactory, SessionState::Negotiating);
        debug!(
            session_id = %session.id,
            generation,
            dtls = dtls_enabled,
            ice_servers = session.ice_servers.len(),
            "Transport session created"
        );

        self.add_streams(&mut session).await;
        Ok(slot.insert(session))
    }

    /// Attach local capture: audio always, video when the context wants it.
    /// Every failure here is logged and the session carries on.
    async fn add_streams(&self, session: &mut Session) {
        let Some(transport) = session.transport() else {
            return;
        };
        let context = self.context.read().clone();
        let label = self.config.stream_label.as_str();
        let mut stream = LocalMediaStream::new(label);

        match transport.create_audio_track(AUDIO_TRACK_ID, label).await {
            Ok(track) => stream.add_track(track),
            Err(e) => warn!(session_id = %session.id, "Failed to create audio track: {}", e),
        }

        if context.video {
            let device_index = self.config.video_capture_device;
            match self.capture.open_video_source(device_index) {
                Some(source) => match transport.create_video_track(VIDEO_TRACK_ID, label, source).await {
                    Ok(track) => {
                        if let Err(e) = self.binder.bind(&track, RenderRole::Local, context.monitor).await {
                            warn!(session_id = %session.id, role = %RenderRole::Local, "{}", e);
                        }
                        stream.add_track(track);
                    }
                    Err(e) => warn!(session_id = %session.id, "Failed to create video track: {}", e),
                },
                None => warn!(session_id = %session.id, device_index, "Can't open video capture device"),
            }
        }

        if let Err(e) = transport.add_stream(&stream).await {
            warn!(session_id = %session.id, "Failed to add local stream: {}", e);
        }
        debug!(session_id = %session.id, tracks = stream.tracks().len(), "Local stream attached");
        session.local_stream = Some(stream);
    }

    /// Ask the transport for a local description off the lock. The result
    /// comes back through the event loop stamped with this generation.
    fn request_local_description(&self, session: &mut Session, kind: LocalDescription) {
        let Some(transport) = session.transport() else {
            return;
        };
        let events = TransportEventSink::new(session.generation, self.event_tx.clone());

        let handle = tokio::spawn(async move {
            let result = match kind {
                LocalDescription::Offer => transport.create_offer().await,
                LocalDescription::Answer => transport.create_answer().await,
            };
            let event = match result {
                Ok(description) => ConductorEvent::LocalDescriptionCreated(description),
                Err(e) => ConductorEvent::NegotiationFailed(e.to_string()),
            };
            events.send(event);
        });
        session.track_pending(handle);
    }
}
