//! One webrtc-rs peer connection behind the conductor's transport session

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, warn};
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use rtc_conductor_core::prelude::*;

use crate::convert::{candidate_from_init, from_rtc_description, to_candidate_init, to_rtc_description};

fn engine_failure(context: &'static str) -> impl FnOnce(webrtc::Error) -> TransportError {
    move |e| TransportError::Failed(format!("{}: {}", context, e))
}

/// A peer connection plus the engine tracks created for it
pub struct WebRtcTransportSession {
    session_id: SessionId,
    peer_connection: Arc<RTCPeerConnection>,
    local_tracks: DashMap<String, Arc<TrackLocalStaticSample>>,
    remote_tracks: Arc<DashMap<String, Arc<TrackRemote>>>,
}

impl WebRtcTransportSession {
    pub(crate) fn new(
        session_id: SessionId,
        peer_connection: Arc<RTCPeerConnection>,
        events: TransportEventSink,
    ) -> Arc<Self> {
        let session = Arc::new(Self {
            session_id,
            peer_connection,
            local_tracks: DashMap::new(),
            remote_tracks: Arc::new(DashMap::new()),
        });
        session.install_handlers(events);
        session
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn peer_connection(&self) -> Arc<RTCPeerConnection> {
        Arc::clone(&self.peer_connection)
    }

    pub fn connection_state(&self) -> RTCPeerConnectionState {
        self.peer_connection.connection_state()
    }

    /// Engine track behind a local `TrackHandle`, for capture pumps to write samples into
    pub fn local_track(&self, track_id: &str) -> Option<Arc<TrackLocalStaticSample>> {
        self.local_tracks.get(track_id).map(|t| Arc::clone(t.value()))
    }

    /// Engine track behind a remote `TrackHandle`, for renderers to read from
    pub fn remote_track(&self, track_id: &str) -> Option<Arc<TrackRemote>> {
        self.remote_tracks.get(track_id).map(|t| Arc::clone(t.value()))
    }

    fn install_handlers(&self, events: TransportEventSink) {
        let candidate_events = events.clone();
        let session_id = self.session_id.clone();
        self.peer_connection
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                let events = candidate_events.clone();
                let session_id = session_id.clone();
                Box::pin(async move {
                    let Some(candidate) = candidate else {
                        debug!(%session_id, "ICE gathering complete");
                        events.emit(TransportEvent::GatheringComplete);
                        return;
                    };
                    let parsed = candidate
                        .to_json()
                        .map_err(|e| e.to_string())
                        .and_then(|init| candidate_from_init(&init).map_err(|e| e.to_string()));
                    match parsed {
                        Ok(candidate) => {
                            events.emit(TransportEvent::CandidateDiscovered(candidate));
                        }
                        Err(e) => warn!(%session_id, "Dropping local candidate: {}", e),
                    }
                })
            }));

        let track_events = events.clone();
        let remote_tracks = Arc::clone(&self.remote_tracks);
        let session_id = self.session_id.clone();
        self.peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>, _receiver: Arc<RTCRtpReceiver>, _transceiver: Arc<RTCRtpTransceiver>| {
                let events = track_events.clone();
                let remote_tracks = Arc::clone(&remote_tracks);
                let session_id = session_id.clone();
                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => TrackKind::Audio,
                        RTPCodecType::Video => TrackKind::Video,
                        _ => return,
                    };
                    let stream_id = track.stream_id();
                    let handle = TrackHandle::new(track.id(), stream_id.clone(), kind);
                    info!(%session_id, stream_id = %stream_id, track_id = %handle.id, ?kind, "Remote track arrived");

                    remote_tracks.insert(handle.id.clone(), track);
                    events.emit(TransportEvent::StreamAdded(RemoteStream::new(stream_id).with_track(handle)));
                })
            },
        ));

        let remote_tracks = Arc::clone(&self.remote_tracks);
        let session_id = self.session_id.clone();
        self.peer_connection
            .on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
                let events = events.clone();
                let remote_tracks = Arc::clone(&remote_tracks);
                let session_id = session_id.clone();
                Box::pin(async move {
                    debug!(%session_id, "Peer connection state: {}", state);
                    if !matches!(state, RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed) {
                        return;
                    }
                    // webrtc-rs has no remove-track callback; a dead connection takes its streams with it
                    let stream_ids: BTreeSet<String> = remote_tracks.iter().map(|t| t.value().stream_id()).collect();
                    remote_tracks.clear();
                    for stream_id in stream_ids {
                        events.emit(TransportEvent::StreamRemoved { stream_id });
                    }
                })
            }));
    }

    fn local_sample_track(&self, track_id: &str, stream_label: &str, kind: TrackKind) -> TrackHandle {
        let capability = match kind {
            TrackKind::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            TrackKind::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            },
        };
        let track = Arc::new(TrackLocalStaticSample::new(
            capability,
            track_id.to_owned(),
            stream_label.to_owned(),
        ));
        self.local_tracks.insert(track_id.to_owned(), track);
        TrackHandle::new(track_id, stream_label, kind)
    }
}

#[async_trait]
impl TransportSession for WebRtcTransportSession {
    async fn create_offer(&self) -> TransportResult<SessionDescription> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(engine_failure("create offer"))?;
        from_rtc_description(offer)
    }

    async fn create_answer(&self) -> TransportResult<SessionDescription> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(engine_failure("create answer"))?;
        from_rtc_description(answer)
    }

    async fn set_local_description(&self, description: SessionDescription) -> TransportResult<()> {
        let description = to_rtc_description(description)?;
        self.peer_connection
            .set_local_description(description)
            .await
            .map_err(engine_failure("set local description"))
    }

    async fn set_remote_description(&self, description: SessionDescription) -> TransportResult<()> {
        let description = to_rtc_description(description)?;
        self.peer_connection
            .set_remote_description(description)
            .await
            .map_err(engine_failure("set remote description"))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> TransportResult<()> {
        self.peer_connection
            .add_ice_candidate(to_candidate_init(&candidate))
            .await
            .map_err(|e| TransportError::Rejected(e.to_string()))
    }

    async fn create_audio_track(&self, track_id: &str, stream_label: &str) -> TransportResult<TrackHandle> {
        Ok(self.local_sample_track(track_id, stream_label, TrackKind::Audio))
    }

    async fn create_video_track(
        &self,
        track_id: &str,
        stream_label: &str,
        source: VideoSource,
    ) -> TransportResult<TrackHandle> {
        debug!(
            session_id = %self.session_id,
            device_index = source.device_index,
            device = %source.device_name,
            "Creating video track"
        );
        Ok(self.local_sample_track(track_id, stream_label, TrackKind::Video))
    }

    async fn add_stream(&self, stream: &LocalMediaStream) -> TransportResult<()> {
        for handle in stream.tracks() {
            let track = self
                .local_track(&handle.id)
                .ok_or_else(|| TransportError::Rejected(format!("unknown local track '{}'", handle.id)))?;

            let sender = self
                .peer_connection
                .add_track(track as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .map_err(engine_failure("add track"))?;

            // RTCP has to be drained for the interceptors to work
            tokio::spawn(async move {
                let mut buf = vec![0u8; 1500];
                while sender.read(&mut buf).await.is_ok() {}
            });
        }
        debug!(session_id = %self.session_id, label = %stream.label, tracks = stream.tracks().len(), "Local stream added");
        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self.peer_connection.close().await {
            warn!(session_id = %self.session_id, "Failed to close peer connection: {}", e);
        }
        self.local_tracks.clear();
        self.remote_tracks.clear();
        debug!(session_id = %self.session_id, "Peer connection closed");
    }
}
