//! Test doubles: a scripted transport engine, a channel-backed signaling
//! relay, recording render sinks and a recording call handler.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Semaphore};

use rtc_conductor_core::prelude::*;
use rtc_conductor_core::{HostLifecycle, RenderError};

pub const OFFER_SDP: &str = "v=0\r\n\
o=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:0\r\n\
a=rtpmap:111 opus/48000/2\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:1\r\n\
a=rtpmap:96 VP8/90000\r\n";

pub const ANSWER_SDP: &str = "v=0\r\n\
o=- 7270473432417513380 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:0\r\n\
a=rtpmap:111 opus/48000/2\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:1\r\n\
a=rtpmap:96 VP8/90000\r\n";

pub const HOST_CANDIDATE: &str = "candidate:842163049 1 udp 1677729535 192.0.2.10 46154 typ host generation 0";

pub const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(150);

/// Ordered record of what the transport and the relay were asked to do
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn position(journal: &[String], entry: &str) -> Option<usize> {
    journal.iter().position(|e| e == entry)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("rtc_conductor_core=debug")
        .with_test_writer()
        .try_init();
}

pub fn candidate(media_id: &str, line_index: u16, port: u16) -> IceCandidate {
    let payload = format!("candidate:1 1 udp 2122260223 192.0.2.{} {} typ host", line_index + 1, port);
    IceCandidate::parse(media_id, line_index, &payload).unwrap()
}

/// One outbound signaling message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Description {
        payload: String,
        sdp_type: String,
        success: bool,
    },
    Candidate {
        media_id: String,
        line_index: u16,
        payload: String,
    },
}

impl Outbound {
    pub fn description(payload: &str, sdp_type: &str, success: bool) -> Self {
        Self::Description {
            payload: payload.to_string(),
            sdp_type: sdp_type.to_string(),
            success,
        }
    }

    pub fn failure() -> Self {
        Self::description("", "", false)
    }
}

pub struct MockRelay {
    tx: mpsc::UnboundedSender<Outbound>,
    journal: Journal,
}

impl MockRelay {
    pub fn new(journal: Journal) -> (Arc<Self>, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx, journal }), rx)
    }
}

#[async_trait]
impl SignalingRelay for MockRelay {
    async fn send_session_description(&self, payload: &str, sdp_type: &str, success: bool) {
        self.journal
            .lock()
            .push(format!("relay:description:{}:{}", sdp_type, success));
        let _ = self.tx.send(Outbound::description(payload, sdp_type, success));
    }

    async fn send_network_candidate(&self, media_id: &str, line_index: u16, payload: &str) {
        self.journal
            .lock()
            .push(format!("relay:candidate:{}:{}", media_id, line_index));
        let _ = self.tx.send(Outbound::Candidate {
            media_id: media_id.to_string(),
            line_index,
            payload: payload.to_string(),
        });
    }
}

/// Scripted failures for the mock engine
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    pub fail_factory: bool,
    pub fail_offer: bool,
    pub fail_answer: bool,
    pub fail_remote: bool,
    pub fail_local: bool,
    pub reject_candidates: bool,
    pub fail_video_track: bool,
    /// create_offer/create_answer wait for `release_negotiation`
    pub hold_negotiation: bool,
}

pub struct MockTransport {
    journal: Journal,
    behavior: MockBehavior,
    gate: Arc<Semaphore>,
    pub params: TransportParams,
    pub candidates: Mutex<Vec<IceCandidate>>,
    pub local: Mutex<Option<SessionDescription>>,
    pub remote: Mutex<Option<SessionDescription>>,
    pub streams: Mutex<Vec<LocalMediaStream>>,
    pub negotiations: AtomicUsize,
    pub closed: AtomicBool,
}

impl MockTransport {
    fn record(&self, entry: impl Into<String>) {
        self.journal.lock().push(entry.into());
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn negotiate(&self, sdp_type: SdpType, sdp: &str, fail: bool) -> TransportResult<SessionDescription> {
        self.negotiations.fetch_add(1, Ordering::SeqCst);
        self.record(format!("create_{}", sdp_type));
        if self.behavior.hold_negotiation {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }
        if fail {
            return Err(TransportError::Failed(format!("{} creation failed", sdp_type)));
        }
        SessionDescription::from_parts(sdp_type, sdp.to_string()).map_err(|e| TransportError::Failed(e.to_string()))
    }
}

#[async_trait]
impl TransportSession for MockTransport {
    async fn create_offer(&self) -> TransportResult<SessionDescription> {
        self.negotiate(SdpType::Offer, OFFER_SDP, self.behavior.fail_offer).await
    }

    async fn create_answer(&self) -> TransportResult<SessionDescription> {
        self.negotiate(SdpType::Answer, ANSWER_SDP, self.behavior.fail_answer).await
    }

    async fn set_local_description(&self, description: SessionDescription) -> TransportResult<()> {
        self.record(format!("set_local:{}", description.sdp_type()));
        if self.behavior.fail_local {
            return Err(TransportError::Failed("local description refused".to_string()));
        }
        *self.local.lock() = Some(description);
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> TransportResult<()> {
        self.record(format!("set_remote:{}", description.sdp_type()));
        if self.behavior.fail_remote {
            return Err(TransportError::Failed("remote description refused".to_string()));
        }
        *self.remote.lock() = Some(description);
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> TransportResult<()> {
        if self.behavior.reject_candidates {
            return Err(TransportError::Rejected(format!("unknown media line {}", candidate.line_index)));
        }
        self.record(format!("add_candidate:{}:{}", candidate.media_id, candidate.line_index));
        self.candidates.lock().push(candidate);
        Ok(())
    }

    async fn create_audio_track(&self, track_id: &str, stream_label: &str) -> TransportResult<TrackHandle> {
        self.record(format!("track:{}", track_id));
        Ok(TrackHandle::audio(track_id, stream_label))
    }

    async fn create_video_track(
        &self,
        track_id: &str,
        stream_label: &str,
        source: VideoSource,
    ) -> TransportResult<TrackHandle> {
        if self.behavior.fail_video_track {
            return Err(TransportError::Unavailable(format!("{} busy", source.device_name)));
        }
        self.record(format!("track:{}", track_id));
        Ok(TrackHandle::video(track_id, stream_label))
    }

    async fn add_stream(&self, stream: &LocalMediaStream) -> TransportResult<()> {
        self.record(format!("add_stream:{}:{}", stream.label, stream.tracks().len()));
        self.streams.lock().push(stream.clone());
        Ok(())
    }

    async fn close(&self) {
        self.record("close");
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out `MockTransport`s and keeps each one's event sink for the test
pub struct MockTransportFactory {
    journal: Journal,
    behavior: Mutex<MockBehavior>,
    gate: Arc<Semaphore>,
    sessions: Mutex<Vec<(Arc<MockTransport>, TransportEventSink)>>,
    attempts: AtomicUsize,
}

impl MockTransportFactory {
    pub fn new(journal: Journal, behavior: MockBehavior) -> Arc<Self> {
        Arc::new(Self {
            journal,
            behavior: Mutex::new(behavior),
            gate: Arc::new(Semaphore::new(0)),
            sessions: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Let `n` held offer/answer creations complete
    pub fn release_negotiation(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Sessions created and not yet closed
    pub fn live(&self) -> usize {
        self.sessions.lock().iter().filter(|(t, _)| !t.is_closed()).count()
    }

    pub fn session(&self, index: usize) -> Arc<MockTransport> {
        self.sessions.lock()[index].0.clone()
    }

    pub fn last_session(&self) -> Arc<MockTransport> {
        self.sessions.lock().last().expect("no transport session created").0.clone()
    }

    pub fn last_sink(&self) -> TransportEventSink {
        self.sessions.lock().last().expect("no transport session created").1.clone()
    }
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn create_session(
        &self,
        params: TransportParams,
        events: TransportEventSink,
    ) -> TransportResult<Arc<dyn TransportSession>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().clone();
        if behavior.fail_factory {
            return Err(TransportError::Unavailable("peer connection factory not initialized".to_string()));
        }

        self.journal.lock().push("create_session".to_string());
        let transport = Arc::new(MockTransport {
            journal: self.journal.clone(),
            behavior,
            gate: self.gate.clone(),
            params,
            candidates: Mutex::new(Vec::new()),
            local: Mutex::new(None),
            remote: Mutex::new(None),
            streams: Mutex::new(Vec::new()),
            negotiations: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        });
        self.sessions.lock().push((transport.clone(), events));
        Ok(transport)
    }
}

/// Render sink that logs attach/detach calls
#[derive(Default)]
pub struct RecordingSink {
    pub fail: bool,
    pub log: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

#[async_trait]
impl RenderSink for RecordingSink {
    async fn attach(&self, track: &TrackHandle, role: RenderRole) -> std::result::Result<(), RenderError> {
        if self.fail {
            return Err(RenderError::AttachFailed("window handle gone".to_string()));
        }
        self.log.lock().push(format!("attach:{}:{}", role, track.id));
        Ok(())
    }

    async fn detach(&self, track: &TrackHandle, role: RenderRole) {
        self.log.lock().push(format!("detach:{}:{}", role, track.id));
    }
}

#[derive(Default)]
pub struct RecordingHandler {
    pub active: Mutex<Vec<SessionId>>,
    pub transitions: Mutex<Vec<(SessionState, SessionState)>>,
}

impl RecordingHandler {
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    pub fn transitions(&self) -> Vec<(SessionState, SessionState)> {
        self.transitions.lock().clone()
    }
}

#[async_trait]
impl CallHandler for RecordingHandler {
    async fn on_session_active(&self, session_id: &SessionId) {
        self.active.lock().push(session_id.clone());
    }

    async fn on_state_changed(&self, _session_id: &SessionId, old: SessionState, new: SessionState) {
        self.transitions.lock().push((old, new));
    }
}

/// Call handler that calls back into its conductor from inside callbacks:
/// `stop()` when the session reaches `stop_on`, `session_info()` when it
/// goes active.
pub struct ReentrantHandler {
    conductor: Mutex<Weak<SessionConductor>>,
    stop_on: Option<SessionState>,
    pub stops: AtomicUsize,
    pub snapshots: Mutex<Vec<Option<SessionInfo>>>,
    pub transitions: Mutex<Vec<(SessionState, SessionState)>>,
}

impl ReentrantHandler {
    pub fn new(conductor: &Arc<SessionConductor>, stop_on: Option<SessionState>) -> Arc<Self> {
        Arc::new(Self {
            conductor: Mutex::new(Arc::downgrade(conductor)),
            stop_on,
            stops: AtomicUsize::new(0),
            snapshots: Mutex::new(Vec::new()),
            transitions: Mutex::new(Vec::new()),
        })
    }

    fn conductor(&self) -> Option<Arc<SessionConductor>> {
        self.conductor.lock().upgrade()
    }

    pub fn transitions(&self) -> Vec<(SessionState, SessionState)> {
        self.transitions.lock().clone()
    }

    /// Poll until `done` holds; panics after the harness wait
    pub async fn wait_until(&self, done: impl Fn(&Self) -> bool) {
        tokio::time::timeout(WAIT, async {
            while !done(self) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("timed out waiting for the call handler");
    }
}

#[async_trait]
impl CallHandler for ReentrantHandler {
    async fn on_session_active(&self, _session_id: &SessionId) {
        if let Some(conductor) = self.conductor() {
            let info = conductor.session_info().await;
            self.snapshots.lock().push(info);
        }
    }

    async fn on_state_changed(&self, _session_id: &SessionId, old: SessionState, new: SessionState) {
        self.transitions.lock().push((old, new));
        if Some(new) != self.stop_on {
            return;
        }
        if let Some(conductor) = self.conductor() {
            conductor.stop().await;
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[derive(Default)]
pub struct CountingLifecycle {
    pub setups: AtomicUsize,
    pub teardowns: AtomicUsize,
}

impl HostLifecycle for CountingLifecycle {
    fn setup(&self) -> rtc_conductor_core::Result<()> {
        self.setups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn teardown(&self) {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// A conductor wired to the mocks above
pub struct Harness {
    pub conductor: Arc<SessionConductor>,
    pub factory: Arc<MockTransportFactory>,
    pub journal: Journal,
    outbound: mpsc::UnboundedReceiver<Outbound>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(test_config(), MockBehavior::default())
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self::with(test_config(), behavior)
    }

    pub fn with(config: ConductorConfig, behavior: MockBehavior) -> Self {
        init_tracing();
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let factory = MockTransportFactory::new(journal.clone(), behavior);
        let (relay, outbound) = MockRelay::new(journal.clone());

        let conductor = SessionConductor::builder(config)
            .transport(factory.clone())
            .capture(Arc::new(StaticDeviceList::new(["Test Camera"])))
            .relay(relay)
            .build()
            .expect("conductor should build");

        Self {
            conductor: Arc::new(conductor),
            factory,
            journal,
            outbound,
        }
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().clone()
    }

    /// Next outbound signaling message; panics if none arrives in time
    pub async fn next_outbound(&mut self) -> Outbound {
        tokio::time::timeout(WAIT, self.outbound.recv())
            .await
            .expect("timed out waiting for outbound signaling")
            .expect("relay channel closed")
    }

    /// Assert nothing more is relayed for a short while
    pub async fn assert_quiet(&mut self) {
        if let Ok(Some(message)) = tokio::time::timeout(QUIET, self.outbound.recv()).await {
            panic!("unexpected outbound signaling: {:?}", message);
        }
    }

    /// Wait until every event emitted so far on the live session has been
    /// handled, using a marker candidate that is relayed in order.
    pub async fn settle(&mut self) {
        let sink = self.factory.last_sink();
        sink.emit(TransportEvent::CandidateDiscovered(candidate("marker", 9, 9)));
        loop {
            if let Outbound::Candidate { media_id, .. } = self.next_outbound().await {
                if media_id == "marker" {
                    return;
                }
            }
        }
    }

    pub async fn wait_for_state(&self, state: SessionState) {
        let mut rx = self.conductor.subscribe_state();
        tokio::time::timeout(WAIT, rx.wait_for(|s| *s == state))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for state {}", state))
            .expect("state channel closed");
    }
}

pub fn test_config() -> ConductorConfig {
    ConductorConfig::new()
        .with_stun_server("stun.example.org", 3478)
        .with_video_capture_device(0)
}
