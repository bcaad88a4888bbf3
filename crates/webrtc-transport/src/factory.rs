use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;

use rtc_conductor_core::prelude::*;

use crate::convert::rtc_ice_servers;
use crate::session::WebRtcTransportSession;

fn unavailable(context: &'static str) -> impl FnOnce(webrtc::Error) -> TransportError {
    move |e| TransportError::Unavailable(format!("{}: {}", context, e))
}

/// Builds one webrtc-rs peer connection per negotiation attempt
///
/// Each connection gets its own media engine with the default codecs and
/// the default interceptor chain (NACK, RTCP reports, TWCC).
#[derive(Default)]
pub struct WebRtcTransportFactory {
    sessions: DashMap<SessionId, Weak<WebRtcTransportSession>>,
    latest: Mutex<Weak<WebRtcTransportSession>>,
}

impl WebRtcTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine session for `session_id`, while the conductor still holds it
    pub fn session(&self, session_id: &SessionId) -> Option<Arc<WebRtcTransportSession>> {
        self.sessions.get(session_id).and_then(|s| s.upgrade())
    }

    /// Most recently created engine session that is still alive
    pub fn current_session(&self) -> Option<Arc<WebRtcTransportSession>> {
        self.latest.lock().upgrade()
    }

    fn register(&self, session: &Arc<WebRtcTransportSession>) {
        self.sessions.retain(|_, s| s.strong_count() > 0);
        self.sessions
            .insert(session.session_id().clone(), Arc::downgrade(session));
        *self.latest.lock() = Arc::downgrade(session);
    }
}

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn create_session(
        &self,
        params: TransportParams,
        events: TransportEventSink,
    ) -> TransportResult<Arc<dyn TransportSession>> {
        if params.constraints.dtls_enabled() == Some(false) {
            warn!(
                session_id = %params.session_id,
                "webrtc-rs always negotiates DTLS-SRTP; ignoring DtlsSrtpKeyAgreement=false"
            );
        }

        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(unavailable("register codecs"))?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(unavailable("register interceptors"))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: rtc_ice_servers(&params.ice_servers),
            ..Default::default()
        };
        let peer_connection = api
            .new_peer_connection(config)
            .await
            .map_err(unavailable("create peer connection"))?;

        let session = WebRtcTransportSession::new(params.session_id.clone(), Arc::new(peer_connection), events);
        self.register(&session);

        info!(
            session_id = %params.session_id,
            ice_servers = params.ice_servers.len(),
            "Created peer connection"
        );
        Ok(session)
    }
}
