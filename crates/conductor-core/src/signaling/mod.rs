//! Signaling relay interface
//!
//! The outward calls the conductor makes on the hosting application (send a
//! description, send a candidate, report state) and the per-call media
//! context the host supplies.

mod lifecycle;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::render::RenderSink;
use crate::session::{SessionId, SessionState};

pub use lifecycle::{HostLifecycle, LifecycleGuard, NoopLifecycle};

/// Outbound signaling over the instant-messaging channel.
///
/// Called while the conductor holds its session lock: an implementation must
/// hand messages off (queue, channel, spawn) and never call back into the
/// conductor from inside these methods.
#[async_trait]
pub trait SignalingRelay: Send + Sync {
    /// Relay a local description. A negotiation failure is reported as
    /// `("", "", false)`.
    async fn send_session_description(&self, payload: &str, sdp_type: &str, success: bool);

    /// Relay one local candidate
    async fn send_network_candidate(&self, media_id: &str, line_index: u16, payload: &str);
}

/// State notifications for the owning call.
///
/// Callbacks are delivered after the conductor has released its session
/// lock, in the order the transitions happened. A handler may call back
/// into the conductor (`stop`, `session_info`, `initiate`, ...); anything
/// that call changes is delivered before the outer callback's remaining
/// notifications. `on_state_changed` may run on the task that made the
/// inbound call or on the conductor's event loop.
#[async_trait]
pub trait CallHandler: Send + Sync {
    /// The session went Active because remote media arrived. Once per
    /// session, however many streams or tracks follow.
    async fn on_session_active(&self, _session_id: &SessionId) {}

    /// Any session state transition
    async fn on_state_changed(&self, _session_id: &SessionId, _old: SessionState, _new: SessionState) {}
}

/// What the owning call wants from the media side of the session
#[derive(Clone, Default)]
pub struct MediaContext {
    /// Capture and send video
    pub video: bool,
    /// Monitor mode: no local or remote rendering
    pub monitor: bool,
    pub handler: Option<Arc<dyn CallHandler>>,
    pub local_sink: Option<Arc<dyn RenderSink>>,
    pub remote_sink: Option<Arc<dyn RenderSink>>,
}

impl MediaContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video(mut self, video: bool) -> Self {
        self.video = video;
        self
    }

    pub fn with_monitor(mut self, monitor: bool) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn CallHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn with_local_sink(mut self, sink: Arc<dyn RenderSink>) -> Self {
        self.local_sink = Some(sink);
        self
    }

    pub fn with_remote_sink(mut self, sink: Arc<dyn RenderSink>) -> Self {
        self.remote_sink = Some(sink);
        self
    }
}

impl fmt::Debug for MediaContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaContext")
            .field("video", &self.video)
            .field("monitor", &self.monitor)
            .field("handler", &self.handler.is_some())
            .field("local_sink", &self.local_sink.is_some())
            .field("remote_sink", &self.remote_sink.is_some())
            .finish()
    }
}
