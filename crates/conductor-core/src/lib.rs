//! # RTC Conductor Core
//!
//! Negotiation state machine for one peer-to-peer audio/video session whose
//! signaling is relayed over an instant-messaging channel.
//!
//! The crate provides:
//! - **SessionConductor**: owns at most one session, drives offer/answer and
//!   trickle-ICE exchange, and decides when local media is attached
//! - **Transport facade**: async traits the media engine is injected behind
//! - **Render binder**: attaches local/remote video tracks to host renderers,
//!   honouring monitor mode
//! - **Signaling relay**: the outbound calls the host application provides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rtc_conductor_core::prelude::*;
//!
//! # async fn example(
//! #     factory: Arc<dyn TransportFactory>,
//! #     relay: Arc<dyn SignalingRelay>,
//! # ) -> rtc_conductor_core::Result<()> {
//! let config = ConductorConfig::new().with_stun_server("stun.example.org", 3478);
//! let conductor = SessionConductor::builder(config)
//!     .transport(factory)
//!     .relay(relay)
//!     .build()?;
//!
//! conductor.set_media_context(MediaContext::new().with_video(true));
//! conductor.initiate().await?;
//!
//! // Inbound signaling from the remote peer
//! conductor.accept_remote("v=0\r\n...", "answer").await?;
//! conductor.receive_candidate("0", 0, "candidate:1 1 udp 2122260223 192.0.2.1 54400 typ host").await?;
//!
//! conductor.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod conductor;
pub mod config;
pub mod errors;
pub mod render;
pub mod sdp;
pub mod session;
pub mod signaling;
pub mod transport;

pub use conductor::{ConductorBuilder, SessionConductor};
pub use config::{ConductorConfig, IceServerConfig, MediaConstraintSet};
pub use errors::{ConductorError, PayloadKind, RenderError, Result, TransportError, TransportResult};
pub use render::{RenderBinding, RenderRole, RenderSink, RenderSinkBinder};
pub use sdp::{CandidateType, IceCandidate, SdpType, SessionDescription};
pub use session::{SessionId, SessionInfo, SessionState};
pub use signaling::{CallHandler, HostLifecycle, LifecycleGuard, MediaContext, NoopLifecycle, SignalingRelay};
pub use transport::{
    CaptureSourceProvider, LocalMediaStream, RemoteStream, StaticDeviceList, TrackHandle, TrackKind,
    TransportEvent, TransportEventSink, TransportFactory, TransportParams, TransportSession, VideoSource,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything a host application or transport adapter usually needs
pub mod prelude {
    pub use crate::conductor::{ConductorBuilder, SessionConductor, AUDIO_TRACK_ID, VIDEO_TRACK_ID};
    pub use crate::config::{ConductorConfig, IceServerConfig, MediaConstraintSet};
    pub use crate::errors::{ConductorError, RenderError, Result, TransportError, TransportResult};
    pub use crate::render::{RenderRole, RenderSink};
    pub use crate::sdp::{IceCandidate, SdpType, SessionDescription};
    pub use crate::session::{SessionId, SessionInfo, SessionState};
    pub use crate::signaling::{CallHandler, HostLifecycle, MediaContext, SignalingRelay};
    pub use crate::transport::{
        CaptureSourceProvider, LocalMediaStream, RemoteStream, StaticDeviceList, TrackHandle, TrackKind,
        TransportEvent, TransportEventSink, TransportFactory, TransportParams, TransportSession, VideoSource,
    };
}
