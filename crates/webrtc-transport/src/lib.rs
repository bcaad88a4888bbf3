//! # webrtc-rs transport for the RTC session conductor
//!
//! Implements the conductor's [`TransportFactory`](rtc_conductor_core::TransportFactory)
//! and [`TransportSession`](rtc_conductor_core::TransportSession) on top of
//! [webrtc-rs](https://github.com/webrtc-rs/webrtc). One `RTCPeerConnection`
//! is created per negotiation attempt.
//!
//! Engine callbacks are turned into conductor events:
//!
//! - `on_ice_candidate` becomes `CandidateDiscovered`, and the end of
//!   gathering becomes `GatheringComplete`
//! - `on_track` becomes `StreamAdded`
//! - a failed or closed peer connection removes every remote stream it carried
//!
//! Local tracks are `TrackLocalStaticSample` (Opus audio, VP8 video). The
//! application writes captured samples into them through
//! [`WebRtcTransportSession::local_track`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rtc_conductor_core::prelude::*;
//! use rtc_conductor_webrtc::WebRtcTransportFactory;
//!
//! # async fn example(relay: Arc<dyn SignalingRelay>) -> rtc_conductor_core::Result<()> {
//! let factory = Arc::new(WebRtcTransportFactory::new());
//! let conductor = SessionConductor::builder(ConductorConfig::default())
//!     .transport(factory.clone())
//!     .relay(relay)
//!     .build()?;
//!
//! conductor.initiate().await?;
//! if let Some(session) = factory.current_session() {
//!     let audio = session.local_track(AUDIO_TRACK_ID);
//!     # let _ = audio;
//! }
//! # Ok(())
//! # }
//! ```

pub mod convert;
mod factory;
mod session;

pub use factory::WebRtcTransportFactory;
pub use session::WebRtcTransportSession;
