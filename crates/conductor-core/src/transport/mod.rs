//! Transport service facade
//!
//! The media engine (codec negotiation, packet transport, congestion control,
//! encryption) is injected behind these traits. The conductor depends only on
//! the request/response contract below and on the events an engine delivers
//! through its [`TransportEventSink`].

pub mod capture;
pub mod events;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::TransportResult;
use crate::sdp::{IceCandidate, SessionDescription};

pub use capture::{CaptureSourceProvider, StaticDeviceList};
pub use events::{Generation, TransportEvent, TransportEventSink};
pub use types::{
    LocalMediaStream, RemoteStream, TrackHandle, TrackKind, TransportParams, VideoSource,
};

/// Constructs one engine session per negotiation attempt
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Build a session handle. Events for the session must be delivered
    /// through `events` for as long as the handle lives.
    async fn create_session(
        &self,
        params: TransportParams,
        events: TransportEventSink,
    ) -> TransportResult<Arc<dyn TransportSession>>;
}

/// One engine session. Owned exclusively by the conductor.
#[async_trait]
pub trait TransportSession: Send + Sync {
    async fn create_offer(&self) -> TransportResult<SessionDescription>;

    async fn create_answer(&self) -> TransportResult<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> TransportResult<()>;

    async fn set_remote_description(&self, description: SessionDescription) -> TransportResult<()>;

    /// Apply a remote candidate. Candidates for unknown media lines are rejected.
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> TransportResult<()>;

    async fn create_audio_track(&self, track_id: &str, stream_label: &str) -> TransportResult<TrackHandle>;

    async fn create_video_track(
        &self,
        track_id: &str,
        stream_label: &str,
        source: VideoSource,
    ) -> TransportResult<TrackHandle>;

    async fn add_stream(&self, stream: &LocalMediaStream) -> TransportResult<()>;

    /// Release the engine session. No events may follow.
    async fn close(&self);
}
