//! Handles exchanged with the media transport engine

use serde::{Deserialize, Serialize};

use crate::config::{IceServerConfig, MediaConstraintSet};
use crate::session::SessionId;

/// Media kind of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Opaque reference to a track owned by the transport engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackHandle {
    pub id: String,
    /// Stream the track belongs to
    pub stream_id: String,
    pub kind: TrackKind,
}

impl TrackHandle {
    pub fn new(id: impl Into<String>, stream_id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            stream_id: stream_id.into(),
            kind,
        }
    }

    pub fn video(id: impl Into<String>, stream_id: impl Into<String>) -> Self {
        Self::new(id, stream_id, TrackKind::Video)
    }

    pub fn audio(id: impl Into<String>, stream_id: impl Into<String>) -> Self {
        Self::new(id, stream_id, TrackKind::Audio)
    }

    /// A handle with no track id refers to nothing
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }
}

/// A capturable video source resolved from a device index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSource {
    pub device_index: i32,
    pub device_name: String,
}

/// Local audio/video capture attached to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMediaStream {
    pub label: String,
    tracks: Vec<TrackHandle>,
}

impl LocalMediaStream {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            tracks: Vec::new(),
        }
    }

    pub fn add_track(&mut self, track: TrackHandle) {
        self.tracks.push(track);
    }

    pub fn tracks(&self) -> &[TrackHandle] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &TrackHandle> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &TrackHandle> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Video)
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Stream announced by the transport when the remote peer's media arrives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub id: String,
    pub audio_tracks: Vec<TrackHandle>,
    pub video_tracks: Vec<TrackHandle>,
}

impl RemoteStream {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            audio_tracks: Vec::new(),
            video_tracks: Vec::new(),
        }
    }

    pub fn with_track(mut self, track: TrackHandle) -> Self {
        match track.kind {
            TrackKind::Audio => self.audio_tracks.push(track),
            TrackKind::Video => self.video_tracks.push(track),
        }
        self
    }

    /// Only the first video track of a stream is ever rendered
    pub fn first_video_track(&self) -> Option<&TrackHandle> {
        self.video_tracks.first()
    }
}

/// Everything the engine needs to construct one session handle
#[derive(Debug, Clone)]
pub struct TransportParams {
    pub session_id: SessionId,
    /// Reflection endpoint first, relay endpoint second
    pub ice_servers: Vec<IceServerConfig>,
    pub constraints: MediaConstraintSet,
}
