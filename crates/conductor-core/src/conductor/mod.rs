//! Session conductor
//!
//! Owns the at-most-one session, drives offer/answer and trickle-ICE
//! negotiation against the injected transport, and relays local
//! descriptions and candidates through the host's signaling relay.
//!
//! Every entry point and every transport event is serialized by one async
//! lock. Events are stamped with the session generation they were produced
//! under; anything stamped with a stale generation is dropped.

mod conductor;
mod event_handler;
mod session_ops;

pub use conductor::{ConductorBuilder, SessionConductor};

/// Track id of the always-attempted local audio track
pub const AUDIO_TRACK_ID: &str = "audio_track";

/// Track id of the local video track when video is wanted
pub const VIDEO_TRACK_ID: &str = "video_track";
