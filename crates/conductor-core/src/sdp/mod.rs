//! Session description and candidate payloads carried over signaling

pub mod candidate;
pub mod description;

pub use candidate::{CandidateType, IceCandidate};
pub use description::{MediaSection, SdpType, SessionDescription};
