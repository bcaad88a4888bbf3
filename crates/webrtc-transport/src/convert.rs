//! Conversions between conductor payloads and webrtc-rs types

use rtc_conductor_core::{
    ConductorError, IceCandidate, IceServerConfig, SdpType, SessionDescription, TransportError,
    TransportResult,
};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Ordered server list as webrtc-rs expects it
pub fn rtc_ice_servers(servers: &[IceServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|server| {
            #[allow(clippy::needless_update)]
            RTCIceServer {
                urls: vec![server.uri.clone()],
                username: server.username.clone().unwrap_or_default(),
                credential: server.password.clone().unwrap_or_default(),
                ..Default::default()
            }
        })
        .collect()
}

pub fn to_rtc_description(description: SessionDescription) -> TransportResult<RTCSessionDescription> {
    let sdp_type = description.sdp_type();
    let sdp = description.into_sdp_string();
    let converted = match sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(sdp),
        SdpType::Answer => RTCSessionDescription::answer(sdp),
        SdpType::PrAnswer => RTCSessionDescription::pranswer(sdp),
        SdpType::Rollback => {
            return Err(TransportError::Rejected(
                "rollback descriptions are not supported".to_string(),
            ))
        }
    };
    converted.map_err(|e| TransportError::Rejected(format!("invalid {} description: {}", sdp_type, e)))
}

pub fn from_rtc_description(description: RTCSessionDescription) -> TransportResult<SessionDescription> {
    let sdp_type = match description.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::PrAnswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        RTCSdpType::Unspecified => {
            return Err(TransportError::Failed(
                "engine produced a description without a type".to_string(),
            ))
        }
    };
    SessionDescription::from_parts(sdp_type, description.sdp).map_err(|e| TransportError::Failed(e.to_string()))
}

/// Candidate as webrtc-rs reports it from `on_ice_candidate`
pub fn candidate_from_init(init: &RTCIceCandidateInit) -> Result<IceCandidate, ConductorError> {
    IceCandidate::parse(
        init.sdp_mid.as_deref().unwrap_or_default(),
        init.sdp_mline_index.unwrap_or_default(),
        &init.candidate,
    )
}

/// Remote candidate as webrtc-rs accepts it
pub fn to_candidate_init(candidate: &IceCandidate) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.to_sdp_string(),
        sdp_mid: (!candidate.media_id.is_empty()).then(|| candidate.media_id.clone()),
        sdp_mline_index: Some(candidate.line_index),
        username_fragment: candidate.extension("ufrag").map(str::to_string),
    }
}
