//! Session description parsing
//!
//! The conductor never rewrites a description. Parsing only validates the
//! payload enough to reject garbage coming off the signaling channel before
//! it reaches the transport.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ConductorError, Result};

/// Type tag of a session description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    PrAnswer,
    Answer,
    Rollback,
}

impl SdpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::PrAnswer => "pranswer",
            Self::Answer => "answer",
            Self::Rollback => "rollback",
        }
    }
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SdpType {
    type Err = ConductorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offer" => Ok(Self::Offer),
            "pranswer" => Ok(Self::PrAnswer),
            "answer" => Ok(Self::Answer),
            "rollback" => Ok(Self::Rollback),
            other => Err(ConductorError::parse_description(format!(
                "unknown description type '{}'",
                other
            ))),
        }
    }
}

/// One `m=` section of a description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSection {
    /// Media kind (`audio`, `video`, `application`)
    pub kind: String,
    /// `a=mid:` value, if present
    pub mid: Option<String>,
}

/// A validated session description and its type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    sdp_type: SdpType,
    sdp: String,
}

impl SessionDescription {
    /// Parse a description received from the signaling channel
    pub fn parse(sdp: &str, sdp_type: &str) -> Result<Self> {
        let sdp_type = sdp_type.parse::<SdpType>()?;
        Self::from_parts(sdp_type, sdp.to_string())
    }

    /// Validate a description produced by the transport
    pub fn from_parts(sdp_type: SdpType, sdp: String) -> Result<Self> {
        validate(&sdp)?;
        Ok(Self { sdp_type, sdp })
    }

    pub fn sdp_type(&self) -> SdpType {
        self.sdp_type
    }

    pub fn is_offer(&self) -> bool {
        self.sdp_type == SdpType::Offer
    }

    /// Serialized form, byte-for-byte as received or created
    pub fn to_sdp_string(&self) -> &str {
        &self.sdp
    }

    pub fn into_sdp_string(self) -> String {
        self.sdp
    }

    /// Media sections in order of appearance
    pub fn media_sections(&self) -> Vec<MediaSection> {
        let mut sections: Vec<MediaSection> = Vec::new();
        for line in lines(&self.sdp) {
            if let Some(media) = line.strip_prefix("m=") {
                let kind = media.split_whitespace().next().unwrap_or_default();
                sections.push(MediaSection {
                    kind: kind.to_string(),
                    mid: None,
                });
            } else if let Some(mid) = line.strip_prefix("a=mid:") {
                if let Some(section) = sections.last_mut() {
                    section.mid = Some(mid.trim().to_string());
                }
            }
        }
        sections
    }
}

fn lines(sdp: &str) -> impl Iterator<Item = &str> {
    sdp.lines().map(|l| l.trim_end_matches('\r')).filter(|l| !l.is_empty())
}

fn validate(sdp: &str) -> Result<()> {
    let mut iter = lines(sdp);
    match iter.next() {
        None => return Err(ConductorError::parse_description("empty payload")),
        Some("v=0") => {}
        Some(first) => {
            return Err(ConductorError::parse_description(format!(
                "expected 'v=0' as first line, got '{}'",
                first
            )))
        }
    }

    let mut has_origin = false;
    let mut has_name = false;
    for (n, line) in iter.enumerate() {
        let bytes = line.as_bytes();
        if bytes.len() < 2 || !bytes[0].is_ascii_lowercase() || bytes[1] != b'=' {
            return Err(ConductorError::parse_description(format!(
                "malformed line {}: '{}'",
                n + 2,
                line
            )));
        }
        match bytes[0] {
            b'o' => has_origin = true,
            b's' => has_name = true,
            _ => {}
        }
    }

    if !has_origin {
        return Err(ConductorError::parse_description("missing o= line"));
    }
    if !has_name {
        return Err(ConductorError::parse_description("missing s= line"));
    }
    Ok(())
}
