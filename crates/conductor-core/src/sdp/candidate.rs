//! Network candidate parsing (RFC 8839 `candidate-attribute`)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ConductorError, Result};

/// Candidate type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateType {
    Host,
    ServerReflexive,
    PeerReflexive,
    Relay,
}

impl CandidateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::ServerReflexive => "srflx",
            Self::PeerReflexive => "prflx",
            Self::Relay => "relay",
        }
    }
}

impl FromStr for CandidateType {
    type Err = ConductorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "host" => Ok(Self::Host),
            "srflx" => Ok(Self::ServerReflexive),
            "prflx" => Ok(Self::PeerReflexive),
            "relay" => Ok(Self::Relay),
            other => Err(ConductorError::parse_candidate(format!(
                "unknown candidate type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A network candidate bound to one media section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// Media stream identification (`a=mid`) of the section
    pub media_id: String,
    /// Index of the `m=` line the candidate belongs to
    pub line_index: u16,

    pub foundation: String,
    pub component: u16,
    pub transport: String,
    pub priority: u32,
    pub address: String,
    pub port: u16,
    pub candidate_type: CandidateType,
    /// Trailing key/value pairs (`raddr`, `rport`, `generation`, ...) in order
    pub extensions: Vec<(String, String)>,
}

impl IceCandidate {
    /// Parse a candidate line received for `media_id` / `line_index`
    pub fn parse(media_id: &str, line_index: u16, payload: &str) -> Result<Self> {
        let line = payload.trim();
        let line = line.strip_prefix("a=").unwrap_or(line);
        let body = line
            .strip_prefix("candidate:")
            .ok_or_else(|| ConductorError::parse_candidate("missing 'candidate:' prefix"))?;

        let mut fields = body.split_whitespace();
        let mut next = |name: &str| {
            fields
                .next()
                .ok_or_else(|| ConductorError::parse_candidate(format!("missing {}", name)))
        };

        let foundation = next("foundation")?.to_string();
        let component = parse_number::<u16>(next("component")?, "component")?;
        let transport = next("transport")?.to_string();
        let priority = parse_number::<u32>(next("priority")?, "priority")?;
        let address = next("connection address")?.to_string();
        let port = parse_number::<u16>(next("port")?, "port")?;
        if next("'typ'")? != "typ" {
            return Err(ConductorError::parse_candidate("expected 'typ'"));
        }
        let candidate_type = next("candidate type")?.parse::<CandidateType>()?;

        let rest: Vec<&str> = fields.collect();
        if rest.len() % 2 != 0 {
            return Err(ConductorError::parse_candidate(format!(
                "dangling extension attribute '{}'",
                rest[rest.len() - 1]
            )));
        }
        let extensions = rest
            .chunks(2)
            .map(|pair| (pair[0].to_string(), pair[1].to_string()))
            .collect();

        Ok(Self {
            media_id: media_id.to_string(),
            line_index,
            foundation,
            component,
            transport,
            priority,
            address,
            port,
            candidate_type,
            extensions,
        })
    }

    /// Value of an extension attribute
    pub fn extension(&self, key: &str) -> Option<&str> {
        self.extensions
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Canonical `candidate:` serialization
    pub fn to_sdp_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for IceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "candidate:{} {} {} {} {} {} typ {}",
            self.foundation,
            self.component,
            self.transport,
            self.priority,
            self.address,
            self.port,
            self.candidate_type
        )?;
        for (key, value) in &self.extensions {
            write!(f, " {} {}", key, value)?;
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(value: &str, name: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| ConductorError::parse_candidate(format!("invalid {} '{}'", name, value)))
}
