//! Conductor configuration
//!
//! Relay/reflection servers, capture device and transport policy are passed
//! in explicitly when the conductor is built. Nothing is read from a
//! process-wide singleton.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{ConductorError, Result};

/// Default STUN/TURN port (RFC 5389)
pub const DEFAULT_ICE_PORT: u16 = 3478;

/// Constraint key that toggles DTLS-SRTP key agreement
pub const DTLS_SRTP_KEY_AGREEMENT: &str = "DtlsSrtpKeyAgreement";

/// One relay or reflection endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    /// Server URI, e.g. `stun:stun.example.org:3478`
    pub uri: String,
    /// Username (relay servers only)
    pub username: Option<String>,
    /// Password (relay servers only)
    pub password: Option<String>,
}

impl IceServerConfig {
    /// Reflection (STUN) endpoint
    pub fn stun(host: &str, port: u16) -> Self {
        Self {
            uri: format!("stun:{}:{}", host, port),
            username: None,
            password: None,
        }
    }

    /// Relay (TURN) endpoint with credentials
    pub fn turn(host: &str, port: u16, username: &str, password: &str) -> Self {
        Self {
            uri: format!("turn:{}:{}", host, port),
            username: Some(username.to_string()),
            password: Some(password.to_string()),
        }
    }

    /// Whether this is a relay endpoint
    pub fn is_relay(&self) -> bool {
        self.uri.starts_with("turn:") || self.uri.starts_with("turns:")
    }
}

/// Negotiation options handed to the transport when a session is created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraintSet {
    mandatory: BTreeMap<String, String>,
    optional: BTreeMap<String, String>,
}

impl MediaConstraintSet {
    /// Empty constraint set
    pub fn new() -> Self {
        Self::default()
    }

    /// Constraint set carrying the secure-transport policy of one session
    pub fn from_dtls(dtls_enabled: bool) -> Self {
        let mut constraints = Self::new();
        constraints.add_optional(DTLS_SRTP_KEY_AGREEMENT, if dtls_enabled { "true" } else { "false" });
        constraints
    }

    pub fn add_mandatory(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.mandatory.insert(key.into(), value.into());
    }

    pub fn add_optional(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.optional.insert(key.into(), value.into());
    }

    /// Look a constraint up, mandatory entries first
    pub fn get(&self, key: &str) -> Option<&str> {
        self.mandatory
            .get(key)
            .or_else(|| self.optional.get(key))
            .map(String::as_str)
    }

    pub fn mandatory(&self) -> &BTreeMap<String, String> {
        &self.mandatory
    }

    pub fn optional(&self) -> &BTreeMap<String, String> {
        &self.optional
    }

    /// Secure-transport policy carried by this set, if any
    pub fn dtls_enabled(&self) -> Option<bool> {
        self.get(DTLS_SRTP_KEY_AGREEMENT).map(|v| v.eq_ignore_ascii_case("true"))
    }
}

/// Configuration consumed by the conductor (read-only once built)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorConfig {
    /// Reflection server host; empty disables it
    pub stun_host: String,
    pub stun_port: u16,

    /// Relay server host; empty disables it
    pub turn_host: String,
    pub turn_port: u16,
    pub turn_username: String,
    pub turn_password: String,

    /// Capture device index, -1 for none
    pub video_capture_device: i32,

    /// Secure transport (DTLS-SRTP) policy for new sessions
    pub dtls_enabled: bool,

    /// Label of the local media stream
    pub stream_label: String,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            stun_host: String::new(),
            stun_port: DEFAULT_ICE_PORT,
            turn_host: String::new(),
            turn_port: DEFAULT_ICE_PORT,
            turn_username: String::new(),
            turn_password: String::new(),
            video_capture_device: -1,
            dtls_enabled: true,
            stream_label: "stream".to_string(),
        }
    }
}

impl ConductorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reflection server
    pub fn with_stun_server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.stun_host = host.into();
        self.stun_port = port;
        self
    }

    /// Set the relay server and its credentials
    pub fn with_turn_server(
        mut self,
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.turn_host = host.into();
        self.turn_port = port;
        self.turn_username = username.into();
        self.turn_password = password.into();
        self
    }

    pub fn with_video_capture_device(mut self, index: i32) -> Self {
        self.video_capture_device = index;
        self
    }

    pub fn with_dtls(mut self, enabled: bool) -> Self {
        self.dtls_enabled = enabled;
        self
    }

    pub fn with_stream_label(mut self, label: impl Into<String>) -> Self {
        self.stream_label = label.into();
        self
    }

    /// Load from a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ConductorError::config(format!("invalid config JSON: {}", e)))
    }

    /// Load from `RTC_*` environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("RTC_STUN_SERVER") {
            let (host, port) = parse_host_port(&value)?;
            config.stun_host = host;
            config.stun_port = port;
        }
        if let Some(value) = lookup("RTC_TURN_SERVER") {
            let (host, port) = parse_host_port(&value)?;
            config.turn_host = host;
            config.turn_port = port;
        }
        if let Some(value) = lookup("RTC_TURN_USERNAME") {
            config.turn_username = value;
        }
        if let Some(value) = lookup("RTC_TURN_PASSWORD") {
            config.turn_password = value;
        }
        if let Some(value) = lookup("RTC_VIDEO_DEVICE") {
            config.video_capture_device = value.trim().parse().map_err(|_| {
                ConductorError::config(format!("RTC_VIDEO_DEVICE is not an integer: {}", value))
            })?;
        }
        if let Some(value) = lookup("RTC_DTLS") {
            config.dtls_enabled = matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        Ok(config)
    }

    /// Check the configuration for values the transport can't use
    pub fn validate(&self) -> Result<()> {
        if !self.stun_host.is_empty() && self.stun_port == 0 {
            return Err(ConductorError::config("STUN port must be non-zero"));
        }
        if !self.turn_host.is_empty() {
            if self.turn_port == 0 {
                return Err(ConductorError::config("TURN port must be non-zero"));
            }
            if self.turn_username.is_empty() || self.turn_password.is_empty() {
                return Err(ConductorError::config(
                    "TURN server requires username and password",
                ));
            }
        }
        if self.stream_label.is_empty() {
            return Err(ConductorError::config("stream label must not be empty"));
        }
        Ok(())
    }

    /// Ordered server list: reflection first, relay second
    pub fn ice_servers(&self) -> Vec<IceServerConfig> {
        let mut servers = Vec::with_capacity(2);
        if !self.stun_host.is_empty() {
            servers.push(IceServerConfig::stun(&self.stun_host, self.stun_port));
        }
        if !self.turn_host.is_empty() {
            servers.push(IceServerConfig::turn(
                &self.turn_host,
                self.turn_port,
                &self.turn_username,
                &self.turn_password,
            ));
        }
        servers
    }
}

fn parse_host_port(value: &str) -> Result<(String, u16)> {
    let value = value.trim();
    match value.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| ConductorError::config(format!("invalid port in '{}'", value)))?;
            Ok((host.to_string(), port))
        }
        None => Ok((value.to_string(), DEFAULT_ICE_PORT)),
    }
}
