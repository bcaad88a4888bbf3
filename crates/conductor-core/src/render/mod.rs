//! Render sink binding
//!
//! Binds local and remote video tracks to the host's renderers. Bindings live
//! no longer than the session that created them.

mod binder;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::RenderError;
use crate::transport::TrackHandle;

pub use binder::{RenderBinding, RenderSinkBinder};

/// Which side of the call a rendered track comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RenderRole {
    Local,
    Remote,
}

impl fmt::Display for RenderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// A renderer that decoded frames of a track can be attached to
#[async_trait]
pub trait RenderSink: Send + Sync {
    async fn attach(&self, track: &TrackHandle, role: RenderRole) -> Result<(), RenderError>;

    async fn detach(&self, track: &TrackHandle, role: RenderRole);
}
