use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::errors::{ConductorError, Result};
use crate::transport::TrackHandle;

use super::{RenderRole, RenderSink};

/// A track attached to a render sink
#[derive(Clone)]
pub struct RenderBinding {
    pub role: RenderRole,
    pub track: TrackHandle,
    sink: Arc<dyn RenderSink>,
}

impl fmt::Debug for RenderBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderBinding")
            .field("role", &self.role)
            .field("track", &self.track)
            .finish_non_exhaustive()
    }
}

/// Owns the render bindings of the current session, at most one per role
#[derive(Default)]
pub struct RenderSinkBinder {
    sinks: DashMap<RenderRole, Arc<dyn RenderSink>>,
    bindings: DashMap<RenderRole, RenderBinding>,
}

impl RenderSinkBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or with `None` remove) the sink used for a role
    pub fn set_sink(&self, role: RenderRole, sink: Option<Arc<dyn RenderSink>>) {
        match sink {
            Some(sink) => {
                self.sinks.insert(role, sink);
            }
            None => {
                self.sinks.remove(&role);
            }
        }
    }

    pub fn has_sink(&self, role: RenderRole) -> bool {
        self.sinks.contains_key(&role)
    }

    /// Attach `track` to the sink for `role`.
    ///
    /// Returns `Ok(false)` without touching any sink when `suppress` is set
    /// (monitor mode), when the handle is empty or when no sink is installed
    /// for the role. An existing binding for the role is released first.
    pub async fn bind(&self, track: &TrackHandle, role: RenderRole, suppress: bool) -> Result<bool> {
        if suppress {
            debug!("Rendering suppressed for {} track {}", role, track.id);
            return Ok(false);
        }
        if track.is_empty() {
            debug!("Empty {} track handle, nothing to bind", role);
            return Ok(false);
        }
        let sink = match self.sinks.get(&role) {
            Some(sink) => Arc::clone(sink.value()),
            None => {
                debug!("No {} render sink installed, track {} not rendered", role, track.id);
                return Ok(false);
            }
        };

        self.release(role).await;

        sink.attach(track, role)
            .await
            .map_err(|e| ConductorError::render_attach(role, e.to_string()))?;

        info!("Bound {} track {} to renderer", role, track.id);
        self.bindings.insert(
            role,
            RenderBinding {
                role,
                track: track.clone(),
                sink,
            },
        );
        Ok(true)
    }

    /// Tear down the binding for a role and detach its sink
    pub async fn release(&self, role: RenderRole) -> bool {
        match self.bindings.remove(&role) {
            Some((_, binding)) => {
                binding.sink.detach(&binding.track, role).await;
                debug!("Released {} binding for track {}", role, binding.track.id);
                true
            }
            None => false,
        }
    }

    /// Release every binding whose track belongs to `stream_id`
    pub async fn release_stream(&self, stream_id: &str) -> usize {
        let roles: Vec<RenderRole> = self
            .bindings
            .iter()
            .filter(|entry| entry.value().track.stream_id == stream_id)
            .map(|entry| *entry.key())
            .collect();

        let mut released = 0;
        for role in roles {
            if self.release(role).await {
                released += 1;
            }
        }
        released
    }

    pub async fn release_all(&self) {
        for role in [RenderRole::Local, RenderRole::Remote] {
            self.release(role).await;
        }
    }

    pub fn binding(&self, role: RenderRole) -> Option<RenderBinding> {
        self.bindings.get(&role).map(|b| b.value().clone())
    }

    pub fn is_bound(&self, role: RenderRole) -> bool {
        self.bindings.contains_key(&role)
    }

    /// Roles that currently have a binding, local first
    pub fn bound_roles(&self) -> Vec<RenderRole> {
        let mut roles: Vec<RenderRole> = self.bindings.iter().map(|e| *e.key()).collect();
        roles.sort();
        roles
    }
}
