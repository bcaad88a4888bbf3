//! Host setup/teardown around a conductor's lifetime

use std::sync::Arc;

use crate::errors::Result;

/// Process-wide platform glue (event filters, socket servers, TLS init)
/// the host installs while a conductor exists
pub trait HostLifecycle: Send + Sync {
    fn setup(&self) -> Result<()>;

    fn teardown(&self);
}

/// Lifecycle that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLifecycle;

impl HostLifecycle for NoopLifecycle {
    fn setup(&self) -> Result<()> {
        Ok(())
    }

    fn teardown(&self) {}
}

/// Runs `setup` on creation and `teardown` exactly once on drop
pub struct LifecycleGuard {
    hooks: Arc<dyn HostLifecycle>,
}

impl LifecycleGuard {
    pub fn new(hooks: Arc<dyn HostLifecycle>) -> Result<Self> {
        hooks.setup()?;
        tracing::debug!("Host lifecycle set up");
        Ok(Self { hooks })
    }
}

impl Drop for LifecycleGuard {
    fn drop(&mut self) {
        self.hooks.teardown();
        tracing::debug!("Host lifecycle torn down");
    }
}
