//! SessionConductor structure, builder and state publication

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex as SyncMutex, RwLock};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ConductorConfig;
use crate::errors::{ConductorError, Result};
use crate::render::{RenderRole, RenderSinkBinder};
use crate::session::{Session, SessionId, SessionInfo, SessionState};
use crate::signaling::{CallHandler, HostLifecycle, LifecycleGuard, MediaContext, NoopLifecycle, SignalingRelay};
use crate::transport::events::StampedEvent;
use crate::transport::{CaptureSourceProvider, Generation, StaticDeviceList, TransportFactory};

/// Call-handler callback recorded under the session lock, delivered after it
/// is released
pub(crate) enum Notification {
    StateChanged {
        handler: Arc<dyn CallHandler>,
        session_id: SessionId,
        old_state: SessionState,
        new_state: SessionState,
    },
    SessionActive {
        handler: Arc<dyn CallHandler>,
        session_id: SessionId,
    },
}

/// State shared between the public handle and the event loop
pub(crate) struct ConductorInner {
    // Collaborators
    pub(crate) config: ConductorConfig,
    pub(crate) factory: Arc<dyn TransportFactory>,
    pub(crate) capture: Arc<dyn CaptureSourceProvider>,
    pub(crate) relay: Arc<dyn SignalingRelay>,

    // The single session slot; `None` is Idle
    pub(crate) session: Mutex<Option<Session>>,
    pub(crate) generation: AtomicU64,
    pub(crate) state_tx: watch::Sender<SessionState>,

    pub(crate) binder: RenderSinkBinder,
    pub(crate) context: RwLock<MediaContext>,
    /// Secure-transport policy for the next session
    pub(crate) dtls_enabled: AtomicBool,

    pub(crate) event_tx: mpsc::UnboundedSender<StampedEvent>,
    pub(crate) notifications: SyncMutex<Vec<Notification>>,
}

impl ConductorInner {
    /// Start a new generation; everything stamped earlier becomes stale
    pub(crate) fn next_generation(&self) -> Generation {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn is_current(&self, generation: Generation) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Move `session` to `new_state` and publish it. Returns whether the
    /// state actually changed.
    pub(crate) fn transition(&self, session: &mut Session, new_state: SessionState) -> bool {
        let old_state = session.set_state(new_state);
        if old_state == new_state {
            return false;
        }
        self.publish_state(&session.id, old_state, new_state);
        true
    }

    /// Publish to state watchers now; the call handler hears about it on the
    /// next [`dispatch_notifications`](Self::dispatch_notifications)
    pub(crate) fn publish_state(&self, session_id: &SessionId, old_state: SessionState, new_state: SessionState) {
        self.state_tx.send_replace(new_state);
        let handler = self.context.read().handler.clone();
        if let Some(handler) = handler {
            self.notifications.lock().push(Notification::StateChanged {
                handler,
                session_id: session_id.clone(),
                old_state,
                new_state,
            });
        }
    }

    pub(crate) fn notify_active(&self, session_id: &SessionId) {
        let handler = self.context.read().handler.clone();
        if let Some(handler) = handler {
            self.notifications.lock().push(Notification::SessionActive {
                handler,
                session_id: session_id.clone(),
            });
        }
    }

    /// Deliver queued call-handler callbacks. Must be called with the
    /// session lock released; handlers may call back into the conductor.
    pub(crate) async fn dispatch_notifications(&self) {
        loop {
            let pending = std::mem::take(&mut *self.notifications.lock());
            if pending.is_empty() {
                return;
            }
            for notification in pending {
                match notification {
                    Notification::StateChanged {
                        handler,
                        session_id,
                        old_state,
                        new_state,
                    } => handler.on_state_changed(&session_id, old_state, new_state).await,
                    Notification::SessionActive { handler, session_id } => {
                        handler.on_session_active(&session_id).await
                    }
                }
            }
        }
    }
}

/// Coordinates one peer-to-peer media session over an IM signaling relay.
///
/// Built with [`SessionConductor::builder`]. Must be built inside a tokio
/// runtime; the event loop runs on that runtime until [`shutdown`] or drop.
///
/// [`shutdown`]: SessionConductor::shutdown
pub struct SessionConductor {
    pub(crate) inner: Arc<ConductorInner>,
    event_loop: SyncMutex<Option<JoinHandle<()>>>,
    lifecycle: SyncMutex<Option<LifecycleGuard>>,
}

impl SessionConductor {
    pub fn builder(config: ConductorConfig) -> ConductorBuilder {
        ConductorBuilder::new(config)
    }

    /// Current session state; Idle when there is no session
    pub fn state(&self) -> SessionState {
        *self.inner.state_tx.borrow()
    }

    /// Watch every state change from now on
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state_tx.subscribe()
    }

    /// Snapshot of the current session, if any
    pub async fn session_info(&self) -> Option<SessionInfo> {
        let slot = self.inner.session.lock().await;
        slot.as_ref().map(|s| s.info(self.inner.binder.bound_roles()))
    }

    /// Install the per-call media context. Its render sinks replace the
    /// binder's; existing bindings are kept.
    pub fn set_media_context(&self, context: MediaContext) {
        debug!(
            video = context.video,
            monitor = context.monitor,
            "Media context updated"
        );
        self.inner.binder.set_sink(RenderRole::Local, context.local_sink.clone());
        self.inner.binder.set_sink(RenderRole::Remote, context.remote_sink.clone());
        *self.inner.context.write() = context;
    }

    pub fn media_context(&self) -> MediaContext {
        self.inner.context.read().clone()
    }

    /// Secure-transport policy for the next session. A live session keeps
    /// the policy it was created with.
    pub fn set_dtls(&self, enabled: bool) {
        self.inner.dtls_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn dtls_enabled(&self) -> bool {
        self.inner.dtls_enabled.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &ConductorConfig {
        &self.inner.config
    }

    /// Stop the session, end the event loop and tear the host lifecycle down
    pub async fn shutdown(&self) {
        self.stop().await;
        if let Some(handle) = self.event_loop.lock().take() {
            handle.abort();
        }
        self.lifecycle.lock().take();
        info!("Session conductor shut down");
    }
}

impl Drop for SessionConductor {
    fn drop(&mut self) {
        if let Some(handle) = self.event_loop.get_mut().take() {
            handle.abort();
        }

        // Best effort: a session still live here was never stopped
        let transport = self
            .inner
            .session
            .try_lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .and_then(|mut session| session.release());
        if let Some(transport) = transport {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move { transport.close().await });
            }
        }
    }
}

/// Builder for [`SessionConductor`]
pub struct ConductorBuilder {
    config: ConductorConfig,
    factory: Option<Arc<dyn TransportFactory>>,
    capture: Option<Arc<dyn CaptureSourceProvider>>,
    relay: Option<Arc<dyn SignalingRelay>>,
    lifecycle: Option<Arc<dyn HostLifecycle>>,
}

impl ConductorBuilder {
    pub fn new(config: ConductorConfig) -> Self {
        Self {
            config,
            factory: None,
            capture: None,
            relay: None,
            lifecycle: None,
        }
    }

    /// Transport engine (required)
    pub fn transport(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Capture device resolution; defaults to no devices
    pub fn capture(mut self, provider: Arc<dyn CaptureSourceProvider>) -> Self {
        self.capture = Some(provider);
        self
    }

    /// Outbound signaling (required)
    pub fn relay(mut self, relay: Arc<dyn SignalingRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Host setup/teardown hooks; defaults to none
    pub fn lifecycle(mut self, hooks: Arc<dyn HostLifecycle>) -> Self {
        self.lifecycle = Some(hooks);
        self
    }

    pub fn build(self) -> Result<SessionConductor> {
        self.config.validate()?;

        let factory = self
            .factory
            .ok_or_else(|| ConductorError::config("a transport factory is required"))?;
        let relay = self
            .relay
            .ok_or_else(|| ConductorError::config("a signaling relay is required"))?;
        let capture = self
            .capture
            .unwrap_or_else(|| Arc::new(StaticDeviceList::empty()));
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| ConductorError::config("the conductor must be built inside a tokio runtime"))?;

        let lifecycle = LifecycleGuard::new(self.lifecycle.unwrap_or_else(|| Arc::new(NoopLifecycle)))?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(SessionState::Idle);
        let dtls_enabled = self.config.dtls_enabled;

        let inner = Arc::new(ConductorInner {
            config: self.config,
            factory,
            capture,
            relay,
            session: Mutex::new(None),
            generation: AtomicU64::new(0),
            state_tx,
            binder: RenderSinkBinder::new(),
            context: RwLock::new(MediaContext::default()),
            dtls_enabled: AtomicBool::new(dtls_enabled),
            event_tx,
            notifications: SyncMutex::new(Vec::new()),
        });

        let event_loop = runtime.spawn(ConductorInner::run_event_loop(Arc::downgrade(&inner), event_rx));

        info!(dtls = dtls_enabled, "Session conductor started");

        Ok(SessionConductor {
            inner,
            event_loop: SyncMutex::new(Some(event_loop)),
            lifecycle: SyncMutex::new(Some(lifecycle)),
        })
    }
}
