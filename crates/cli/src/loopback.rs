//! Two in-process conductors wired back to back
//!
//! Each conductor relays through a JSON channel standing in for the IM
//! connection. Pump tasks deliver the other side's messages, so no relay
//! ever calls into a conductor from inside a conductor callback.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webrtc::media::Sample;

use rtc_conductor_core::prelude::*;
use rtc_conductor_webrtc::WebRtcTransportFactory;

/// One 20 ms Opus frame of silence
const OPUS_SILENCE: [u8; 3] = [0xf8, 0xff, 0xfe];
const FRAME_INTERVAL: Duration = Duration::from_millis(20);
const VIDEO_FRAME_EVERY: u64 = 5;

#[derive(Debug, Clone)]
pub struct LoopbackOptions {
    pub video: bool,
    pub monitor: bool,
    /// How long to hold the call once both sides are active
    pub duration: Duration,
    /// How long to wait for both sides to become active
    pub timeout: Duration,
}

/// Signaling message as carried by the IM relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Signal {
    Description {
        sdp: String,
        #[serde(rename = "type")]
        sdp_type: String,
        success: bool,
    },
    Candidate {
        mid: String,
        index: u16,
        sdp: String,
    },
}

struct JsonRelay {
    peer: &'static str,
    tx: mpsc::UnboundedSender<String>,
}

impl JsonRelay {
    fn forward(&self, signal: &Signal) {
        match serde_json::to_string(signal) {
            Ok(raw) => {
                if self.tx.send(raw).is_err() {
                    debug!(peer = self.peer, "Relay closed, dropping signal");
                }
            }
            Err(e) => warn!(peer = self.peer, "Failed to encode signal: {}", e),
        }
    }
}

#[async_trait]
impl SignalingRelay for JsonRelay {
    async fn send_session_description(&self, payload: &str, sdp_type: &str, success: bool) {
        self.forward(&Signal::Description {
            sdp: payload.to_string(),
            sdp_type: sdp_type.to_string(),
            success,
        });
    }

    async fn send_network_candidate(&self, media_id: &str, line_index: u16, payload: &str) {
        self.forward(&Signal::Candidate {
            mid: media_id.to_string(),
            index: line_index,
            sdp: payload.to_string(),
        });
    }
}

struct LoggingHandler {
    peer: &'static str,
}

#[async_trait]
impl CallHandler for LoggingHandler {
    async fn on_session_active(&self, session_id: &SessionId) {
        info!(peer = self.peer, %session_id, "Remote media arrived");
    }

    async fn on_state_changed(&self, session_id: &SessionId, old: SessionState, new: SessionState) {
        info!(peer = self.peer, %session_id, "{} -> {}", old, new);
    }
}

struct LoggingSink {
    peer: &'static str,
}

#[async_trait]
impl RenderSink for LoggingSink {
    async fn attach(&self, track: &TrackHandle, role: RenderRole) -> std::result::Result<(), RenderError> {
        info!(peer = self.peer, %role, track_id = %track.id, "Rendering track");
        Ok(())
    }

    async fn detach(&self, track: &TrackHandle, role: RenderRole) {
        info!(peer = self.peer, %role, track_id = %track.id, "Stopped rendering track");
    }
}

struct Endpoint {
    name: &'static str,
    conductor: Arc<SessionConductor>,
    factory: Arc<WebRtcTransportFactory>,
}

impl Endpoint {
    fn start(
        name: &'static str,
        config: ConductorConfig,
        options: &LoopbackOptions,
    ) -> Result<(Self, mpsc::UnboundedReceiver<String>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let factory = Arc::new(WebRtcTransportFactory::new());
        let devices = if options.video {
            StaticDeviceList::new(["Synthetic Camera"])
        } else {
            StaticDeviceList::empty()
        };

        let conductor = SessionConductor::builder(config)
            .transport(factory.clone())
            .capture(Arc::new(devices))
            .relay(Arc::new(JsonRelay { peer: name, tx }))
            .build()
            .with_context(|| format!("failed to start {} conductor", name))?;

        let sink: Arc<dyn RenderSink> = Arc::new(LoggingSink { peer: name });
        conductor.set_media_context(
            MediaContext::new()
                .with_video(options.video)
                .with_monitor(options.monitor)
                .with_handler(Arc::new(LoggingHandler { peer: name }))
                .with_local_sink(sink.clone())
                .with_remote_sink(sink),
        );

        let endpoint = Self {
            name,
            conductor: Arc::new(conductor),
            factory,
        };
        Ok((endpoint, rx))
    }

    async fn wait_active(&self, timeout: Duration) -> Result<()> {
        let mut states = self.conductor.subscribe_state();
        let waited = tokio::time::timeout(timeout, async {
            loop {
                let state = *states.borrow_and_update();
                match state {
                    SessionState::Active => return Ok(()),
                    SessionState::Failed => bail!("{} session failed", self.name),
                    _ => {}
                }
                if states.changed().await.is_err() {
                    bail!("{} conductor shut down", self.name);
                }
            }
        })
        .await;
        waited.with_context(|| format!("{} did not become active within {:?}", self.name, timeout))?
    }

    async fn print_snapshot(&self) -> Result<()> {
        match self.conductor.session_info().await {
            Some(info) => println!("{}: {}", self.name, serde_json::to_string_pretty(&info)?),
            None => println!("{}: no session", self.name),
        }
        Ok(())
    }

    /// Feed synthetic frames into whatever local tracks the current session has
    fn spawn_media(&self, video: bool) -> JoinHandle<()> {
        let factory = self.factory.clone();
        let peer = self.name;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(FRAME_INTERVAL);
            let mut frame: u64 = 0;
            loop {
                ticker.tick().await;
                frame += 1;
                let Some(session) = factory.current_session() else {
                    continue;
                };

                if let Some(track) = session.local_track(AUDIO_TRACK_ID) {
                    let sample = Sample {
                        data: OPUS_SILENCE.to_vec().into(),
                        duration: FRAME_INTERVAL,
                        ..Default::default()
                    };
                    if let Err(e) = track.write_sample(&sample).await {
                        debug!(peer, "Audio write failed: {}", e);
                    }
                }

                if video && frame % VIDEO_FRAME_EVERY == 0 {
                    if let Some(track) = session.local_track(VIDEO_TRACK_ID) {
                        let sample = Sample {
                            data: vec![0u8; 64].into(),
                            duration: FRAME_INTERVAL * VIDEO_FRAME_EVERY as u32,
                            ..Default::default()
                        };
                        if let Err(e) = track.write_sample(&sample).await {
                            debug!(peer, "Video write failed: {}", e);
                        }
                    }
                }
            }
        })
    }
}

/// Deliver one side's relayed messages to the other side's conductor
fn spawn_pump(from: &'static str, mut rx: mpsc::UnboundedReceiver<String>, target: Arc<SessionConductor>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(raw) = rx.recv().await {
            let signal: Signal = match serde_json::from_str(&raw) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!(peer = from, "Dropping malformed signal: {}", e);
                    continue;
                }
            };

            match signal {
                Signal::Description { success: false, .. } => {
                    warn!(peer = from, "Peer reported a negotiation failure, hanging up");
                    target.stop().await;
                }
                Signal::Description { sdp, sdp_type, .. } => {
                    if let Err(e) = target.accept_remote(&sdp, &sdp_type).await {
                        warn!(peer = from, "Remote description refused: {}", e);
                    }
                }
                Signal::Candidate { mid, index, sdp } => {
                    if let Err(e) = target.receive_candidate(&mid, index, &sdp).await {
                        debug!(peer = from, "Remote candidate refused: {}", e);
                    }
                }
            }
        }
    })
}

/// Run one loopback call to completion
pub async fn run(config: ConductorConfig, options: LoopbackOptions) -> Result<()> {
    let (caller, caller_out) = Endpoint::start("caller", config.clone(), &options)?;
    let (callee, callee_out) = Endpoint::start("callee", config, &options)?;

    let tasks = [
        spawn_pump(caller.name, caller_out, callee.conductor.clone()),
        spawn_pump(callee.name, callee_out, caller.conductor.clone()),
        caller.spawn_media(options.video),
        callee.spawn_media(options.video),
    ];

    let result = call(&caller, &callee, &options).await;

    caller.conductor.shutdown().await;
    callee.conductor.shutdown().await;
    for task in tasks {
        task.abort();
    }
    result
}

async fn call(caller: &Endpoint, callee: &Endpoint, options: &LoopbackOptions) -> Result<()> {
    caller.conductor.initiate().await.context("caller failed to initiate")?;

    let (caller_ready, callee_ready) = tokio::join!(
        caller.wait_active(options.timeout),
        callee.wait_active(options.timeout)
    );
    caller_ready?;
    callee_ready?;

    info!("Loopback call active");
    caller.print_snapshot().await?;
    callee.print_snapshot().await?;

    tokio::select! {
        _ = tokio::time::sleep(options.duration) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    caller.conductor.stop().await;
    callee.conductor.stop().await;
    info!("Loopback call finished");
    Ok(())
}
