//! Local capture policy and render binding of local/remote tracks

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rtc_conductor_core::prelude::*;

use common::*;

fn remote_stream(id: &str, video_tracks: &[&str]) -> RemoteStream {
    let mut stream = RemoteStream::new(id).with_track(TrackHandle::audio(format!("{}-audio", id), id));
    for track in video_tracks {
        stream = stream.with_track(TrackHandle::video(*track, id));
    }
    stream
}

#[tokio::test]
async fn test_audio_only_session_attaches_audio_track() {
    let mut harness = Harness::new();
    harness.conductor.initiate().await.unwrap();
    harness.next_outbound().await;

    let transport = harness.factory.last_session();
    let streams = transport.streams.lock().clone();
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].label, "stream");
    assert_eq!(
        streams[0].tracks().to_vec(),
        vec![TrackHandle::audio(AUDIO_TRACK_ID, "stream")]
    );

    let journal = harness.journal();
    assert_eq!(position(&journal, "track:video_track"), None);
    // Local media is attached before the offer is requested
    assert!(position(&journal, "add_stream:stream:1").unwrap() < position(&journal, "create_offer").unwrap());
}

#[tokio::test]
async fn test_video_session_binds_local_preview() {
    let local = Arc::new(RecordingSink::default());
    let mut harness = Harness::new();
    harness
        .conductor
        .set_media_context(MediaContext::new().with_video(true).with_local_sink(local.clone()));

    harness.conductor.initiate().await.unwrap();
    harness.next_outbound().await;

    let transport = harness.factory.last_session();
    let stream = transport.streams.lock()[0].clone();
    assert_eq!(stream.audio_tracks().count(), 1);
    assert_eq!(stream.video_tracks().next().map(|t| t.id.as_str()), Some(VIDEO_TRACK_ID));

    assert_eq!(local.entries(), vec!["attach:local:video_track"]);
    let info = harness.conductor.session_info().await.unwrap();
    assert_eq!(info.bound_roles, vec![RenderRole::Local]);
    assert_eq!(info.local_tracks.len(), 2);
}

#[tokio::test]
async fn test_monitor_mode_skips_local_preview() {
    let local = Arc::new(RecordingSink::default());
    let mut harness = Harness::new();
    harness.conductor.set_media_context(
        MediaContext::new()
            .with_video(true)
            .with_monitor(true)
            .with_local_sink(local.clone()),
    );

    harness.conductor.initiate().await.unwrap();
    harness.next_outbound().await;

    assert!(local.entries().is_empty());
    // The video track is still sent
    let stream = harness.factory.last_session().streams.lock()[0].clone();
    assert_eq!(stream.video_tracks().count(), 1);
}

#[tokio::test]
async fn test_missing_capture_device_continues_with_audio() {
    let config = test_config().with_video_capture_device(3);
    let mut harness = Harness::with(config, MockBehavior::default());
    harness
        .conductor
        .set_media_context(MediaContext::new().with_video(true));

    harness.conductor.initiate().await.unwrap();
    assert_eq!(
        harness.next_outbound().await,
        Outbound::description(OFFER_SDP, "offer", true)
    );

    let stream = harness.factory.last_session().streams.lock()[0].clone();
    assert_eq!(stream.tracks().len(), 1);
    assert_eq!(stream.video_tracks().count(), 0);
}

#[tokio::test]
async fn test_video_track_failure_continues_with_audio() {
    let local = Arc::new(RecordingSink::default());
    let mut harness = Harness::with_behavior(MockBehavior {
        fail_video_track: true,
        ..Default::default()
    });
    harness
        .conductor
        .set_media_context(MediaContext::new().with_video(true).with_local_sink(local.clone()));

    harness.conductor.initiate().await.unwrap();
    harness.next_outbound().await;

    assert!(local.entries().is_empty());
    assert_eq!(harness.conductor.state(), SessionState::Negotiating);
    assert_eq!(harness.factory.last_session().streams.lock()[0].tracks().len(), 1);
}

#[tokio::test]
async fn test_remote_stream_renders_first_video_track_and_activates() {
    let remote = Arc::new(RecordingSink::default());
    let handler = Arc::new(RecordingHandler::default());
    let mut harness = Harness::new();
    harness.conductor.set_media_context(
        MediaContext::new()
            .with_remote_sink(remote.clone())
            .with_handler(handler.clone()),
    );

    harness.conductor.initiate().await.unwrap();
    harness.next_outbound().await;
    harness
        .factory
        .last_sink()
        .emit(TransportEvent::StreamAdded(remote_stream("remote", &["cam", "screen"])));
    harness.wait_for_state(SessionState::Active).await;
    harness.settle().await;

    assert_eq!(remote.entries(), vec!["attach:remote:cam"]);
    assert_eq!(handler.active_count(), 1);

    let info = harness.conductor.session_info().await.unwrap();
    assert_eq!(info.state, SessionState::Active);
    assert_eq!(info.remote_stream_id.as_deref(), Some("remote"));
    assert_eq!(info.bound_roles, vec![RenderRole::Remote]);
    assert_eq!(handler.active.lock()[0], info.session_id);
}

#[tokio::test]
async fn test_monitor_mode_activates_without_remote_binding() {
    let remote = Arc::new(RecordingSink::default());
    let handler = Arc::new(RecordingHandler::default());
    let mut harness = Harness::new();
    harness.conductor.set_media_context(
        MediaContext::new()
            .with_monitor(true)
            .with_remote_sink(remote.clone())
            .with_handler(handler.clone()),
    );

    harness.conductor.initiate().await.unwrap();
    harness.next_outbound().await;
    harness
        .factory
        .last_sink()
        .emit(TransportEvent::StreamAdded(remote_stream("remote", &["cam"])));
    harness.wait_for_state(SessionState::Active).await;
    harness.settle().await;

    assert!(remote.entries().is_empty());
    assert_eq!(handler.active_count(), 1);
    assert!(harness.conductor.session_info().await.unwrap().bound_roles.is_empty());
}

#[tokio::test]
async fn test_render_attach_failure_does_not_fail_session() {
    let handler = Arc::new(RecordingHandler::default());
    let mut harness = Harness::new();
    harness.conductor.set_media_context(
        MediaContext::new()
            .with_remote_sink(Arc::new(RecordingSink::failing()))
            .with_handler(handler.clone()),
    );

    harness.conductor.initiate().await.unwrap();
    harness.next_outbound().await;
    harness
        .factory
        .last_sink()
        .emit(TransportEvent::StreamAdded(remote_stream("remote", &["cam"])));
    harness.wait_for_state(SessionState::Active).await;
    harness.settle().await;

    assert_eq!(handler.active_count(), 1);
    assert!(harness.conductor.session_info().await.unwrap().bound_roles.is_empty());
    harness.assert_quiet().await;
}

#[tokio::test]
async fn test_stream_removed_releases_its_binding() {
    let local = Arc::new(RecordingSink::default());
    let remote = Arc::new(RecordingSink::default());
    let mut harness = Harness::new();
    harness.conductor.set_media_context(
        MediaContext::new()
            .with_video(true)
            .with_local_sink(local.clone())
            .with_remote_sink(remote.clone()),
    );

    harness.conductor.initiate().await.unwrap();
    harness.next_outbound().await;
    let sink = harness.factory.last_sink();
    sink.emit(TransportEvent::StreamAdded(remote_stream("remote", &["cam"])));
    sink.emit(TransportEvent::StreamRemoved {
        stream_id: "remote".to_string(),
    });
    harness.settle().await;

    assert_eq!(remote.entries(), vec!["attach:remote:cam", "detach:remote:cam"]);
    let info = harness.conductor.session_info().await.unwrap();
    assert_eq!(info.bound_roles, vec![RenderRole::Local]);
    assert_eq!(info.remote_stream_id, None);
    assert_eq!(info.state, SessionState::Active);
}

#[tokio::test]
async fn test_replacement_stream_rebinds_remote_renderer() {
    let remote = Arc::new(RecordingSink::default());
    let handler = Arc::new(RecordingHandler::default());
    let mut harness = Harness::new();
    harness.conductor.set_media_context(
        MediaContext::new()
            .with_remote_sink(remote.clone())
            .with_handler(handler.clone()),
    );

    harness.conductor.initiate().await.unwrap();
    harness.next_outbound().await;
    let sink = harness.factory.last_sink();
    sink.emit(TransportEvent::StreamAdded(remote_stream("first", &["a"])));
    sink.emit(TransportEvent::StreamAdded(remote_stream("second", &["b"])));
    sink.emit(TransportEvent::StreamRemoved {
        stream_id: "first".to_string(),
    });
    harness.settle().await;

    assert_eq!(
        remote.entries(),
        vec!["attach:remote:a", "detach:remote:a", "attach:remote:b"]
    );
    // Active is entered once per session
    assert_eq!(handler.active_count(), 1);
    let info = harness.conductor.session_info().await.unwrap();
    assert_eq!(info.remote_stream_id.as_deref(), Some("second"));
    assert_eq!(info.bound_roles, vec![RenderRole::Remote]);
}

#[tokio::test]
async fn test_tracks_announced_one_at_a_time_keep_first_video_track() {
    let remote = Arc::new(RecordingSink::default());
    let handler = Arc::new(RecordingHandler::default());
    let mut harness = Harness::new();
    harness.conductor.set_media_context(
        MediaContext::new()
            .with_remote_sink(remote.clone())
            .with_handler(handler.clone()),
    );

    harness.conductor.initiate().await.unwrap();
    harness.next_outbound().await;
    let sink = harness.factory.last_sink();
    for track in [
        TrackHandle::audio("mic", "remote"),
        TrackHandle::video("cam", "remote"),
        TrackHandle::video("screen", "remote"),
    ] {
        sink.emit(TransportEvent::StreamAdded(RemoteStream::new("remote").with_track(track)));
    }
    harness.settle().await;

    assert_eq!(remote.entries(), vec!["attach:remote:cam"]);
    assert_eq!(handler.active_count(), 1);
    let info = harness.conductor.session_info().await.unwrap();
    assert_eq!(info.remote_stream_id.as_deref(), Some("remote"));
    assert_eq!(info.bound_roles, vec![RenderRole::Remote]);
}

#[tokio::test]
async fn test_handler_can_read_session_when_it_goes_active() {
    let mut harness = Harness::new();
    let handler = ReentrantHandler::new(&harness.conductor, None);
    harness
        .conductor
        .set_media_context(MediaContext::new().with_handler(handler.clone()));

    harness.conductor.initiate().await.unwrap();
    harness.next_outbound().await;
    harness
        .factory
        .last_sink()
        .emit(TransportEvent::StreamAdded(remote_stream("remote", &["cam"])));
    handler.wait_until(|h| !h.snapshots.lock().is_empty()).await;

    let snapshots = handler.snapshots.lock().clone();
    assert_eq!(snapshots.len(), 1);
    let info = snapshots[0].clone().expect("session should be live");
    assert_eq!(info.state, SessionState::Active);
    assert_eq!(info.remote_stream_id.as_deref(), Some("remote"));

    // The event loop keeps running afterwards
    harness.settle().await;
    assert_eq!(harness.conductor.state(), SessionState::Active);
}

#[tokio::test]
async fn test_stop_releases_all_bindings() {
    let local = Arc::new(RecordingSink::default());
    let remote = Arc::new(RecordingSink::default());
    let mut harness = Harness::new();
    harness.conductor.set_media_context(
        MediaContext::new()
            .with_video(true)
            .with_local_sink(local.clone())
            .with_remote_sink(remote.clone()),
    );

    harness.conductor.initiate().await.unwrap();
    harness.next_outbound().await;
    harness
        .factory
        .last_sink()
        .emit(TransportEvent::StreamAdded(remote_stream("remote", &["cam"])));
    harness.settle().await;

    harness.conductor.stop().await;

    assert_eq!(local.entries(), vec!["attach:local:video_track", "detach:local:video_track"]);
    assert_eq!(remote.entries(), vec!["attach:remote:cam", "detach:remote:cam"]);
}
