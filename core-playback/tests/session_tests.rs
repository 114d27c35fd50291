//! Session bridge wiring: transport commands in, observers out.

mod common;

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{NotificationSink, NowPlayingCard};
use common::*;
use core_playback::{
    EventBusObserver, NotificationPresenter, PlayExtras, PlaybackError, PlaybackState,
    SessionBridge, TransportCommand,
};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use mockall::mock;
use std::sync::Arc;

mock! {
    pub Sink {}

    #[async_trait]
    impl NotificationSink for Sink {
        async fn show(&self, card: NowPlayingCard, foreground: bool) -> BridgeResult<()>;
        async fn dismiss(&self) -> BridgeResult<()>;
    }
}

fn bridge(h: &Harness) -> SessionBridge {
    SessionBridge::new(h.handle.clone(), h.publisher.clone())
}

#[tokio::test]
async fn test_transport_commands_drive_controller() {
    let h = spawn(&["a", "b", "c"]);
    let session = bridge(&h);

    session
        .dispatch(TransportCommand::PlayFromMediaId {
            media_id: "b".to_string(),
            extras: PlayExtras {
                queue_position: Some(1),
                is_new_playlist: None,
            },
        })
        .await
        .unwrap();
    assert!(session.is_active());

    session.dispatch(TransportCommand::Pause).await.unwrap();
    session
        .dispatch(TransportCommand::SeekTo { position_ms: 7_000 })
        .await
        .unwrap();
    session.dispatch(TransportCommand::Play).await.unwrap();
    session.dispatch(TransportCommand::SkipNext).await.unwrap();
    session.dispatch(TransportCommand::SkipPrevious).await.unwrap();
    session
        .dispatch(TransportCommand::AddQueueItem { item: track("d") })
        .await
        .unwrap();
    session
        .dispatch(TransportCommand::RemoveQueueItem {
            media_id: "a".to_string(),
        })
        .await
        .unwrap();
    session
        .dispatch(TransportCommand::SetVolume { level: 0.5 })
        .await
        .unwrap();

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.prepared.as_ref().unwrap().media_id, "b");
    assert_eq!(snapshot.queue.items.len(), 3);
    assert_eq!(snapshot.volume, 0.5);
    assert_eq!(
        h.engine.loads(),
        vec![source("b"), source("c"), source("b")]
    );

    session.dispatch(TransportCommand::Stop).await.unwrap();
    assert!(!session.is_active());
    assert_eq!(
        session.last_status().unwrap().state,
        PlaybackState::Stopped
    );
}

#[tokio::test]
async fn test_transport_errors_reach_caller() {
    let h = spawn(&[]);
    let session = bridge(&h);

    assert!(matches!(
        session.dispatch(TransportCommand::SkipNext).await,
        Err(PlaybackError::EmptyQueue)
    ));
    assert!(matches!(
        session
            .dispatch(TransportCommand::PlayFromMediaId {
                media_id: "nope".to_string(),
                extras: PlayExtras::default(),
            })
            .await,
        Err(PlaybackError::MediaNotFound(_))
    ));
}

#[tokio::test]
async fn test_late_subscriber_sees_current_status() {
    let h = spawn(&["a"]);
    let session = bridge(&h);
    h.handle.play().await.unwrap();

    let late = Arc::new(RecordingObserver::default());
    let id = session.subscribe(late.clone());

    assert_eq!(late.states(), vec![PlaybackState::Playing]);
    assert_eq!(*late.metadata.lock(), vec![Some("a".to_string())]);
    assert_eq!(*late.active.lock(), vec![true]);

    assert!(session.unsubscribe(id));
    h.handle.pause().await.unwrap();
    assert_eq!(late.states(), vec![PlaybackState::Playing]);
}

#[tokio::test]
async fn test_notification_card_follows_controller() {
    let mut sink = MockSink::new();
    let mut sequence = mockall::Sequence::new();
    sink.expect_show()
        .withf(|card, foreground| card.media_id == "a" && card.is_playing && *foreground)
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_, _| Ok(()));
    sink.expect_show()
        .withf(|card, foreground| {
            card.media_id == "a"
                && !card.is_playing
                && !*foreground
                && card.controls.can_play
                && !card.controls.can_pause
        })
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_, _| Ok(()));
    sink.expect_dismiss()
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|| Ok(()));

    let h = spawn(&["a"]);
    let (presenter, presenter_task) = NotificationPresenter::spawn(Arc::new(sink));
    let id = h.publisher.subscribe(presenter);

    h.handle.play().await.unwrap();
    h.handle.pause().await.unwrap();
    h.handle.stop().await.unwrap();

    h.publisher.unsubscribe(id);
    presenter_task.await.unwrap();
}

#[tokio::test]
async fn test_event_bus_observer_reports_lifecycle() {
    let h = spawn(&["a", "b"]);
    let bus = EventBus::new(64);
    let mut events = bus
        .stream()
        .filter(|event| !matches!(event, CoreEvent::Playback(PlaybackEvent::PositionChanged { .. })));
    h.publisher.subscribe(Arc::new(EventBusObserver::new(bus)));

    h.handle.play().await.unwrap();
    h.engine.emit(bridge_traits::EngineEvent::Ended);
    h.handle.snapshot().await.unwrap();

    let mut seen = Vec::new();
    while let Some(Ok(event)) = events.try_recv() {
        seen.push(event);
    }

    let completed = seen
        .iter()
        .position(|event| matches!(event, CoreEvent::Playback(PlaybackEvent::Completed { media_id }) if media_id == "a"))
        .expect("completion event");
    let started_b = seen
        .iter()
        .position(|event| matches!(event, CoreEvent::Playback(PlaybackEvent::Started { media_id, .. }) if media_id == "b"))
        .expect("second start");
    assert!(completed < started_b);
    assert!(matches!(
        seen[0],
        CoreEvent::Playback(PlaybackEvent::MediaChanged { .. })
    ));
}
