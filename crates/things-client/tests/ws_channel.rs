//! Message channel and tag-scan session against an in-process WebSocket
//! server.
//!
//! Run with: cargo test -p things-client --test ws_channel

mod common;

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use serde_json::{json, Value};
use things_client::view::TrackCollectionPlayer;
use things_client::{
    AlertBus, AlertKind, ChannelState, MessageChannel, PlayerService, RfidTagService, ApiClient,
};
use things_proto::api::TrackInfo;
use things_proto::protocol::{Event, Topic};

#[derive(Clone, Default)]
struct Mock {
    greeting: Arc<Vec<String>>,
    heard: Arc<Mutex<Vec<Value>>>,
}

async fn ws_app(ws: WebSocketUpgrade, State(mock): State<Mock>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| app_session(socket, mock))
}

async fn app_session(mut socket: WebSocket, mock: Mock) {
    for frame in mock.greeting.iter() {
        if socket.send(Message::Text(frame.clone())).await.is_err() {
            return;
        }
    }
    while let Some(Ok(msg)) = socket.recv().await {
        if let Message::Text(text) = msg {
            if let Ok(value) = serde_json::from_str(&text) {
                mock.heard.lock().push(value);
            }
        }
    }
}

async fn ws_hangup(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(|mut socket| async move {
        let progress = r#"{"type":"player.playback_progress","data":3.0625}"#.to_string();
        let _ = socket.send(Message::Text(progress)).await;
        let _ = socket.send(Message::Close(None)).await;
    })
}

async fn ws_rfid(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(|mut socket| async move {
        let frames = [
            json!({"type": "hello"}),
            json!({"type": "tag_read", "tag": "04aa", "previous_association": null}),
            json!({"type": "tag_read", "tag": "04bb", "previous_association": "Blue"}),
        ];
        for frame in frames {
            if socket.send(Message::Text(frame.to_string())).await.is_err() {
                return;
            }
        }
        while let Some(Ok(_)) = socket.recv().await {}
    })
}

async fn start(greeting: Vec<Value>) -> (String, Mock) {
    let mock = Mock {
        greeting: Arc::new(greeting.iter().map(Value::to_string).collect()),
        heard: Arc::default(),
    };
    let app = Router::new()
        .route("/ws/app", get(ws_app))
        .route("/ws/hangup", get(ws_hangup))
        .route("/ws/rfid", get(ws_rfid))
        .with_state(mock.clone());
    let addr = common::serve(app).await;
    (format!("ws://{}", addr), mock)
}

fn track(link: &str) -> TrackInfo {
    TrackInfo {
        name: "t".into(),
        link: link.into(),
    }
}

#[tokio::test]
async fn test_live_state_replays_and_commands_reach_server() {
    let (base, mock) = start(vec![
        json!({"type": "player.state", "data": {"is_repeat_on": false, "is_shuffle_on": true, "is_playing": true}}),
        json!({"type": "player.current_track",
               "data": {"name": "One", "artists": "Ann", "link": "spotify:track:1", "duration": 200000}}),
    ])
    .await;

    let channel = MessageChannel::new(AlertBus::new());
    channel.connect(&format!("{}/ws/app", base)).await.unwrap();
    assert_eq!(channel.state(), ChannelState::Connected);
    common::eventually("current track", || channel.latest(Topic::CurrentTrack).is_some()).await;

    let player = PlayerService::new(Arc::clone(&channel));
    let shuffle = Arc::new(Mutex::new(None));
    let s = Arc::clone(&shuffle);
    let _sub = player.subscribe_player_state(move |st| *s.lock() = Some(st.is_shuffle_on));
    assert_eq!(*shuffle.lock(), Some(true));

    let list = TrackCollectionPlayer::new(player.clone());
    list.play("spotify:album:a", &track("spotify:track:1"));
    list.play("spotify:album:a", &track("spotify:track:2"));
    player.seek(12);

    common::eventually("three commands", || mock.heard.lock().len() == 3).await;
    assert_eq!(
        *mock.heard.lock(),
        vec![
            json!({"type": "player.play"}),
            json!({"type": "player.play_track",
                   "data": {"resource_link": "spotify:album:a", "track_link": "spotify:track:2"}}),
            json!({"type": "player.seek", "data": 12}),
        ]
    );
    channel.disconnect();
    assert_eq!(channel.state(), ChannelState::Closed);
}

#[tokio::test]
async fn test_server_hangup_leaves_channel_closed() {
    let (base, _mock) = start(Vec::new()).await;
    let alerts = AlertBus::new();
    let warnings = Arc::new(Mutex::new(Vec::new()));
    let w = Arc::clone(&warnings);
    let _alerts = alerts.subscribe(move |a| w.lock().push(a.kind));

    let channel = MessageChannel::new(alerts);
    channel.connect(&format!("{}/ws/hangup", base)).await.unwrap();
    common::eventually("close", || channel.state() == ChannelState::Closed).await;
    assert_eq!(channel.latest(Topic::PlaybackProgress), Some(Event::PlaybackProgress(3.0625)));

    PlayerService::new(Arc::clone(&channel)).play();
    assert_eq!(*warnings.lock(), vec![AlertKind::Warning]);
}

#[tokio::test]
async fn test_connect_failure_raises_error_alert() {
    let alerts = AlertBus::new();
    let raised = Arc::new(Mutex::new(Vec::new()));
    let r = Arc::clone(&raised);
    let _alerts = alerts.subscribe(move |a| r.lock().push((a.kind, a.message.clone())));

    let channel = MessageChannel::new(alerts);
    assert!(channel.connect("ws://127.0.0.1:1/ws/app").await.is_err());
    assert_eq!(channel.state(), ChannelState::Errored);

    let raised = raised.lock();
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0].0, AlertKind::Error);
    assert!(raised[0].1.starts_with("WebSocket error: "));
}

#[tokio::test]
async fn test_scan_session_reports_tag_reads() {
    let (base, _mock) = start(Vec::new()).await;
    let channel = MessageChannel::new(AlertBus::new());
    let rfid = RfidTagService::new(channel, ApiClient::new("http://127.0.0.1:1"));

    let mut session = rfid.scan_session(&format!("{}/ws/rfid", base)).await.unwrap();
    let first = common::within(session.next_read()).await.unwrap();
    assert_eq!(first.tag, "04aa");
    assert_eq!(first.previous_association, None);

    let second = common::within(session.next_read()).await.unwrap();
    assert_eq!(second.tag, "04bb");
    assert_eq!(second.previous_association.as_deref(), Some("Blue"));

    session.close().await;
    assert!(!session.is_open());
    assert!(session.next_read().await.is_none());
}
