/// Message channel: one persistent socket to `/ws/app` with typed
/// publish/subscribe and a last-value cache per topic.
///
/// ```text
///   MessageChannel::connect(url)
///         │
///         ├── writer_task   ← outgoing frames via mpsc, written to the socket
///         └── reader_task   ← text frames from the socket
///                                └── receive() → cache → handlers (subscription order)
/// ```
///
/// The socket is only one possible [`Transport`]; `attach` accepts any, which
/// is how tests drive a channel without a server.
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use things_proto::protocol::{Command, Envelope, Event, ProtocolError, Topic};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

use crate::alert::AlertBus;
use crate::subscribers::{Registry, Subscription, Unsubscribe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closed,
    Errored,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Connecting => "connecting",
            ChannelState::Connected => "connected",
            ChannelState::Closed => "closed",
            ChannelState::Errored => "errored",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("channel is {0}")]
    NotConnected(ChannelState),
    #[error("transport closed")]
    TransportClosed,
    #[error("connection superseded by a newer connect")]
    Superseded,
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Outgoing half of a connection.
pub trait Transport: Send + Sync {
    fn send_text(&self, frame: String) -> Result<(), ChannelError>;
}

impl Transport for mpsc::UnboundedSender<String> {
    fn send_text(&self, frame: String) -> Result<(), ChannelError> {
        self.send(frame).map_err(|_| ChannelError::TransportClosed)
    }
}

/// Whether a new subscriber first receives the cached value of its topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replay {
    Latest,
    Skip,
}

struct Cached {
    seq: u64,
    event: Arc<Event>,
}

struct Inner {
    state: ChannelState,
    generation: u64,
    transport: Option<Box<dyn Transport>>,
    next_seq: u64,
    cache: HashMap<Topic, Cached>,
    registry: Registry<Topic, Event>,
}

pub struct MessageChannel {
    inner: Mutex<Inner>,
    alerts: AlertBus,
}

impl MessageChannel {
    pub fn new(alerts: AlertBus) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                state: ChannelState::Disconnected,
                generation: 0,
                transport: None,
                next_seq: 0,
                cache: HashMap::new(),
                registry: Registry::new(),
            }),
            alerts,
        })
    }

    pub fn state(&self) -> ChannelState {
        self.inner.lock().state
    }

    pub fn alerts(&self) -> &AlertBus {
        &self.alerts
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().registry.len()
    }

    // ── connection lifecycle ──────────────────────────────────────────────────

    /// Open the WebSocket and start the reader/writer tasks.  There is no
    /// automatic reconnect: once the socket closes the channel stays inert
    /// until `connect` is called again.
    pub async fn connect(self: &Arc<Self>, url: &str) -> Result<(), ChannelError> {
        let generation = self.begin();
        info!("channel: connecting to {}", url);

        let (stream, _response) = match tokio_tungstenite::connect_async(url).await {
            Ok(ok) => ok,
            Err(e) => {
                self.fail(generation, &e.to_string());
                return Err(e.into());
            }
        };
        let (sink, source) = stream.split();
        let (tx, rx) = mpsc::unbounded_channel::<String>();

        if !self.install(generation, Box::new(tx)) {
            return Err(ChannelError::Superseded);
        }
        tokio::spawn(writer_task(sink, rx));
        tokio::spawn(reader_task(source, Arc::downgrade(self), generation));
        Ok(())
    }

    /// Use an already-open transport.  Returns the connection generation to
    /// pass to [`close`](Self::close) / [`fail`](Self::fail).
    pub fn attach(&self, transport: Box<dyn Transport>) -> u64 {
        let generation = self.begin();
        self.install(generation, transport);
        generation
    }

    /// Close the current connection from our side.  A channel that never
    /// connected stays `Disconnected`.
    pub fn disconnect(&self) {
        let generation = {
            let inner = self.inner.lock();
            if inner.state == ChannelState::Disconnected {
                return;
            }
            inner.generation
        };
        self.close(generation);
    }

    /// The transport of `generation` ended normally.
    pub fn close(&self, generation: u64) {
        let transport = {
            let mut inner = self.inner.lock();
            if inner.generation != generation || inner.state == ChannelState::Errored {
                return;
            }
            inner.state = ChannelState::Closed;
            inner.transport.take()
        };
        drop(transport);
        info!(generation, "channel: closed");
    }

    /// The transport of `generation` failed.  Surfaced on the alert bus.
    pub fn fail(&self, generation: u64, reason: &str) {
        let transport = {
            let mut inner = self.inner.lock();
            if inner.generation != generation || inner.state == ChannelState::Closed {
                return;
            }
            inner.state = ChannelState::Errored;
            inner.transport.take()
        };
        drop(transport);
        warn!(generation, "channel: transport error: {}", reason);
        self.alerts.error(format!("WebSocket error: {}", reason));
    }

    fn is_live(&self, generation: u64) -> bool {
        let inner = self.inner.lock();
        inner.generation == generation && inner.state == ChannelState::Connected
    }

    fn begin(&self) -> u64 {
        let (generation, previous) = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.state = ChannelState::Connecting;
            (inner.generation, inner.transport.take())
        };
        drop(previous);
        generation
    }

    fn install(&self, generation: u64, transport: Box<dyn Transport>) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            debug!(generation, "channel: dropping superseded transport");
            return false;
        }
        inner.transport = Some(transport);
        inner.state = ChannelState::Connected;
        info!(generation, "channel: connected");
        true
    }

    // ── outgoing ──────────────────────────────────────────────────────────────

    /// Fire-and-forget.  Frames sent while not connected are dropped and
    /// reported as a warning alert.
    pub fn send(&self, command: &Command) {
        match command.encode() {
            Ok(frame) => self.send_frame(command.kind(), frame),
            Err(e) => warn!("channel: failed to encode {}: {}", command.kind(), e),
        }
    }

    pub fn send_envelope(&self, envelope: &Envelope) {
        match envelope.encode() {
            Ok(frame) => self.send_frame(&envelope.kind, frame),
            Err(e) => warn!("channel: failed to encode {}: {}", envelope.kind, e),
        }
    }

    fn send_frame(&self, kind: &str, frame: String) {
        let result = {
            let inner = self.inner.lock();
            match (inner.state, inner.transport.as_ref()) {
                (ChannelState::Connected, Some(transport)) => transport.send_text(frame),
                (state, _) => Err(ChannelError::NotConnected(state)),
            }
        };
        match result {
            Ok(()) => debug!("channel: sent {}", kind),
            Err(e) => {
                warn!("channel: dropped outgoing {}: {}", kind, e);
                self.alerts
                    .warning(format!("Message '{}' was not sent: {}", kind, e));
            }
        }
    }

    // ── incoming ──────────────────────────────────────────────────────────────

    /// Handle one text frame from the server.
    pub fn receive(&self, text: &str) {
        match Event::decode(text) {
            Ok(event) => self.dispatch(event),
            Err(ProtocolError::UnknownTopic(topic)) => {
                debug!("channel: ignoring unknown topic {}", topic)
            }
            Err(e) => warn!("channel: dropping inbound frame: {}", e),
        }
    }

    /// Update the cache, then run the topic's handlers in subscription order.
    pub fn dispatch(&self, event: Event) {
        let topic = event.topic();
        let event = Arc::new(event);

        let (seq, targets) = {
            let mut inner = self.inner.lock();
            inner.next_seq += 1;
            let seq = inner.next_seq;
            inner.cache.insert(
                topic,
                Cached {
                    seq,
                    event: Arc::clone(&event),
                },
            );
            (seq, inner.registry.matching(&topic))
        };
        debug!(seq, handlers = targets.len(), "channel: dispatch {}", topic);

        for entry in targets {
            // Skip handlers removed earlier in this pass.
            if !self.inner.lock().registry.contains(entry.id) {
                continue;
            }
            entry.deliver(seq, &event);
        }
    }

    // ── subscriptions ─────────────────────────────────────────────────────────

    pub fn subscribe<F>(self: &Arc<Self>, topic: Topic, replay: Replay, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let (entry, cached) = {
            let mut inner = self.inner.lock();
            let entry = inner.registry.insert(topic, Arc::new(handler));
            let cached = match replay {
                Replay::Latest => inner
                    .cache
                    .get(&topic)
                    .map(|c| (c.seq, Arc::clone(&c.event))),
                Replay::Skip => None,
            };
            (entry, cached)
        };
        debug!(id = entry.id, ?replay, "channel: subscribe {}", topic);

        let owner = Arc::downgrade(self) as Weak<dyn Unsubscribe>;
        let subscription = Subscription::new(entry.id, owner);
        if let Some((seq, event)) = cached {
            entry.deliver(seq, &event);
        }
        subscription
    }

    /// Run `handler` once with the cached value, if any.  Registers nothing.
    pub fn replay_once<F>(&self, topic: Topic, handler: F)
    where
        F: FnOnce(&Event),
    {
        let cached = self.latest_arc(topic);
        if let Some(event) = cached {
            handler(&event);
        }
    }

    pub fn latest(&self, topic: Topic) -> Option<Event> {
        self.latest_arc(topic).map(|e| (*e).clone())
    }

    fn latest_arc(&self, topic: Topic) -> Option<Arc<Event>> {
        self.inner
            .lock()
            .cache
            .get(&topic)
            .map(|c| Arc::clone(&c.event))
    }
}

impl Unsubscribe for MessageChannel {
    fn unsubscribe(&self, id: u64) {
        let removed = self.inner.lock().registry.remove(id);
        if removed.is_some() {
            debug!(id, "channel: unsubscribed");
        }
        drop(removed);
    }
}

// ── socket tasks ──────────────────────────────────────────────────────────────

async fn reader_task<S>(mut source: S, channel: Weak<MessageChannel>, generation: u64)
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = source.next().await {
        let Some(channel) = channel.upgrade() else {
            debug!("channel reader: channel dropped");
            return;
        };
        if !channel.is_live(generation) {
            debug!(generation, "channel reader: connection no longer current");
            return;
        }
        match frame {
            Ok(Message::Text(text)) => channel.receive(&text),
            Ok(Message::Close(reason)) => {
                debug!("channel reader: close frame {:?}", reason);
                break;
            }
            Ok(Message::Binary(data)) => {
                debug!("channel reader: ignoring {} byte binary frame", data.len())
            }
            Ok(_) => {}
            Err(e) => {
                channel.fail(generation, &e.to_string());
                return;
            }
        }
    }
    if let Some(channel) = channel.upgrade() {
        channel.close(generation);
    }
}

async fn writer_task<S>(mut sink: S, mut rx: mpsc::UnboundedReceiver<String>)
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    while let Some(frame) = rx.recv().await {
        debug!("channel writer: send {}", frame);
        if let Err(e) = sink.send(Message::Text(frame)).await {
            warn!("channel writer: write error: {}", e);
            break;
        }
    }
    let _ = sink.close().await;
    debug!("channel writer: task exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use things_proto::protocol::PlayerState;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Transport for Recorder {
        fn send_text(&self, frame: String) -> Result<(), ChannelError> {
            self.0.lock().push(frame);
            Ok(())
        }
    }

    fn playing(is_playing: bool) -> Event {
        Event::PlayerState(PlayerState {
            is_playing,
            ..Default::default()
        })
    }

    fn record(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> impl Fn(&Event) + Send + Sync {
        let log = Arc::clone(log);
        move |e: &Event| log.lock().push(format!("{}:{:?}", tag, e))
    }

    #[test]
    fn test_replay_latest_runs_before_live_messages() {
        let channel = MessageChannel::new(AlertBus::new());
        channel.dispatch(playing(false));
        channel.dispatch(playing(true));

        let log = Arc::new(Mutex::new(Vec::new()));
        let _sub = channel.subscribe(Topic::PlayerState, Replay::Latest, record(&log, "a"));
        assert_eq!(log.lock().len(), 1, "replay must be synchronous");
        channel.dispatch(playing(false));

        let log = log.lock();
        assert_eq!(log[0], format!("a:{:?}", playing(true)));
        assert_eq!(log[1], format!("a:{:?}", playing(false)));
    }

    #[test]
    fn test_replay_without_cached_value_waits_for_live() {
        let channel = MessageChannel::new(AlertBus::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let _sub = channel.subscribe(Topic::CurrentTrack, Replay::Latest, record(&log, "t"));
        channel.dispatch(playing(true));
        assert!(log.lock().is_empty());
        channel.dispatch(Event::CurrentTrack(None));
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_skip_replay_only_sees_live() {
        let channel = MessageChannel::new(AlertBus::new());
        channel.dispatch(Event::QueueModified);
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _sub = channel.subscribe(Topic::QueueModified, Replay::Skip, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        channel.dispatch(Event::QueueModified);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handlers_fire_in_subscription_order() {
        let channel = MessageChannel::new(AlertBus::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = channel.subscribe(Topic::PlaybackProgress, Replay::Skip, record(&log, "a"));
        let _b = channel.subscribe(Topic::PlaybackProgress, Replay::Skip, record(&log, "b"));
        let _c = channel.subscribe(Topic::PlaybackProgress, Replay::Skip, record(&log, "c"));
        channel.receive(r#"{"type":"player.playback_progress","data":12}"#);
        let tags: Vec<String> = log.lock().iter().map(|l| l[..1].to_string()).collect();
        assert_eq!(tags, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_handler_unsubscribing_itself_mid_dispatch() {
        let channel = MessageChannel::new(AlertBus::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let h = Arc::clone(&hits);
        let s = Arc::clone(&slot);
        let sub = channel.subscribe(Topic::PlaybackProgress, Replay::Skip, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            if let Some(me) = s.lock().take() {
                me.unsubscribe();
            }
        });
        *slot.lock() = Some(sub);

        channel.dispatch(Event::PlaybackProgress(1.0));
        channel.dispatch(Event::PlaybackProgress(2.0));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_handler_removing_a_later_handler_in_same_pass() {
        let channel = MessageChannel::new(AlertBus::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let v = Arc::clone(&victim);
        let first_log = Arc::clone(&log);
        let _first = channel.subscribe(Topic::PlaybackProgress, Replay::Skip, move |_| {
            first_log.lock().push("first".to_string());
            if let Some(sub) = v.lock().take() {
                sub.unsubscribe();
            }
        });
        let second = channel.subscribe(Topic::PlaybackProgress, Replay::Skip, record(&log, "second"));
        *victim.lock() = Some(second);

        channel.dispatch(Event::PlaybackProgress(3.0));
        assert_eq!(*log.lock(), vec!["first".to_string()]);
    }

    #[test]
    fn test_handler_subscribing_during_dispatch_waits_for_next_pass() {
        let channel = MessageChannel::new(AlertBus::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let added: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&channel);
        let h = Arc::clone(&hits);
        let a = Arc::clone(&added);
        let _outer = channel.subscribe(Topic::QueueModified, Replay::Skip, move |_| {
            if let Some(channel) = weak.upgrade() {
                let h = Arc::clone(&h);
                let sub = channel.subscribe(Topic::QueueModified, Replay::Skip, move |_| {
                    h.fetch_add(1, Ordering::SeqCst);
                });
                a.lock().push(sub);
            }
        });

        channel.dispatch(Event::QueueModified);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        channel.dispatch(Event::QueueModified);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_after_channel_dropped() {
        let channel = MessageChannel::new(AlertBus::new());
        let sub = channel.subscribe(Topic::Error, Replay::Skip, |_| {});
        drop(channel);
        sub.unsubscribe();
        sub.unsubscribe();
    }

    #[test]
    fn test_replay_once_does_not_register() {
        let channel = MessageChannel::new(AlertBus::new());
        let mut seen = None;
        channel.replay_once(Topic::PlayerState, |e| seen = Some(e.clone()));
        assert!(seen.is_none());

        channel.dispatch(playing(true));
        channel.replay_once(Topic::PlayerState, |e| seen = Some(e.clone()));
        assert_eq!(seen, Some(playing(true)));
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_malformed_payload_leaves_cache_untouched() {
        let channel = MessageChannel::new(AlertBus::new());
        channel.receive(r#"{"type":"spotify.credentials_stored","data":true}"#);
        channel.receive(r#"{"type":"spotify.credentials_stored","data":"yes"}"#);
        channel.receive(r#"{"type":"player.volume","data":3}"#);
        channel.receive("not json");
        assert_eq!(
            channel.latest(Topic::CredentialsStored),
            Some(Event::CredentialsStored(true))
        );
    }

    #[test]
    fn test_every_server_frame_is_cached() {
        let channel = MessageChannel::new(AlertBus::new());
        let frames = [
            r#"{"type":"player.state","data":{"is_repeat_on":false,"is_shuffle_on":true,"is_playing":true}}"#,
            r#"{"type":"player.current_track","data":null}"#,
            r#"{"type":"player.playback_progress","data":12.3765}"#,
            r#"{"type":"player.queue_modified"}"#,
            r#"{"type":"spotify.login_state","data":{"is_logged_in":true,"login_error":null,"current_user":"ada"}}"#,
            r#"{"type":"spotify.credentials_stored","data":false}"#,
            r#"{"type":"hardware.rfid_reader","data":[{"name":"Phidget RFID 4-output","serial_no":123456,"version":206}]}"#,
            r#"{"type":"error","data":"Unknown message type player.volume"}"#,
        ];
        for frame in frames {
            channel.receive(frame);
        }
        for topic in Topic::ALL {
            assert!(channel.latest(topic).is_some(), "{} was not cached", topic);
        }
        assert_eq!(
            channel.latest(Topic::PlaybackProgress),
            Some(Event::PlaybackProgress(12.3765))
        );
    }

    #[test]
    fn test_disconnect_before_connect_is_a_no_op() {
        let channel = MessageChannel::new(AlertBus::new());
        channel.disconnect();
        assert_eq!(channel.state(), ChannelState::Disconnected);

        channel.attach(Box::new(Recorder::default()));
        channel.disconnect();
        assert_eq!(channel.state(), ChannelState::Closed);
    }

    #[test]
    fn test_send_requires_connection() {
        let alerts = AlertBus::new();
        let warnings = Arc::new(AtomicUsize::new(0));
        let w = Arc::clone(&warnings);
        let _alerts_sub = alerts.subscribe(move |a| {
            if a.kind == crate::alert::AlertKind::Warning {
                w.fetch_add(1, Ordering::SeqCst);
            }
        });
        let channel = MessageChannel::new(alerts);
        channel.send(&Command::Play);
        assert_eq!(warnings.load(Ordering::SeqCst), 1);

        let recorder = Recorder::default();
        let generation = channel.attach(Box::new(recorder.clone()));
        assert_eq!(channel.state(), ChannelState::Connected);
        channel.send(&Command::SetRepeat(true));
        assert_eq!(
            *recorder.0.lock(),
            vec![r#"{"type":"player.set_repeat","data":true}"#.to_string()]
        );

        channel.close(generation);
        assert_eq!(channel.state(), ChannelState::Closed);
        channel.send(&Command::Pause);
        assert_eq!(recorder.0.lock().len(), 1);
        assert_eq!(warnings.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stale_generation_does_not_close_new_connection() {
        let channel = MessageChannel::new(AlertBus::new());
        let old = channel.attach(Box::new(Recorder::default()));
        let new = channel.attach(Box::new(Recorder::default()));
        assert_ne!(old, new);
        channel.close(old);
        channel.fail(old, "late");
        assert_eq!(channel.state(), ChannelState::Connected);
        assert!(!channel.is_live(old));
        assert!(channel.is_live(new));
        channel.fail(new, "boom");
        assert_eq!(channel.state(), ChannelState::Errored);
        channel.close(new);
        assert_eq!(channel.state(), ChannelState::Errored);
    }

    #[test]
    fn test_transport_failure_raises_error_alert() {
        let alerts = AlertBus::new();
        let messages = Arc::new(Mutex::new(Vec::new()));
        let m = Arc::clone(&messages);
        let _sub = alerts.subscribe(move |a| m.lock().push(a.message.clone()));
        let channel = MessageChannel::new(alerts);
        let generation = channel.attach(Box::new(Recorder::default()));
        channel.fail(generation, "connection reset");
        assert_eq!(*messages.lock(), vec!["WebSocket error: connection reset".to_string()]);
    }
}
