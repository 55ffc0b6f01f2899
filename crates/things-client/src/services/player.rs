use std::sync::Arc;

use things_proto::protocol::{Command, CurrentTrack, Event, PlayerState, ServerError, Topic};

use super::narrow;
use crate::alert::AlertBus;
use crate::channel::{MessageChannel, Replay};
use crate::subscribers::Subscription;

fn player_state(event: &Event) -> Option<&PlayerState> {
    match event {
        Event::PlayerState(state) => Some(state),
        _ => None,
    }
}

fn server_error(event: &Event) -> Option<&ServerError> {
    match event {
        Event::Error(error) => Some(error),
        _ => None,
    }
}

/// Remote control of the server's player.
#[derive(Clone)]
pub struct PlayerService {
    channel: Arc<MessageChannel>,
}

impl PlayerService {
    pub fn new(channel: Arc<MessageChannel>) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &Arc<MessageChannel> {
        &self.channel
    }

    // ── commands ──────────────────────────────────────────────────────────────

    /// Play `track_link` in the context of `resource_link` (album, playlist
    /// or the track itself).
    pub fn play_track(&self, resource_link: &str, track_link: &str) {
        self.channel.send(&Command::PlayTrack {
            resource_link: resource_link.to_string(),
            track_link: track_link.to_string(),
        });
    }

    pub fn play(&self) {
        self.channel.send(&Command::Play);
    }

    pub fn pause(&self) {
        self.channel.send(&Command::Pause);
    }

    pub fn next_track(&self) {
        self.channel.send(&Command::NextTrack);
    }

    pub fn previous_track(&self) {
        self.channel.send(&Command::PreviousTrack);
    }

    pub fn set_repeat(&self, on: bool) {
        self.channel.send(&Command::SetRepeat(on));
    }

    pub fn set_shuffle(&self, on: bool) {
        self.channel.send(&Command::SetShuffle(on));
    }

    /// Seek to `offset` seconds into the current track.
    pub fn seek(&self, offset: u32) {
        self.channel.send(&Command::Seek(offset));
    }

    // ── subscriptions ─────────────────────────────────────────────────────────

    pub fn subscribe_player_state<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&PlayerState) + Send + Sync + 'static,
    {
        self.channel
            .subscribe(Topic::PlayerState, Replay::Latest, narrow(player_state, handler))
    }

    /// `None` when nothing is loaded.
    pub fn subscribe_current_track<F>(&self, handler: F) -> Subscription
    where
        F: Fn(Option<&CurrentTrack>) + Send + Sync + 'static,
    {
        self.channel
            .subscribe(Topic::CurrentTrack, Replay::Latest, move |event: &Event| {
                if let Event::CurrentTrack(track) = event {
                    handler(track.as_ref())
                }
            })
    }

    /// Seconds into the current track, with the fraction the server reports.
    pub fn subscribe_playback_progress<F>(&self, handler: F) -> Subscription
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.channel
            .subscribe(Topic::PlaybackProgress, Replay::Latest, move |event: &Event| {
                if let Event::PlaybackProgress(seconds) = event {
                    handler(*seconds)
                }
            })
    }

    pub fn subscribe_queue_changed<F>(&self, handler: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.channel
            .subscribe(Topic::QueueModified, Replay::Skip, move |_: &Event| handler())
    }

    pub fn subscribe_error<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ServerError) + Send + Sync + 'static,
    {
        self.channel
            .subscribe(Topic::Error, Replay::Skip, narrow(server_error, handler))
    }

    /// Forward server-reported errors to `alerts`.
    pub fn report_errors(&self, alerts: &AlertBus) -> Subscription {
        let alerts = alerts.clone();
        self.subscribe_error(move |error| {
            alerts.error(format!("Player error: {}", error.message()));
        })
    }

    /// Run `handler` once with the last known player state, if any.
    pub fn update_player_state<F: FnOnce(&PlayerState)>(&self, handler: F) {
        self.channel.replay_once(Topic::PlayerState, |event| {
            if let Some(state) = player_state(event) {
                handler(state)
            }
        });
    }

    /// Run `handler` once with the last known current track, if one was ever
    /// announced.
    pub fn update_current_track<F: FnOnce(Option<&CurrentTrack>)>(&self, handler: F) {
        self.channel.replay_once(Topic::CurrentTrack, |event| {
            if let Event::CurrentTrack(track) = event {
                handler(track.as_ref())
            }
        });
    }
}
