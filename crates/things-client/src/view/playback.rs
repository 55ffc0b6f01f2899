use std::sync::Arc;

use parking_lot::Mutex;
use things_proto::api::Playable;
use things_proto::protocol::{CurrentTrack, PlayerState};

use crate::services::PlayerService;
use crate::subscribers::Subscription;

/// Snapshot of what a track list needs to decide which button to draw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub current_track_link: Option<String>,
    pub focused_link: Option<String>,
}

impl PlaybackState {
    fn is_focused(&self, link: &str) -> bool {
        self.focused_link.as_deref() == Some(link)
    }

    fn is_current(&self, link: &str) -> bool {
        self.current_track_link.as_deref() == Some(link)
    }

    pub fn show_play_button<T: Playable + ?Sized>(&self, track: &T) -> bool {
        let link = track.link();
        self.is_focused(link) && track.is_available() && (!self.is_current(link) || !self.is_playing)
    }

    pub fn show_pause_button<T: Playable + ?Sized>(&self, track: &T) -> bool {
        let link = track.link();
        self.is_focused(link) && self.is_current(link) && self.is_playing
    }

    pub fn show_playing_indicator<T: Playable + ?Sized>(&self, track: &T) -> bool {
        let link = track.link();
        !self.is_focused(link) && self.is_current(link)
    }

    fn apply_track(&mut self, track: Option<&CurrentTrack>) {
        self.current_track_link = track.map(|t| t.link.clone());
    }

    fn apply_player(&mut self, state: &PlayerState) {
        self.is_playing = state.is_playing;
    }
}

/// Playback helper for any list of playable tracks (album, playlist, search
/// results, queue).  Owns two subscriptions; both end on `destroy` or drop.
pub struct TrackCollectionPlayer {
    player: PlayerService,
    state: Arc<Mutex<PlaybackState>>,
    subscriptions: Vec<Subscription>,
}

impl TrackCollectionPlayer {
    pub fn new(player: PlayerService) -> Self {
        let state = Arc::new(Mutex::new(PlaybackState::default()));

        let s = Arc::clone(&state);
        let current = player.subscribe_current_track(move |track| s.lock().apply_track(track));
        let s = Arc::clone(&state);
        let playing = player.subscribe_player_state(move |st| s.lock().apply_player(st));

        Self {
            player,
            state,
            subscriptions: vec![current, playing],
        }
    }

    /// Resume if `track` is already the current one, otherwise start it in
    /// the context of `collection_link`.
    pub fn play<T: Playable + ?Sized>(&self, collection_link: &str, track: &T) {
        let is_current = self.state.lock().is_current(track.link());
        if is_current {
            self.player.play();
        } else {
            self.player.play_track(collection_link, track.link());
        }
    }

    pub fn pause(&self) {
        self.player.pause();
    }

    pub fn focus<T: Playable + ?Sized>(&self, track: &T) {
        self.state.lock().focused_link = Some(track.link().to_string());
    }

    pub fn unfocus(&self) {
        self.state.lock().focused_link = None;
    }

    pub fn state(&self) -> PlaybackState {
        self.state.lock().clone()
    }

    pub fn show_play_button<T: Playable + ?Sized>(&self, track: &T) -> bool {
        self.state.lock().show_play_button(track)
    }

    pub fn show_pause_button<T: Playable + ?Sized>(&self, track: &T) -> bool {
        self.state.lock().show_pause_button(track)
    }

    pub fn show_playing_indicator<T: Playable + ?Sized>(&self, track: &T) -> bool {
        self.state.lock().show_playing_indicator(track)
    }

    /// Re-read both cached topics, e.g. after the list was reloaded.
    pub fn refresh(&self) {
        let state = &self.state;
        self.player
            .update_current_track(|track| state.lock().apply_track(track));
        self.player
            .update_player_state(|st| state.lock().apply_player(st));
    }

    pub fn destroy(&mut self) {
        for sub in self.subscriptions.drain(..) {
            sub.unsubscribe();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl Drop for TrackCollectionPlayer {
    fn drop(&mut self) {
        self.destroy();
    }
}
