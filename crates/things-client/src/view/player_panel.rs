use std::sync::Arc;

use parking_lot::Mutex;

use crate::alert::AlertBus;
use crate::services::PlayerService;
use crate::subscribers::Subscription;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub name: String,
    pub artists: String,
    pub link: String,
}

/// Everything the transport bar draws.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelState {
    pub is_repeat_on: bool,
    pub is_shuffle_on: bool,
    pub is_playing: bool,
    /// Whole seconds.
    pub track_length: u32,
    /// Seconds into the track as reported; floored only for display.
    pub track_progress: f64,
    pub now_playing: Option<NowPlaying>,
    sliding: bool,
}

impl PanelState {
    pub fn is_sliding(&self) -> bool {
        self.sliding
    }
}

/// Transport bar: playback toggles, progress, and the current track.
/// Server errors are forwarded to the alert bus while the panel lives.
pub struct PlayerPanel {
    player: PlayerService,
    state: Arc<Mutex<PanelState>>,
    _subscriptions: Vec<Subscription>,
}

impl PlayerPanel {
    pub fn new(player: PlayerService, alerts: &AlertBus) -> Self {
        let state = Arc::new(Mutex::new(PanelState::default()));

        let s = Arc::clone(&state);
        let flags = player.subscribe_player_state(move |st| {
            let mut s = s.lock();
            s.is_repeat_on = st.is_repeat_on;
            s.is_shuffle_on = st.is_shuffle_on;
            s.is_playing = st.is_playing;
        });

        let s = Arc::clone(&state);
        let track = player.subscribe_current_track(move |track| {
            let mut s = s.lock();
            s.track_progress = 0.0;
            s.track_length = track.map_or(0, |t| (t.duration / 1000) as u32);
            s.now_playing = track.map(|t| NowPlaying {
                name: t.name.clone(),
                artists: t.artists.clone(),
                link: t.link.clone(),
            });
        });

        let s = Arc::clone(&state);
        let progress = player.subscribe_playback_progress(move |secs| {
            let mut s = s.lock();
            if !s.sliding {
                s.track_progress = secs;
            }
        });

        let errors = player.report_errors(alerts);

        Self {
            player,
            state,
            _subscriptions: vec![flags, track, progress, errors],
        }
    }

    pub fn state(&self) -> PanelState {
        self.state.lock().clone()
    }

    pub fn play(&self) {
        self.player.play();
    }

    pub fn pause(&self) {
        self.player.pause();
    }

    pub fn next_track(&self) {
        self.player.next_track();
    }

    pub fn previous_track(&self) {
        self.player.previous_track();
    }

    /// Ask the server for the opposite of the last reported repeat flag.
    /// The local flag only changes when the server confirms.
    pub fn toggle_repeat(&self) {
        let on = self.state.lock().is_repeat_on;
        self.player.set_repeat(!on);
    }

    pub fn toggle_shuffle(&self) {
        let on = self.state.lock().is_shuffle_on;
        self.player.set_shuffle(!on);
    }

    /// The user grabbed the seek slider; progress updates are held back.
    pub fn start_slide(&self) {
        self.state.lock().sliding = true;
    }

    pub fn stop_slide(&self) {
        self.state.lock().sliding = false;
    }

    pub fn seek(&self, seconds: u32) {
        self.player.seek(seconds);
    }
}
