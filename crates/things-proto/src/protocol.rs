use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Errors raised while turning a socket frame into a typed [`Event`].
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("unknown topic '{0}'")]
    UnknownTopic(String),
    #[error("bad payload for '{topic}': {source}")]
    Payload {
        topic: Topic,
        #[source]
        source: serde_json::Error,
    },
}

/// Inbound topics pushed by the server over `/ws/app`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    PlayerState,
    CurrentTrack,
    PlaybackProgress,
    QueueModified,
    LoginState,
    CredentialsStored,
    RfidReaders,
    Error,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::PlayerState,
        Topic::CurrentTrack,
        Topic::PlaybackProgress,
        Topic::QueueModified,
        Topic::LoginState,
        Topic::CredentialsStored,
        Topic::RfidReaders,
        Topic::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::PlayerState => "player.state",
            Topic::CurrentTrack => "player.current_track",
            Topic::PlaybackProgress => "player.playback_progress",
            Topic::QueueModified => "player.queue_modified",
            Topic::LoginState => "spotify.login_state",
            Topic::CredentialsStored => "spotify.credentials_stored",
            Topic::RfidReaders => "hardware.rfid_reader",
            Topic::Error => "error",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownTopic(s.to_string()))
    }
}

/// The `{type, data}` unit exchanged over the socket in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Envelope)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ── inbound payloads ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    #[serde(default)]
    pub is_repeat_on: bool,
    #[serde(default)]
    pub is_shuffle_on: bool,
    #[serde(default)]
    pub is_playing: bool,
}

/// Track currently loaded in the player.  `duration` is in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentTrack {
    pub name: String,
    /// Comma-joined artist names, as the server sends them.
    #[serde(default)]
    pub artists: String,
    pub link: String,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub image_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoginState {
    pub is_logged_in: bool,
    #[serde(default)]
    pub login_error: Option<String>,
    #[serde(default)]
    pub current_user: Option<String>,
}

/// A reader attached to the server.  Serial number and firmware version are
/// the integers reported by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfidReader {
    pub name: String,
    #[serde(default)]
    pub serial_no: Option<u64>,
    #[serde(default)]
    pub version: Option<u32>,
}

/// Payload of the `error` topic.  The server sends either a plain string or
/// an arbitrary object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerError(pub Value);

impl ServerError {
    pub fn message(&self) -> String {
        match &self.0 {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// A typed inbound event: one variant per [`Topic`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PlayerState(PlayerState),
    CurrentTrack(Option<CurrentTrack>),
    /// Seconds into the current track, fractional.
    PlaybackProgress(f64),
    QueueModified,
    LoginState(LoginState),
    CredentialsStored(bool),
    RfidReaders(Vec<RfidReader>),
    Error(ServerError),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::PlayerState(_) => Topic::PlayerState,
            Event::CurrentTrack(_) => Topic::CurrentTrack,
            Event::PlaybackProgress(_) => Topic::PlaybackProgress,
            Event::QueueModified => Topic::QueueModified,
            Event::LoginState(_) => Topic::LoginState,
            Event::CredentialsStored(_) => Topic::CredentialsStored,
            Event::RfidReaders(_) => Topic::RfidReaders,
            Event::Error(_) => Topic::Error,
        }
    }

    /// Validate an envelope against the payload shape of its topic.
    pub fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        let topic: Topic = envelope.kind.parse()?;
        let data = envelope.data;
        let wrap = |source: serde_json::Error| ProtocolError::Payload { topic, source };

        let event = match topic {
            Topic::PlayerState => Event::PlayerState(serde_json::from_value(data).map_err(wrap)?),
            Topic::CurrentTrack => {
                Event::CurrentTrack(serde_json::from_value(data).map_err(wrap)?)
            }
            Topic::PlaybackProgress => {
                Event::PlaybackProgress(serde_json::from_value(data).map_err(wrap)?)
            }
            Topic::QueueModified => Event::QueueModified,
            Topic::LoginState => Event::LoginState(serde_json::from_value(data).map_err(wrap)?),
            Topic::CredentialsStored => {
                Event::CredentialsStored(serde_json::from_value(data).map_err(wrap)?)
            }
            Topic::RfidReaders => Event::RfidReaders(serde_json::from_value(data).map_err(wrap)?),
            Topic::Error => Event::Error(ServerError(data)),
        };
        Ok(event)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Self::from_envelope(Envelope::decode(text)?)
    }
}

// ── outbound commands ────────────────────────────────────────────────────────

/// Commands sent to the server.  Unit variants carry no `data` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Command {
    #[serde(rename = "player.play")]
    Play,
    #[serde(rename = "player.pause")]
    Pause,
    #[serde(rename = "player.next_track")]
    NextTrack,
    #[serde(rename = "player.previous_track")]
    PreviousTrack,
    #[serde(rename = "player.set_repeat")]
    SetRepeat(bool),
    #[serde(rename = "player.set_shuffle")]
    SetShuffle(bool),
    /// Seek offset in seconds.
    #[serde(rename = "player.seek")]
    Seek(u32),
    #[serde(rename = "player.play_track")]
    PlayTrack {
        resource_link: String,
        track_link: String,
    },
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Play => "player.play",
            Command::Pause => "player.pause",
            Command::NextTrack => "player.next_track",
            Command::PreviousTrack => "player.previous_track",
            Command::SetRepeat(_) => "player.set_repeat",
            Command::SetShuffle(_) => "player.set_shuffle",
            Command::Seek(_) => "player.seek",
            Command::PlayTrack { .. } => "player.play_track",
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ── /ws/rfid ─────────────────────────────────────────────────────────────────

/// A tag swiped over a reader during an association session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRead {
    pub tag: String,
    /// Name of the resource the tag is already linked to, if any.
    #[serde(default)]
    pub previous_association: Option<String>,
}

/// Frames on `/ws/rfid` are flat (no `data` wrapper).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum RfidFrame {
    #[serde(rename = "tag_read")]
    TagRead(TagRead),
    #[serde(other)]
    Other,
}
