//! Response bodies of the `/api/*` JSON endpoints.

use serde::{Deserialize, Serialize};

/// Anything that can be shown in a track list and played.
pub trait Playable {
    fn link(&self) -> &str;

    fn is_available(&self) -> bool {
        true
    }
}

/// Query string of `GET /api/search`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    pub q: String,
    /// Track count.
    pub tc: u32,
    /// Album count.
    pub ac: u32,
    /// Track offset.
    pub to: u32,
    /// Album offset.
    pub ao: u32,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, track_count: u32, album_count: u32) -> Self {
        Self {
            q: query.into(),
            tc: track_count,
            ac: album_count,
            to: 0,
            ao: 0,
        }
    }

    pub fn with_offsets(mut self, track_offset: u32, album_offset: u32) -> Self {
        self.to = track_offset;
        self.ao = album_offset;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchTrack {
    pub track_name: String,
    #[serde(default)]
    pub artists: Vec<String>,
    /// Milliseconds.
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub album: String,
    #[serde(default = "default_available")]
    pub is_available: bool,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumSummary {
    pub album_name: String,
    pub artist_name: String,
    #[serde(default)]
    pub image_id: Option<String>,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub tracks: Vec<SearchTrack>,
    #[serde(default)]
    pub total_tracks: u32,
    #[serde(default)]
    pub albums: Vec<AlbumSummary>,
    #[serde(default)]
    pub total_albums: u32,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumTrack {
    pub track_name: String,
    #[serde(default)]
    pub track_index: u32,
    #[serde(default)]
    pub duration: u64,
    pub link: String,
    #[serde(default = "default_available")]
    pub is_available: bool,
    #[serde(default)]
    pub artists: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disc {
    pub disc: u32,
    pub tracks: Vec<AlbumTrack>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub album_name: String,
    pub artist: String,
    #[serde(rename = "type", default)]
    pub kind: Option<serde_json::Value>,
    #[serde(default)]
    pub year: Option<u32>,
    pub link: String,
    #[serde(default)]
    pub discs: Vec<Disc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub name: String,
    pub link: String,
    #[serde(default)]
    pub track_count: u32,
}

/// Track entry shared by playlist detail and the play queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListTrack {
    pub track_name: String,
    #[serde(default)]
    pub duration: u64,
    pub link: String,
    #[serde(default = "default_available")]
    pub is_available: bool,
    #[serde(default)]
    pub artists: Vec<String>,
}

pub type QueueTrack = ListTrack;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    pub link: String,
    #[serde(default)]
    pub tracks: Vec<ListTrack>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub name: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResult {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkStatus {
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Album,
    Playlist,
    Track,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfidTag {
    pub tag: String,
    pub link: String,
    #[serde(rename = "type")]
    pub kind: LinkKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image_id: Option<String>,
}

/// `{"result": [...]}` wrapper used by the list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultList<T> {
    pub result: Vec<T>,
}

fn default_available() -> bool {
    true
}

impl Playable for SearchTrack {
    fn link(&self) -> &str {
        &self.link
    }

    fn is_available(&self) -> bool {
        self.is_available
    }
}

impl Playable for AlbumTrack {
    fn link(&self) -> &str {
        &self.link
    }

    fn is_available(&self) -> bool {
        self.is_available
    }
}

impl Playable for ListTrack {
    fn link(&self) -> &str {
        &self.link
    }

    fn is_available(&self) -> bool {
        self.is_available
    }
}

impl Playable for TrackInfo {
    fn link(&self) -> &str {
        &self.link
    }
}
