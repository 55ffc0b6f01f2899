//! View-side state derived from the services.  Nothing here talks to the
//! network directly except through a service.

pub mod album;
pub mod format;
pub mod grid;
pub mod playback;
pub mod player_panel;
pub mod scope;
pub mod search;
pub mod tags;

pub use album::{AlbumRow, AlbumView, DiscView};
pub use format::{format_duration, format_millis};
pub use grid::{shared_list, Grid, SharedList};
pub use playback::{PlaybackState, TrackCollectionPlayer};
pub use player_panel::{NowPlaying, PanelState, PlayerPanel};
pub use scope::ViewScope;
pub use search::SearchSession;
pub use tags::TagShelf;
