use things_proto::api::{AlbumSummary, SearchQuery, SearchTrack};
use things_proto::config::PagingConfig;
use tracing::debug;

use super::grid::{shared_list, Grid, SharedList};
use crate::http::ApiError;
use crate::services::SpotifyService;

/// Paged search over tracks and albums.  Albums live in a shared list so a
/// grid built from [`album_grid`](Self::album_grid) keeps up with paging.
pub struct SearchSession {
    spotify: SpotifyService,
    paging: PagingConfig,
    last_query: Option<String>,
    tracks: Vec<SearchTrack>,
    albums: SharedList<AlbumSummary>,
    total_tracks: u32,
    total_albums: u32,
}

impl SearchSession {
    pub fn new(spotify: SpotifyService, paging: PagingConfig) -> Self {
        Self {
            spotify,
            paging,
            last_query: None,
            tracks: Vec::new(),
            albums: shared_list(),
            total_tracks: 0,
            total_albums: 0,
        }
    }

    /// Start a new search; replaces both result lists.
    pub async fn search(&mut self, text: &str) -> Result<(), ApiError> {
        let query = SearchQuery::new(text, self.paging.tracks, self.paging.albums);
        let results = self.spotify.search(&query).await?;

        self.tracks = results.tracks;
        {
            let mut albums = self.albums.write();
            albums.clear();
            albums.extend(results.albums);
        }
        self.total_tracks = results.total_tracks;
        self.total_albums = results.total_albums;
        self.last_query = Some(if results.query.is_empty() {
            text.to_string()
        } else {
            results.query
        });
        debug!(
            tracks = self.tracks.len(),
            total = self.total_tracks,
            "search: results for {:?}",
            self.last_query
        );
        Ok(())
    }

    /// Append the next page of tracks.  No-op before the first search.
    pub async fn show_more_tracks(&mut self) -> Result<(), ApiError> {
        let Some(q) = self.last_query.clone() else {
            return Ok(());
        };
        let query = SearchQuery::new(q, self.paging.tracks, 0).with_offsets(self.tracks.len() as u32, 0);
        let results = self.spotify.search(&query).await?;
        self.tracks.extend(results.tracks);
        Ok(())
    }

    pub async fn show_more_albums(&mut self) -> Result<(), ApiError> {
        let Some(q) = self.last_query.clone() else {
            return Ok(());
        };
        let offset = self.albums.read().len() as u32;
        let query = SearchQuery::new(q, 0, self.paging.albums).with_offsets(0, offset);
        let results = self.spotify.search(&query).await?;
        self.albums.write().extend(results.albums);
        Ok(())
    }

    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    pub fn tracks(&self) -> &[SearchTrack] {
        &self.tracks
    }

    pub fn albums(&self) -> Vec<AlbumSummary> {
        self.albums.read().clone()
    }

    pub fn total_tracks(&self) -> u32 {
        self.total_tracks
    }

    pub fn total_albums(&self) -> u32 {
        self.total_albums
    }

    pub fn has_more_tracks(&self) -> bool {
        (self.tracks.len() as u32) < self.total_tracks
    }

    pub fn has_more_albums(&self) -> bool {
        (self.albums.read().len() as u32) < self.total_albums
    }

    pub fn album_grid(&self) -> Grid<AlbumSummary> {
        Grid::new(self.paging.grid_row_width, std::sync::Arc::clone(&self.albums))
    }
}
