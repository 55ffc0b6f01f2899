use std::sync::Arc;

use things_proto::api::{
    Album, LoginResult, Playlist, PlaylistSummary, QueueTrack, SearchQuery, SearchResults, TrackInfo,
};
use things_proto::protocol::{Event, LoginState, Topic};

use super::narrow;
use crate::channel::{MessageChannel, Replay};
use crate::http::{ApiClient, ApiError};
use crate::subscribers::Subscription;

fn login_state(event: &Event) -> Option<&LoginState> {
    match event {
        Event::LoginState(state) => Some(state),
        _ => None,
    }
}

/// Catalogue lookups and account state.
#[derive(Clone)]
pub struct SpotifyService {
    channel: Arc<MessageChannel>,
    api: ApiClient,
}

impl SpotifyService {
    pub fn new(channel: Arc<MessageChannel>, api: ApiClient) -> Self {
        Self { channel, api }
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResults, ApiError> {
        self.api.search(query).await
    }

    pub async fn album(&self, link: &str) -> Result<Album, ApiError> {
        self.api.album(link).await
    }

    pub async fn playlists(&self) -> Result<Vec<PlaylistSummary>, ApiError> {
        self.api.playlists().await
    }

    pub async fn playlist(&self, link: &str) -> Result<Playlist, ApiError> {
        self.api.playlist(link).await
    }

    pub async fn play_queue(&self) -> Result<Vec<QueueTrack>, ApiError> {
        self.api.play_queue().await
    }

    pub async fn track(&self, link: &str) -> Result<TrackInfo, ApiError> {
        self.api.track(link).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResult, ApiError> {
        self.api.login(username, password).await
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        self.api.logout().await
    }

    pub fn subscribe_login_state<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&LoginState) + Send + Sync + 'static,
    {
        self.channel
            .subscribe(Topic::LoginState, Replay::Latest, narrow(login_state, handler))
    }

    pub fn subscribe_credentials_stored<F>(&self, handler: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.channel
            .subscribe(Topic::CredentialsStored, Replay::Latest, move |event: &Event| {
                if let Event::CredentialsStored(stored) = event {
                    handler(*stored)
                }
            })
    }
}
