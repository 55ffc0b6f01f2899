//! Client for the server's `/api/*` HTTP endpoints.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use things_proto::api::{
    Album, LinkStatus, LoginResult, Playlist, PlaylistSummary, QueueTrack, ResultList, RfidTag,
    SearchQuery, SearchResults, TrackInfo,
};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("{path} returned {status}")]
    Status { status: StatusCode, path: String },
    #[error("could not decode response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: String,
    client: Client,
}

impl ApiClient {
    /// `base` is the server root, e.g. `http://127.0.0.1:8080`.
    pub fn new(base: impl Into<String>) -> Self {
        Self::with_client(base, Client::new())
    }

    pub fn with_client(base: impl Into<String>, client: Client) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { base, client }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResults, ApiError> {
        let req = self.request(Method::GET, "/api/search").query(query);
        self.json("/api/search", req).await
    }

    pub async fn album(&self, link: &str) -> Result<Album, ApiError> {
        self.get(&format!("/api/album/{}", link)).await
    }

    pub async fn playlists(&self) -> Result<Vec<PlaylistSummary>, ApiError> {
        let list: ResultList<PlaylistSummary> = self.get("/api/playlist").await?;
        Ok(list.result)
    }

    pub async fn playlist(&self, link: &str) -> Result<Playlist, ApiError> {
        self.get(&format!("/api/playlist/{}", link)).await
    }

    pub async fn play_queue(&self) -> Result<Vec<QueueTrack>, ApiError> {
        let list: ResultList<QueueTrack> = self.get("/api/playqueue").await?;
        Ok(list.result)
    }

    pub async fn track(&self, link: &str) -> Result<TrackInfo, ApiError> {
        self.get(&format!("/api/track/{}", link)).await
    }

    /// Store Spotify credentials on the server.  A rejected login is a
    /// successful call with `success == false`.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResult, ApiError> {
        let req = self
            .request(Method::PUT, "/api/credentials")
            .form(&[("username", username), ("password", password)]);
        self.json("/api/credentials", req).await
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        let req = self.request(Method::DELETE, "/api/credentials");
        self.empty("/api/credentials", req).await
    }

    pub async fn link_status(&self, link: &str) -> Result<LinkStatus, ApiError> {
        self.get(&format!("/api/rfid-linkstatus/{}", link)).await
    }

    pub async fn tags(&self) -> Result<Vec<RfidTag>, ApiError> {
        let list: ResultList<RfidTag> = self.get("/api/rfid").await?;
        Ok(list.result)
    }

    pub async fn unlink_tag(&self, tag: &str) -> Result<(), ApiError> {
        let path = format!("/api/rfid/{}", tag);
        let req = self.request(Method::DELETE, &path);
        self.empty(&path, req).await
    }

    /// Associate a fresh tag.  The body is the bare resource link.
    pub async fn link_tag(&self, tag: &str, link: &str) -> Result<(), ApiError> {
        let path = format!("/api/rfid/{}", tag);
        let req = self.request(Method::PUT, &path).body(link.to_string());
        self.empty(&path, req).await
    }

    /// Point an already-linked tag at a different resource.
    pub async fn relink_tag(&self, tag: &str, link: &str) -> Result<(), ApiError> {
        let path = format!("/api/rfid/{}", tag);
        let req = self.request(Method::POST, &path).body(link.to_string());
        self.empty(&path, req).await
    }

    // ── plumbing ──────────────────────────────────────────────────────────────

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!("api: {} {}", method, path);
        self.client
            .request(method, format!("{}{}", self.base, path))
            .header("Accept", "application/json")
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let req = self.request(Method::GET, path);
        self.json(path, req).await
    }

    async fn json<T: DeserializeOwned>(&self, path: &str, req: RequestBuilder) -> Result<T, ApiError> {
        let response = send(path, req).await?;
        response.json().await.map_err(ApiError::Decode)
    }

    async fn empty(&self, path: &str, req: RequestBuilder) -> Result<(), ApiError> {
        send(path, req).await.map(|_| ())
    }
}

async fn send(path: &str, req: RequestBuilder) -> Result<Response, ApiError> {
    let response = req.send().await.map_err(ApiError::Transport)?;
    let status = response.status();
    if !status.is_success() {
        debug!("api: {} -> {}", path, status);
        return Err(ApiError::Status {
            status,
            path: path.to_string(),
        });
    }
    Ok(response)
}
