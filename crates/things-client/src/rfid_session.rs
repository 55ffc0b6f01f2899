//! Tag association: a short-lived `/ws/rfid` session that reports tags swiped
//! over a reader, and the editor that links them to one resource.

use futures_util::StreamExt;
use things_proto::protocol::{RfidFrame, TagRead};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::alert::AlertBus;
use crate::channel::ChannelError;
use crate::http::{ApiClient, ApiError};

pub struct RfidScanSession {
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    alerts: AlertBus,
}

impl RfidScanSession {
    pub async fn open(url: &str, alerts: AlertBus) -> Result<Self, ChannelError> {
        let (stream, _response) = match tokio_tungstenite::connect_async(url).await {
            Ok(ok) => ok,
            Err(e) => {
                alerts.error(format!("WebSocket error: {}", e));
                return Err(e.into());
            }
        };
        info!("rfid: scan session open on {}", url);
        Ok(Self {
            stream: Some(stream),
            alerts,
        })
    }

    /// Wait for the next tag read.  Frames of other types are skipped.
    /// `None` once the session is closed.
    pub async fn next_read(&mut self) -> Option<TagRead> {
        loop {
            let stream = self.stream.as_mut()?;
            let frame = match stream.next().await {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(_))) | None => {
                    debug!("rfid: session closed by server");
                    self.stream = None;
                    return None;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!("rfid: socket error: {}", e);
                    self.alerts.error(format!("WebSocket error: {}", e));
                    self.stream = None;
                    return None;
                }
            };
            match serde_json::from_str::<RfidFrame>(&frame) {
                Ok(RfidFrame::TagRead(read)) => {
                    debug!("rfid: tag {} read", read.tag);
                    return Some(read);
                }
                Ok(RfidFrame::Other) => debug!("rfid: skipping {}", frame),
                Err(e) => warn!("rfid: bad frame {}: {}", frame, e),
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                debug!("rfid: close: {}", e);
            }
        }
    }
}

/// What happened to a swiped tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagReadOutcome {
    /// The tag was free and is now linked.
    Linked(String),
    /// The tag already points at `name`; confirm with [`TagLinker::relink`].
    Overwrite { tag: String, name: String },
}

/// Tags linked to one resource.
#[derive(Debug, Clone)]
pub struct TagLinker {
    link: String,
    tags: Vec<String>,
}

impl TagLinker {
    pub fn new(link: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            tags: Vec::new(),
        }
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub async fn load(&mut self, api: &ApiClient) -> Result<(), ApiError> {
        self.tags = api.link_status(&self.link).await?.tags;
        Ok(())
    }

    pub async fn on_tag_read(
        &mut self,
        api: &ApiClient,
        read: TagRead,
    ) -> Result<TagReadOutcome, ApiError> {
        if let Some(name) = read.previous_association {
            return Ok(TagReadOutcome::Overwrite {
                tag: read.tag,
                name,
            });
        }
        api.link_tag(&read.tag, &self.link).await?;
        info!("rfid: linked {} to {}", read.tag, self.link);
        self.tags.push(read.tag.clone());
        Ok(TagReadOutcome::Linked(read.tag))
    }

    pub async fn relink(&mut self, api: &ApiClient, tag: &str) -> Result<(), ApiError> {
        api.relink_tag(tag, &self.link).await?;
        info!("rfid: relinked {} to {}", tag, self.link);
        self.load(api).await
    }

    pub async fn unlink(&mut self, api: &ApiClient, tag: &str) -> Result<(), ApiError> {
        api.unlink_tag(tag).await?;
        self.tags.retain(|t| t != tag);
        Ok(())
    }
}
