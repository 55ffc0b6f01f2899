use std::sync::Arc;

use things_proto::api::{LinkStatus, RfidTag};
use things_proto::protocol::{Event, RfidReader, Topic};

use crate::channel::{ChannelError, MessageChannel, Replay};
use crate::http::{ApiClient, ApiError};
use crate::rfid_session::RfidScanSession;
use crate::subscribers::Subscription;

/// RFID tag associations and attached readers.
#[derive(Clone)]
pub struct RfidTagService {
    channel: Arc<MessageChannel>,
    api: ApiClient,
}

impl RfidTagService {
    pub fn new(channel: Arc<MessageChannel>, api: ApiClient) -> Self {
        Self { channel, api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub async fn link_status(&self, link: &str) -> Result<LinkStatus, ApiError> {
        self.api.link_status(link).await
    }

    pub async fn unlink_tag(&self, tag: &str) -> Result<(), ApiError> {
        self.api.unlink_tag(tag).await
    }

    pub async fn link_tag(&self, tag: &str, link: &str) -> Result<(), ApiError> {
        self.api.link_tag(tag, link).await
    }

    pub async fn relink_tag(&self, tag: &str, link: &str) -> Result<(), ApiError> {
        self.api.relink_tag(tag, link).await
    }

    pub async fn tags(&self) -> Result<Vec<RfidTag>, ApiError> {
        self.api.tags().await
    }

    pub fn subscribe_attached_readers<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&[RfidReader]) + Send + Sync + 'static,
    {
        self.channel
            .subscribe(Topic::RfidReaders, Replay::Latest, move |event: &Event| {
                if let Event::RfidReaders(readers) = event {
                    handler(readers)
                }
            })
    }

    /// Open a tag-scan session on `url` (the server's `/ws/rfid`).  Socket
    /// errors are raised on the channel's alert bus.
    pub async fn scan_session(&self, url: &str) -> Result<RfidScanSession, ChannelError> {
        RfidScanSession::open(url, self.channel.alerts().clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertBus;
    use parking_lot::Mutex;

    #[test]
    fn test_readers_replay_and_update() {
        let channel = MessageChannel::new(AlertBus::new());
        let rfid = RfidTagService::new(Arc::clone(&channel), ApiClient::new("http://127.0.0.1:1"));
        channel.receive(
            r#"{"type":"hardware.rfid_reader","data":[{"name":"Phidget RFID 4-output","serial_no":123456,"version":206}]}"#,
        );

        let names = Arc::new(Mutex::new(Vec::new()));
        let n = Arc::clone(&names);
        let _sub = rfid.subscribe_attached_readers(move |readers| {
            n.lock().push(readers.iter().map(|r| r.name.clone()).collect::<Vec<_>>())
        });
        channel.receive(r#"{"type":"hardware.rfid_reader","data":[]}"#);

        assert_eq!(*names.lock(), vec![vec!["Phidget RFID 4-output".to_string()], vec![]]);
    }
}
