//! Client core for a spotifythings server: the `/ws/app` message channel,
//! the alert bus, typed services, and the view adapters built on them.

pub mod alert;
pub mod channel;
pub mod http;
pub mod rfid_session;
pub mod services;
mod subscribers;
pub mod view;

pub use alert::{Alert, AlertBus, AlertKind, AlertList};
pub use channel::{ChannelError, ChannelState, MessageChannel, Replay, Transport};
pub use http::{ApiClient, ApiError};
pub use rfid_session::{RfidScanSession, TagLinker, TagReadOutcome};
pub use services::{PlayerService, RfidTagService, SpotifyService};
pub use subscribers::Subscription;
