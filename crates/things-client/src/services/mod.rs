//! Typed facades over the message channel and the HTTP API.

mod player;
mod rfid;
mod spotify;

pub use player::PlayerService;
pub use rfid::RfidTagService;
pub use spotify::SpotifyService;

use things_proto::protocol::Event;

/// Adapt a payload handler to a channel handler.  Events the extractor does
/// not recognise are ignored.
pub(crate) fn narrow<T, F>(
    extract: for<'a> fn(&'a Event) -> Option<&'a T>,
    handler: F,
) -> impl Fn(&Event) + Send + Sync + 'static
where
    T: ?Sized + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    move |event: &Event| {
        if let Some(payload) = extract(event) {
            handler(payload)
        }
    }
}
