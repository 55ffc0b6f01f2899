use std::future::Future;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::subscribers::Subscription;

/// Lifetime of one view.  Holds the view's subscriptions and cancels its
/// pending requests on teardown.
#[derive(Debug, Default)]
pub struct ViewScope {
    token: CancellationToken,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `subscription` alive until teardown.
    pub fn hold(&self, subscription: Subscription) {
        if self.is_torn_down() {
            subscription.unsubscribe();
            return;
        }
        self.subscriptions.lock().push(subscription);
    }

    /// Await `fut` unless the view is torn down first.  A completion that
    /// arrives after teardown is dropped and yields `None`.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            out = fut => {
                if self.token.is_cancelled() { None } else { Some(out) }
            }
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_torn_down(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn teardown(&self) {
        if self.token.is_cancelled() {
            return;
        }
        self.token.cancel();
        let subs: Vec<Subscription> = self.subscriptions.lock().drain(..).collect();
        debug!(count = subs.len(), "view: teardown");
        for sub in subs {
            sub.unsubscribe();
        }
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.teardown();
    }
}
