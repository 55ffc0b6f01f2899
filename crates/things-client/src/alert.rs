//! User-facing notifications, independent of the network.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::subscribers::{Registry, Subscription, Unsubscribe};

// Process-wide; shared by every bus so sequence numbers are never reused.
static NEXT_ALERT_SEQ: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Info,
    Warning,
    Error,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AlertKind::Info => "info",
            AlertKind::Warning => "warning",
            AlertKind::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub sequence: u64,
    pub kind: AlertKind,
    pub message: String,
    pub raised_at: DateTime<Local>,
}

struct Shared {
    registry: Mutex<Registry<(), Alert>>,
}

impl Unsubscribe for Shared {
    fn unsubscribe(&self, id: u64) {
        let removed = self.registry.lock().remove(id);
        drop(removed);
    }
}

/// In-process publish/subscribe for alerts.  Cheap to clone; clones share
/// subscribers.
#[derive(Clone)]
pub struct AlertBus {
    shared: Arc<Shared>,
}

impl AlertBus {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::new()),
            }),
        }
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.publish(AlertKind::Info, message.into())
    }

    pub fn warning(&self, message: impl Into<String>) -> u64 {
        self.publish(AlertKind::Warning, message.into())
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.publish(AlertKind::Error, message.into())
    }

    /// Receive every alert published from now on.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Alert) + Send + Sync + 'static,
    {
        let entry = self.shared.registry.lock().insert((), Arc::new(handler));
        let owner = Arc::downgrade(&self.shared) as Weak<dyn Unsubscribe>;
        Subscription::new(entry.id, owner)
    }

    fn publish(&self, kind: AlertKind, message: String) -> u64 {
        let alert = Alert {
            sequence: NEXT_ALERT_SEQ.fetch_add(1, Ordering::Relaxed),
            kind,
            message,
            raised_at: Local::now(),
        };

        match kind {
            AlertKind::Info => info!(seq = alert.sequence, "alert: {}", alert.message),
            AlertKind::Warning => warn!(seq = alert.sequence, "alert: {}", alert.message),
            AlertKind::Error => error!(seq = alert.sequence, "alert: {}", alert.message),
        }

        let targets = self.shared.registry.lock().matching(&());
        for entry in targets {
            if !self.shared.registry.lock().contains(entry.id) {
                continue;
            }
            entry.invoke(&alert);
        }
        alert.sequence
    }
}

impl Default for AlertBus {
    fn default() -> Self {
        Self::new()
    }
}

/// The list of alerts a view is currently showing, in arrival order.
#[derive(Debug, Default)]
pub struct AlertList {
    alerts: Vec<Alert>,
}

impl AlertList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, alert: Alert) {
        self.alerts.push(alert);
    }

    /// Remove the alert with this exact sequence number.
    pub fn dismiss(&mut self, sequence: u64) -> bool {
        match self.alerts.iter().position(|a| a.sequence == sequence) {
            Some(pos) => {
                self.alerts.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(bus: &AlertBus) -> (Arc<Mutex<Vec<Alert>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = bus.subscribe(move |a| sink.lock().push(a.clone()));
        (seen, sub)
    }

    #[test]
    fn test_sequences_strictly_increase_across_kinds() {
        let bus = AlertBus::new();
        let a = bus.info("one");
        let b = bus.error("two");
        let c = bus.warning("three");
        let d = AlertBus::new().info("other bus");
        assert!(a >= 1);
        assert!(a < b && b < c && c < d);
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let bus = AlertBus::new();
        bus.error("before");
        let (seen, _sub) = collect(&bus);
        let seq = bus.info("after");
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].sequence, seq);
        assert_eq!(seen[0].kind, AlertKind::Info);
        assert_eq!(seen[0].message, "after");
    }

    #[test]
    fn test_unsubscribed_handler_stops_receiving() {
        let bus = AlertBus::new();
        let (seen, sub) = collect(&bus);
        bus.info("first");
        sub.unsubscribe();
        bus.info("second");
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_dismiss_out_of_order() {
        let bus = AlertBus::new();
        let list = Arc::new(Mutex::new(AlertList::new()));
        let sink = Arc::clone(&list);
        let _sub = bus.subscribe(move |a| sink.lock().push(a.clone()));

        let first = bus.info("a");
        let second = bus.error("b");
        let third = bus.info("c");

        let mut list = list.lock();
        assert!(list.dismiss(second));
        assert!(!list.dismiss(second));
        let left: Vec<u64> = list.iter().map(|a| a.sequence).collect();
        assert_eq!(left, vec![first, third]);
        assert!(list.dismiss(first));
        assert_eq!(list.len(), 1);
        assert!(!list.is_empty());
    }
}
