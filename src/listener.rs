use crate::counter::AggregateCounts;
use crate::error::ListenerError;
use crate::notification::NotificationDomain;
use std::{
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, RwLock,
    },
};
use tracing::{debug, warn};

/// Callback invoked with the latest counts. Returning an error (or
/// panicking) only affects this listener.
pub type ListenerCallback<D> =
    Arc<dyn Fn(&AggregateCounts<D>) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`ListenerRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerToken(u64);

impl fmt::Display for ListenerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of a sequenced delivery.
#[derive(Debug)]
pub enum Delivery {
    /// Counts went out to every listener; failures are listed.
    Delivered(Vec<ListenerError>),
    /// Same counts as the last delivery.
    Unchanged,
    /// A newer sequence was already delivered.
    Outdated,
}

struct Delivered<D: NotificationDomain> {
    seq: u64,
    counts: Option<AggregateCounts<D>>,
}

pub struct ListenerRegistry<D: NotificationDomain> {
    next_token: AtomicU64,
    listeners: RwLock<Vec<(ListenerToken, ListenerCallback<D>)>>,
    // Held for the whole fan-out so deliveries never interleave.
    delivered: Mutex<Delivered<D>>,
}

impl<D: NotificationDomain> Default for ListenerRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: NotificationDomain> ListenerRegistry<D> {
    pub fn new() -> Self {
        Self {
            next_token: AtomicU64::new(1),
            listeners: RwLock::new(Vec::new()),
            delivered: Mutex::new(Delivered {
                seq: 0,
                counts: None,
            }),
        }
    }

    /// Registers a callback. Does not fetch and does not replay the last
    /// counts.
    pub fn subscribe<F>(&self, callback: F) -> ListenerToken
    where
        F: Fn(&AggregateCounts<D>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let token = ListenerToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap()
            .push((token, Arc::new(callback)));
        debug!(domain = D::NAME, token = %token, "listener added");
        token
    }

    /// Removes one callback. Returns false when the token was already gone.
    pub fn unsubscribe(&self, token: ListenerToken) -> bool {
        let mut listeners = self.listeners.write().unwrap();
        let before = listeners.len();
        listeners.retain(|(t, _)| *t != token);
        let removed = listeners.len() != before;
        if removed {
            debug!(domain = D::NAME, token = %token, "listener removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.listeners.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counts handed to listeners most recently.
    pub fn last_delivered(&self) -> Option<AggregateCounts<D>> {
        self.delivered.lock().unwrap().counts.clone()
    }

    /// Fans `counts` out to every listener, unconditionally.
    pub fn notify_all(&self, counts: &AggregateCounts<D>) -> Vec<ListenerError> {
        let mut delivered = self.delivered.lock().unwrap();
        let errors = self.fan_out(counts);
        delivered.counts = Some(counts.clone());
        errors
    }

    /// Fans out only when `seq` is not older than the last delivery and the
    /// counts differ from what listeners already saw.
    pub fn deliver(&self, seq: u64, counts: &AggregateCounts<D>) -> Delivery {
        let mut delivered = self.delivered.lock().unwrap();
        if seq < delivered.seq {
            debug!(domain = D::NAME, seq, last = delivered.seq, "skipping outdated delivery");
            return Delivery::Outdated;
        }
        delivered.seq = seq;
        if delivered.counts.as_ref() == Some(counts) {
            return Delivery::Unchanged;
        }
        let errors = self.fan_out(counts);
        delivered.counts = Some(counts.clone());
        Delivery::Delivered(errors)
    }

    fn fan_out(&self, counts: &AggregateCounts<D>) -> Vec<ListenerError> {
        // Snapshot so callbacks may subscribe or unsubscribe while running.
        let snapshot: Vec<(ListenerToken, ListenerCallback<D>)> =
            self.listeners.read().unwrap().clone();
        let mut errors = Vec::new();
        for (token, callback) in snapshot {
            let failure = match catch_unwind(AssertUnwindSafe(|| callback(counts))) {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(ListenerError {
                    token,
                    message: err.to_string(),
                    panicked: false,
                }),
                Err(payload) => Some(ListenerError {
                    token,
                    message: panic_message(payload.as_ref()),
                    panicked: true,
                }),
            };
            if let Some(err) = failure {
                warn!(domain = D::NAME, error = %err, "listener failed during fan-out");
                errors.push(err);
            }
        }
        errors
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "listener panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{Admin, AdminKind};
    use std::sync::atomic::AtomicUsize;

    fn counts(unread: u64) -> AggregateCounts<Admin> {
        let mut counts = AggregateCounts::<Admin>::default();
        counts.total = unread;
        counts.unread = unread;
        counts.by_type.insert(AdminKind::System, unread);
        counts
    }

    fn counting(registry: &ListenerRegistry<Admin>) -> (ListenerToken, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        let token = registry.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (token, hits)
    }

    #[test]
    fn test_unsubscribe_twice_is_noop() {
        let registry = ListenerRegistry::<Admin>::new();
        let (a, hits_a) = counting(&registry);
        let (_b, hits_b) = counting(&registry);
        assert_eq!(registry.len(), 2);

        assert!(registry.unsubscribe(a));
        assert!(!registry.unsubscribe(a));
        assert_eq!(registry.len(), 1);

        registry.notify_all(&counts(1));
        assert_eq!(hits_a.load(Ordering::SeqCst), 0);
        assert_eq!(hits_b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_listeners_are_isolated() {
        let registry = ListenerRegistry::<Admin>::new();
        let (_, before) = counting(&registry);
        registry.subscribe(|_| anyhow::bail!("render failed"));
        registry.subscribe(|_| panic!("boom"));
        let (_, after) = counting(&registry);

        let errors = registry.notify_all(&counts(3));
        assert_eq!(errors.len(), 2);
        assert!(!errors[0].panicked);
        assert!(errors[0].message.contains("render failed"));
        assert!(errors[1].panicked);
        assert_eq!(errors[1].message, "boom");
        assert_eq!(before.load(Ordering::SeqCst), 1);
        assert_eq!(after.load(Ordering::SeqCst), 1);

        // A panicking listener must not poison later deliveries.
        registry.notify_all(&counts(4));
        assert_eq!(after.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_deliver_skips_unchanged_and_outdated() {
        let registry = ListenerRegistry::<Admin>::new();
        let (_, hits) = counting(&registry);

        assert!(matches!(registry.deliver(1, &counts(2)), Delivery::Delivered(_)));
        assert!(matches!(registry.deliver(2, &counts(2)), Delivery::Unchanged));
        assert!(matches!(registry.deliver(1, &counts(5)), Delivery::Outdated));
        assert!(matches!(registry.deliver(3, &counts(1)), Delivery::Delivered(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(registry.last_delivered().unwrap().unread, 1);
    }

    #[test]
    fn test_subscribe_does_not_replay() {
        let registry = ListenerRegistry::<Admin>::new();
        registry.notify_all(&counts(1));
        let (_, hits) = counting(&registry);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_can_unsubscribe_itself() {
        let registry = Arc::new(ListenerRegistry::<Admin>::new());
        let slot: Arc<Mutex<Option<ListenerToken>>> = Arc::new(Mutex::new(None));
        let (reg, own) = (registry.clone(), slot.clone());
        let token = registry.subscribe(move |_| {
            if let Some(token) = *own.lock().unwrap() {
                reg.unsubscribe(token);
            }
            Ok(())
        });
        *slot.lock().unwrap() = Some(token);

        registry.notify_all(&counts(1));
        assert!(registry.is_empty());
    }
}
