use crate::config::{CountsSource, StoreConfig};
use crate::counter::{compute_at, AggregateCounts};
use crate::error::SyncError;
use crate::gateway::{ReadFilter, RemoteGateway};
use crate::listener::{Delivery, ListenerRegistry, ListenerToken};
use crate::notification::{
    sort_recent_first, ActionKind, DomainAction, NotificationDomain, NotificationId,
    NotificationRecord,
};
use crate::scheduler::{PollTarget, PollingScheduler};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tracing::{debug, info, warn};


/// What a refresh did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// A response issued later had already been applied.
    Discarded,
    /// A scheduled poll was still in flight.
    Busy,
}

/// Result of a mutating action that reached a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied,
    /// The target had already disappeared; the cache was reconciled instead.
    Stale,
}

struct CacheState<D: NotificationDomain> {
    records: Vec<NotificationRecord<D>>,
    counts: AggregateCounts<D>,
    applied_seq: u64,
    populated: bool,
    last_synced: Option<DateTime<Utc>>,
}

struct StoreInner<D: NotificationDomain> {
    gateway: Arc<dyn RemoteGateway<D>>,
    config: StoreConfig,
    listeners: ListenerRegistry<D>,
    scheduler: PollingScheduler,
    state: Mutex<CacheState<D>>,
    next_seq: AtomicU64,
    poll_busy: AtomicBool,
    cold_start: tokio::sync::Mutex<()>,
}

/// Resets the busy flag even when the poll future is dropped mid-flight.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Per-domain notification cache, listener fan-out and poll timer.
///
/// Cloning is cheap and every clone shares the same cache, listeners and
/// timer, so one store can be handed to every consumer of a domain. The
/// timer is cancelled when the last clone is dropped.
pub struct NotificationStore<D: NotificationDomain> {
    inner: Arc<StoreInner<D>>,
}

impl<D: NotificationDomain> Clone for NotificationStore<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: NotificationDomain> NotificationStore<D> {
    pub fn new(gateway: Arc<dyn RemoteGateway<D>>, config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                gateway,
                config,
                listeners: ListenerRegistry::new(),
                scheduler: PollingScheduler::new(D::NAME),
                state: Mutex::new(CacheState {
                    records: Vec::new(),
                    counts: AggregateCounts::default(),
                    applied_seq: 0,
                    populated: false,
                    last_synced: None,
                }),
                next_seq: AtomicU64::new(0),
                poll_busy: AtomicBool::new(false),
                cold_start: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn domain(&self) -> &'static str {
        D::NAME
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn scheduler(&self) -> &PollingScheduler {
        &self.inner.scheduler
    }

    pub fn is_populated(&self) -> bool {
        self.inner.state.lock().unwrap().populated
    }

    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().unwrap().last_synced
    }

    /// Cached records, newest first. Never fetches.
    pub fn cached_notifications(&self) -> Vec<NotificationRecord<D>> {
        self.inner.state.lock().unwrap().records.clone()
    }

    /// Cached counts. Never fetches.
    pub fn cached_counts(&self) -> AggregateCounts<D> {
        self.inner.state.lock().unwrap().counts.clone()
    }

    /// Cached records, fetching once if nothing was ever loaded.
    pub async fn get_all_notifications(&self) -> Result<Vec<NotificationRecord<D>>, SyncError> {
        self.inner.ensure_populated().await?;
        Ok(self.cached_notifications())
    }

    pub async fn get_unread_notifications(
        &self,
    ) -> Result<Vec<NotificationRecord<D>>, SyncError> {
        self.inner.ensure_populated().await?;
        let state = self.inner.state.lock().unwrap();
        Ok(state.records.iter().filter(|r| !r.is_read).cloned().collect())
    }

    /// Cached counts, fetching once if nothing was ever loaded.
    pub async fn get_notification_counts(&self) -> Result<AggregateCounts<D>, SyncError> {
        self.inner.ensure_populated().await?;
        Ok(self.cached_counts())
    }

    pub fn add_listener<F>(&self, callback: F) -> ListenerToken
    where
        F: Fn(&AggregateCounts<D>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(callback)
    }

    /// Removes a listener. With `stop_when_idle`, removing the last one also
    /// stops polling.
    pub fn remove_listener(&self, token: ListenerToken) -> bool {
        let removed = self.inner.listeners.unsubscribe(token);
        if removed && self.inner.config.stop_when_idle && self.inner.listeners.is_empty() {
            debug!(domain = D::NAME, "last listener gone, stopping poll timer");
            self.inner.scheduler.stop();
        }
        removed
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Starts the domain timer. Further calls while it runs are no-ops.
    pub fn start_polling(&self, interval: Duration) -> bool {
        let immediate = !self.is_populated();
        self.inner
            .scheduler
            .start(interval, immediate, Arc::downgrade(&self.inner))
    }

    /// Starts the timer with the configured interval.
    pub fn start_polling_default(&self) -> bool {
        self.start_polling(self.inner.config.poll_interval())
    }

    pub fn stop_polling(&self) -> bool {
        self.inner.scheduler.stop()
    }

    pub fn is_polling(&self) -> bool {
        self.inner.scheduler.is_running()
    }

    /// Out-of-band fetch that ignores the poll busy flag.
    pub async fn refresh(&self) -> Result<RefreshOutcome, SyncError> {
        self.inner.refresh("forced").await
    }

    /// One scheduled-style poll, skipped while another poll is in flight.
    pub async fn poll_now(&self) -> Result<RefreshOutcome, SyncError> {
        self.inner.poll().await
    }

    pub async fn mark_as_read(&self, id: &NotificationId) -> Result<ActionOutcome, SyncError> {
        const ACTION: &str = "mark_as_read";
        self.inner.ensure_populated().await?;
        if !self.inner.contains(id) {
            return Ok(self.inner.stale(ACTION, id).await);
        }
        self.inner
            .gateway
            .mark_read(id)
            .await
            .inspect_err(|err| warn!(domain = D::NAME, %id, error = %err, "mark as read failed"))?;
        self.inner.apply_confirmed(ACTION, |records| {
            if let Some(record) = records.iter_mut().find(|r| &r.id == id) {
                record.is_read = true;
            }
        });
        self.inner.follow_up(ACTION).await;
        Ok(ActionOutcome::Applied)
    }

    pub async fn mark_all_as_read(&self) -> Result<ActionOutcome, SyncError> {
        const ACTION: &str = "mark_all_as_read";
        self.inner.ensure_populated().await?;
        self.inner
            .gateway
            .mark_all_read()
            .await
            .inspect_err(|err| warn!(domain = D::NAME, error = %err, "mark all as read failed"))?;
        self.inner.apply_confirmed(ACTION, |records| {
            records.iter_mut().for_each(|r| r.is_read = true);
        });
        self.inner.follow_up(ACTION).await;
        Ok(ActionOutcome::Applied)
    }

    pub async fn delete_notification(
        &self,
        id: &NotificationId,
    ) -> Result<ActionOutcome, SyncError> {
        const ACTION: &str = "delete_notification";
        self.inner.ensure_populated().await?;
        if !self.inner.contains(id) {
            return Ok(self.inner.stale(ACTION, id).await);
        }
        self.inner
            .gateway
            .delete(id)
            .await
            .inspect_err(|err| warn!(domain = D::NAME, %id, error = %err, "delete failed"))?;
        self.inner
            .apply_confirmed(ACTION, |records| records.retain(|r| &r.id != id));
        self.inner.follow_up(ACTION).await;
        Ok(ActionOutcome::Applied)
    }

    pub async fn delete_all_read(&self) -> Result<ActionOutcome, SyncError> {
        const ACTION: &str = "delete_all_read";
        self.inner.ensure_populated().await?;
        self.inner
            .gateway
            .delete_all_read()
            .await
            .inspect_err(|err| warn!(domain = D::NAME, error = %err, "delete all read failed"))?;
        self.inner
            .apply_confirmed(ACTION, |records| records.retain(|r| !r.is_read));
        self.inner.follow_up(ACTION).await;
        Ok(ActionOutcome::Applied)
    }

    /// Sends a domain action. On success the cache is refreshed; the
    /// originating notification is not removed locally.
    pub async fn perform(&self, action: DomainAction) -> Result<ActionOutcome, SyncError> {
        let kind = action.kind();
        if !D::supported_actions().contains(&kind) {
            return Err(SyncError::UnsupportedAction {
                domain: D::NAME,
                action: kind.as_str(),
            });
        }
        if kind.needs_reason() && action.reason().map_or(true, |r| r.trim().is_empty()) {
            return Err(SyncError::MissingReason {
                action: kind.as_str(),
            });
        }
        self.inner.gateway.perform(&action).await.inspect_err(|err| {
            warn!(
                domain = D::NAME,
                action = kind.as_str(),
                target = action.target(),
                error = %err,
                "domain action failed"
            )
        })?;
        info!(
            domain = D::NAME,
            action = kind.as_str(),
            target = action.target(),
            "domain action applied"
        );
        self.inner.follow_up(kind.as_str()).await;
        Ok(ActionOutcome::Applied)
    }

    pub async fn approve_user(&self, user_id: &str) -> Result<ActionOutcome, SyncError> {
        self.perform(DomainAction::ApproveUser {
            user_id: user_id.to_string(),
        })
        .await
    }

    pub async fn suspend_user(
        &self,
        user_id: &str,
        reason: &str,
    ) -> Result<ActionOutcome, SyncError> {
        self.perform(DomainAction::SuspendUser {
            user_id: user_id.to_string(),
            reason: reason.to_string(),
        })
        .await
    }

    pub async fn approve_product(&self, product_id: &str) -> Result<ActionOutcome, SyncError> {
        self.perform(DomainAction::ApproveProduct {
            product_id: product_id.to_string(),
        })
        .await
    }

    pub async fn reject_product(
        &self,
        product_id: &str,
        reason: &str,
    ) -> Result<ActionOutcome, SyncError> {
        self.perform(DomainAction::RejectProduct {
            product_id: product_id.to_string(),
            reason: reason.to_string(),
        })
        .await
    }

    /// Dispatches `kind` using the correlation ids of a cached notification.
    pub async fn perform_from_notification(
        &self,
        id: &NotificationId,
        kind: ActionKind,
        reason: Option<String>,
    ) -> Result<ActionOutcome, SyncError> {
        if !D::supported_actions().contains(&kind) {
            return Err(SyncError::UnsupportedAction {
                domain: D::NAME,
                action: kind.as_str(),
            });
        }
        self.inner.ensure_populated().await?;
        let record = {
            let state = self.inner.state.lock().unwrap();
            state.records.iter().find(|r| &r.id == id).cloned()
        };
        let Some(record) = record else {
            return Ok(self.inner.stale(kind.as_str(), id).await);
        };
        self.perform(record.action(kind, reason)?).await
    }
}

impl<D: NotificationDomain> StoreInner<D> {
    fn issue_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn contains(&self, id: &NotificationId) -> bool {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .any(|r| &r.id == id)
    }

    async fn ensure_populated(&self) -> Result<(), SyncError> {
        if self.state.lock().unwrap().populated {
            return Ok(());
        }
        let _guard = self.cold_start.lock().await;
        if self.state.lock().unwrap().populated {
            return Ok(());
        }
        debug!(domain = D::NAME, "cold start fetch");
        self.refresh("cold_start").await.map(|_| ())
    }

    async fn poll(&self) -> Result<RefreshOutcome, SyncError> {
        if self.poll_busy.swap(true, Ordering::SeqCst) {
            debug!(domain = D::NAME, "previous poll still in flight, skipping");
            return Ok(RefreshOutcome::Busy);
        }
        let _busy = BusyGuard(&self.poll_busy);
        self.refresh("poll").await
    }

    async fn refresh(&self, origin: &'static str) -> Result<RefreshOutcome, SyncError> {
        let seq = self.issue_seq();
        let mut records = self.gateway.list(ReadFilter::All).await?;
        sort_recent_first(&mut records);
        let now = Utc::now();
        let derived = compute_at(&records, now);
        let counts = match self.config.counts_source {
            CountsSource::Derived => derived,
            CountsSource::Server => match self.gateway.get_counts().await {
                Ok(Some(server)) => {
                    let counts = server.into_counts(&records, now);
                    if !counts.agrees_with(&derived) {
                        warn!(
                            domain = D::NAME,
                            server_total = counts.total,
                            server_unread = counts.unread,
                            local_total = derived.total,
                            local_unread = derived.unread,
                            "server counts disagree with fetched records"
                        );
                    }
                    counts
                }
                Ok(None) => derived,
                Err(err) => {
                    debug!(domain = D::NAME, error = %err, "counts unavailable, deriving locally");
                    derived
                }
            },
        };
        Ok(self.apply(seq, origin, records, counts))
    }

    fn apply(
        &self,
        seq: u64,
        origin: &'static str,
        records: Vec<NotificationRecord<D>>,
        counts: AggregateCounts<D>,
    ) -> RefreshOutcome {
        {
            let mut state = self.state.lock().unwrap();
            if seq <= state.applied_seq {
                debug!(
                    domain = D::NAME,
                    origin,
                    seq,
                    applied = state.applied_seq,
                    "discarding response older than cache"
                );
                return RefreshOutcome::Discarded;
            }
            state.records = records;
            state.counts = counts.clone();
            state.applied_seq = seq;
            state.populated = true;
            state.last_synced = Some(Utc::now());
        }
        self.deliver(seq, &counts);
        RefreshOutcome::Applied
    }

    /// Applies a change the backend has already confirmed.
    fn apply_confirmed<F>(&self, action: &'static str, change: F)
    where
        F: FnOnce(&mut Vec<NotificationRecord<D>>),
    {
        // Issued under the lock so no refresh can apply a later sequence
        // between issue and apply.
        let (seq, counts) = {
            let mut state = self.state.lock().unwrap();
            let seq = self.issue_seq();
            change(&mut state.records);
            let counts = compute_at(&state.records, Utc::now());
            state.counts = counts.clone();
            state.applied_seq = state.applied_seq.max(seq);
            (seq, counts)
        };
        debug!(domain = D::NAME, action, seq, unread = counts.unread, "applied confirmed change");
        self.deliver(seq, &counts);
    }

    fn deliver(&self, seq: u64, counts: &AggregateCounts<D>) {
        if let Delivery::Delivered(errors) = self.listeners.deliver(seq, counts) {
            if !errors.is_empty() {
                warn!(
                    domain = D::NAME,
                    failed = errors.len(),
                    "some listeners failed to take the update"
                );
            }
        }
    }

    /// Refresh right after a successful action. The action already
    /// succeeded, so a failure here is only logged.
    async fn follow_up(&self, action: &'static str) {
        if let Err(err) = self.refresh(action).await {
            warn!(domain = D::NAME, action, error = %err, "refresh after action failed");
        }
    }

    async fn stale(&self, action: &'static str, id: &NotificationId) -> ActionOutcome {
        let err = SyncError::StaleAction {
            action,
            id: id.to_string(),
        };
        warn!(domain = D::NAME, error = %err, "reconciling stale action");
        self.follow_up(action).await;
        ActionOutcome::Stale
    }
}

#[async_trait]
impl<D: NotificationDomain> PollTarget for StoreInner<D> {
    async fn on_tick(&self) {
        match self.poll().await {
            Ok(outcome) => debug!(domain = D::NAME, ?outcome, "poll tick done"),
            Err(err) => warn!(domain = D::NAME, error = %err, "poll tick failed, keeping cache"),
        }
    }
}
