use super::{ReadFilter, RemoteGateway};
use crate::counter::{compute, ServerCounts};
use crate::error::SyncError;
use crate::notification::{DomainAction, NotificationDomain, NotificationId, NotificationRecord};
use async_trait::async_trait;
use std::{
    collections::VecDeque,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};
use tokio::sync::Mutex;

/// In-process backend. Answers from a vector of records, with switches for
/// failure injection and scripted latency on list calls.
pub struct MemoryGateway<D: NotificationDomain> {
    records: Mutex<Vec<NotificationRecord<D>>>,
    actions: Mutex<Vec<DomainAction>>,
    list_delays: Mutex<VecDeque<Duration>>,
    counts_endpoint: AtomicBool,
    failing: AtomicBool,
    list_calls: AtomicUsize,
    counts_calls: AtomicUsize,
    mutation_calls: AtomicUsize,
}

impl<D: NotificationDomain> Default for MemoryGateway<D> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<D: NotificationDomain> MemoryGateway<D> {
    pub fn new(records: Vec<NotificationRecord<D>>) -> Self {
        Self {
            records: Mutex::new(records),
            actions: Mutex::new(Vec::new()),
            list_delays: Mutex::new(VecDeque::new()),
            counts_endpoint: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
            counts_calls: AtomicUsize::new(0),
            mutation_calls: AtomicUsize::new(0),
        }
    }

    pub async fn insert(&self, record: NotificationRecord<D>) {
        let mut records = self.records.lock().await;
        records.retain(|r| r.id != record.id);
        records.push(record);
    }

    /// Removes a record behind the store's back, as another session would.
    pub async fn remove(&self, id: &NotificationId) {
        self.records.lock().await.retain(|r| &r.id != id);
    }

    pub async fn records(&self) -> Vec<NotificationRecord<D>> {
        self.records.lock().await.clone()
    }

    pub async fn performed(&self) -> Vec<DomainAction> {
        self.actions.lock().await.clone()
    }

    /// Queues a latency for the next list call. The response still reflects
    /// the records as they were when the call was issued.
    pub async fn push_list_delay(&self, delay: Duration) {
        self.list_delays.lock().await.push_back(delay);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_counts_endpoint(&self, enabled: bool) {
        self.counts_endpoint.store(enabled, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn counts_calls(&self) -> usize {
        self.counts_calls.load(Ordering::SeqCst)
    }

    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    fn check(&self, operation: &'static str) -> Result<(), SyncError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::transport(operation, "connection refused"));
        }
        Ok(())
    }

    fn mutation(&self, operation: &'static str) -> Result<(), SyncError> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        self.check(operation)
    }
}

#[async_trait]
impl<D: NotificationDomain> RemoteGateway<D> for MemoryGateway<D> {
    async fn list(&self, filter: ReadFilter) -> Result<Vec<NotificationRecord<D>>, SyncError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check("list")?;
        let snapshot: Vec<NotificationRecord<D>> = self
            .records
            .lock()
            .await
            .iter()
            .filter(|r| match filter {
                ReadFilter::All => true,
                ReadFilter::Unread => !r.is_read,
                ReadFilter::Read => r.is_read,
            })
            .cloned()
            .collect();
        let delay = self.list_delays.lock().await.pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(snapshot)
    }

    async fn get_counts(&self) -> Result<Option<ServerCounts>, SyncError> {
        self.counts_calls.fetch_add(1, Ordering::SeqCst);
        if !self.counts_endpoint.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.check("counts")?;
        let records = self.records.lock().await;
        let counts = compute::<D>(&records);
        Ok(Some(ServerCounts {
            total: counts.total,
            unread: counts.unread,
            by_type: counts
                .by_type
                .iter()
                .map(|(k, v)| (D::kind_str(k).to_string(), *v))
                .collect(),
            by_priority: counts
                .by_priority
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), *v))
                .collect(),
        }))
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<(), SyncError> {
        self.mutation("mark_read")?;
        if let Some(record) = self.records.lock().await.iter_mut().find(|r| &r.id == id) {
            record.is_read = true;
        }
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<(), SyncError> {
        self.mutation("mark_all_read")?;
        for record in self.records.lock().await.iter_mut() {
            record.is_read = true;
        }
        Ok(())
    }

    async fn delete(&self, id: &NotificationId) -> Result<(), SyncError> {
        self.mutation("delete")?;
        self.records.lock().await.retain(|r| &r.id != id);
        Ok(())
    }

    async fn delete_all_read(&self) -> Result<(), SyncError> {
        self.mutation("delete_all_read")?;
        self.records.lock().await.retain(|r| !r.is_read);
        Ok(())
    }

    async fn perform(&self, action: &DomainAction) -> Result<(), SyncError> {
        if !D::supported_actions().contains(&action.kind()) {
            return Err(SyncError::UnsupportedAction {
                domain: D::NAME,
                action: action.kind().as_str(),
            });
        }
        self.mutation(action.kind().as_str())?;
        self.actions.lock().await.push(action.clone());
        Ok(())
    }
}
