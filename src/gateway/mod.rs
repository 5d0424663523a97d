use crate::counter::ServerCounts;
use crate::error::SyncError;
use crate::notification::{DomainAction, NotificationDomain, NotificationId, NotificationRecord};
use async_trait::async_trait;

pub mod http;
mod http_tests;
pub mod memory;

pub use http::HttpGateway;
pub use memory::MemoryGateway;

/// Which records a list call should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFilter {
    #[default]
    All,
    Unread,
    Read,
}

/// Backend operations for one notification domain.
///
/// Mark-read and delete calls are idempotent: repeating them on an item that
/// is already read or gone succeeds.
#[async_trait]
pub trait RemoteGateway<D: NotificationDomain>: Send + Sync {
    async fn list(&self, filter: ReadFilter) -> Result<Vec<NotificationRecord<D>>, SyncError>;

    async fn list_all(&self) -> Result<Vec<NotificationRecord<D>>, SyncError> {
        self.list(ReadFilter::All).await
    }

    /// `Ok(None)` when the backend has no counts endpoint.
    async fn get_counts(&self) -> Result<Option<ServerCounts>, SyncError>;

    async fn mark_read(&self, id: &NotificationId) -> Result<(), SyncError>;

    async fn mark_all_read(&self) -> Result<(), SyncError>;

    async fn delete(&self, id: &NotificationId) -> Result<(), SyncError>;

    async fn delete_all_read(&self) -> Result<(), SyncError>;

    async fn perform(&self, action: &DomainAction) -> Result<(), SyncError>;
}
