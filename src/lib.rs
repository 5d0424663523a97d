pub mod config;
pub mod counter;
pub mod error;
pub mod gateway;
pub mod listener;
pub mod notification;
pub mod presentation;
pub mod scheduler;
pub mod store;

pub use counter::AggregateCounts;
pub use error::{ListenerError, SyncError};
pub use notification::{Admin, NotificationDomain, NotificationId, NotificationRecord, Supplier};
pub use store::{ActionOutcome, NotificationStore, RefreshOutcome};
