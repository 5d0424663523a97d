use crate::error::SyncError;
use crate::gateway::http::EndpointTemplates;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use std::{fmt, hash::Hash};

pub mod admin;
pub mod supplier;

pub use admin::{Admin, AdminCategory, AdminKind};
pub use supplier::{Supplier, SupplierCategory, SupplierKind};

/// Ordered priority shared by every domain: `low < medium < high < urgent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];

    /// Unknown or missing values land on `medium`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "low" => Priority::Low,
            "high" => Priority::High,
            "urgent" | "critical" => Priority::Urgent,
            _ => Priority::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// Opaque notification id. The backend may send strings or numbers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NotificationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<u64> for NotificationId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl<'de> Deserialize<'de> for NotificationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => NotificationId(s),
            RawId::Number(n) => NotificationId(n.to_string()),
        })
    }
}

fn optional_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<NotificationId>::deserialize(deserializer)?.map(|id| id.0))
}

/// Domain-specific actions that can be dispatched from a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ApproveUser,
    SuspendUser,
    ApproveProduct,
    RejectProduct,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::ApproveUser => "approve_user",
            ActionKind::SuspendUser => "suspend_user",
            ActionKind::ApproveProduct => "approve_product",
            ActionKind::RejectProduct => "reject_product",
        }
    }

    pub fn needs_reason(&self) -> bool {
        matches!(self, ActionKind::SuspendUser | ActionKind::RejectProduct)
    }
}

/// A fully resolved domain action ready to be sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainAction {
    ApproveUser { user_id: String },
    SuspendUser { user_id: String, reason: String },
    ApproveProduct { product_id: String },
    RejectProduct { product_id: String, reason: String },
}

impl DomainAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            DomainAction::ApproveUser { .. } => ActionKind::ApproveUser,
            DomainAction::SuspendUser { .. } => ActionKind::SuspendUser,
            DomainAction::ApproveProduct { .. } => ActionKind::ApproveProduct,
            DomainAction::RejectProduct { .. } => ActionKind::RejectProduct,
        }
    }

    /// The user or product id the action targets.
    pub fn target(&self) -> &str {
        match self {
            DomainAction::ApproveUser { user_id } | DomainAction::SuspendUser { user_id, .. } => {
                user_id
            }
            DomainAction::ApproveProduct { product_id }
            | DomainAction::RejectProduct { product_id, .. } => product_id,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            DomainAction::SuspendUser { reason, .. } | DomainAction::RejectProduct { reason, .. } => {
                Some(reason)
            }
            _ => None,
        }
    }
}

/// One independent notification scope. Implementors are zero-sized markers
/// that pin down the closed sets for `type` and `category` and the action
/// surface of the domain.
pub trait NotificationDomain:
    fmt::Debug + Clone + Copy + PartialEq + Eq + Default + Send + Sync + 'static
{
    type Kind: fmt::Debug
        + Clone
        + Copy
        + PartialEq
        + Eq
        + Hash
        + Ord
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;
    type Category: fmt::Debug
        + Clone
        + PartialEq
        + Eq
        + Hash
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    const NAME: &'static str;

    /// Every member of the `type` closed set.
    fn kinds() -> &'static [Self::Kind];

    fn parse_kind(value: &str) -> Self::Kind;

    fn parse_category(value: &str) -> Self::Category;

    fn kind_str(kind: &Self::Kind) -> &'static str;

    fn default_endpoints() -> EndpointTemplates;

    fn supported_actions() -> &'static [ActionKind] {
        &[]
    }

    /// Whether a notification of this category may drive `action`.
    fn is_eligible(_category: &Self::Category, _action: ActionKind) -> bool {
        false
    }
}

/// Wire shape of one notification, before normalization.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNotification {
    pub id: NotificationId,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "optional_id")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    pub product_id: Option<String>,
}

/// Normalized notification for one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound = "")]
pub struct NotificationRecord<D: NotificationDomain> {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: D::Kind,
    pub category: D::Category,
    pub priority: Priority,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

impl<D: NotificationDomain> NotificationRecord<D> {
    pub fn from_raw(raw: RawNotification) -> Self {
        Self {
            id: raw.id,
            kind: D::parse_kind(raw.kind.as_deref().unwrap_or_default()),
            category: D::parse_category(raw.category.as_deref().unwrap_or_default()),
            priority: raw
                .priority
                .as_deref()
                .map(Priority::parse)
                .unwrap_or_default(),
            title: raw.title,
            message: raw.message,
            is_read: raw.is_read,
            created_at: raw.created_at,
            user_id: raw.user_id,
            product_id: raw.product_id,
        }
    }

    pub fn is_urgent(&self) -> bool {
        self.priority == Priority::Urgent
    }

    /// Builds the domain action this notification can drive, using its
    /// correlation fields.
    pub fn action(
        &self,
        action: ActionKind,
        reason: Option<String>,
    ) -> Result<DomainAction, SyncError> {
        let ineligible = |why: String| SyncError::Ineligible {
            action: action.as_str(),
            id: self.id.to_string(),
            reason: why,
        };
        if !D::is_eligible(&self.category, action) {
            return Err(ineligible(format!(
                "category {:?} does not allow it",
                self.category
            )));
        }
        let user = || {
            self.user_id
                .clone()
                .ok_or_else(|| ineligible("notification has no userId".to_string()))
        };
        let product = || {
            self.product_id
                .clone()
                .ok_or_else(|| ineligible("notification has no productId".to_string()))
        };
        let why = || reason.clone().unwrap_or_default();
        Ok(match action {
            ActionKind::ApproveUser => DomainAction::ApproveUser { user_id: user()? },
            ActionKind::SuspendUser => DomainAction::SuspendUser {
                user_id: user()?,
                reason: why(),
            },
            ActionKind::ApproveProduct => DomainAction::ApproveProduct {
                product_id: product()?,
            },
            ActionKind::RejectProduct => DomainAction::RejectProduct {
                product_id: product()?,
                reason: why(),
            },
        })
    }
}

/// Orders records newest first; ties keep id order so the output is stable.
pub fn sort_recent_first<D: NotificationDomain>(records: &mut [NotificationRecord<D>]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}
