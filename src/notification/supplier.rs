use super::NotificationDomain;
use crate::gateway::http::EndpointTemplates;
use serde::{Deserialize, Serialize};

/// Notifications for suppliers and regular marketplace users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Supplier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplierKind {
    Message,
    Produit,
    Systeme,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplierCategory {
    NewMessage,
    ProductApproved,
    ProductRejected,
    PendingModeration,
    StockAlert,
    NewOrder,
    SystemUpdate,
    #[serde(other)]
    Other,
}

const KINDS: [SupplierKind; 3] = [
    SupplierKind::Message,
    SupplierKind::Produit,
    SupplierKind::Systeme,
];

impl NotificationDomain for Supplier {
    type Kind = SupplierKind;
    type Category = SupplierCategory;

    const NAME: &'static str = "supplier";

    fn kinds() -> &'static [SupplierKind] {
        &KINDS
    }

    fn parse_kind(value: &str) -> SupplierKind {
        match value {
            "message" => SupplierKind::Message,
            "produit" | "product" => SupplierKind::Produit,
            _ => SupplierKind::Systeme,
        }
    }

    fn parse_category(value: &str) -> SupplierCategory {
        match value {
            "new_message" => SupplierCategory::NewMessage,
            "product_approved" => SupplierCategory::ProductApproved,
            "product_rejected" => SupplierCategory::ProductRejected,
            "pending_moderation" => SupplierCategory::PendingModeration,
            "stock_alert" | "low_stock" => SupplierCategory::StockAlert,
            "new_order" => SupplierCategory::NewOrder,
            "system_update" => SupplierCategory::SystemUpdate,
            _ => SupplierCategory::Other,
        }
    }

    fn kind_str(kind: &SupplierKind) -> &'static str {
        match kind {
            SupplierKind::Message => "message",
            SupplierKind::Produit => "produit",
            SupplierKind::Systeme => "systeme",
        }
    }

    fn default_endpoints() -> EndpointTemplates {
        EndpointTemplates {
            list: "/notifications".to_string(),
            counts: Some("/notifications/counts".to_string()),
            mark_read: "/notifications/{id}/read".to_string(),
            mark_all_read: "/notifications/read-all".to_string(),
            delete: "/notifications/{id}".to_string(),
            delete_all_read: "/notifications/read".to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::ActionKind;

    #[test]
    fn test_no_domain_actions() {
        assert!(Supplier::supported_actions().is_empty());
        assert!(!Supplier::is_eligible(
            &SupplierCategory::PendingModeration,
            ActionKind::ApproveProduct
        ));
        assert!(Supplier::default_endpoints().approve_user.is_none());
    }

    #[test]
    fn test_parse_kind_aliases() {
        assert_eq!(Supplier::parse_kind("product"), SupplierKind::Produit);
        assert_eq!(Supplier::parse_kind("???"), SupplierKind::Systeme);
    }
}
