use super::{ActionKind, NotificationDomain};
use crate::gateway::http::EndpointTemplates;
use serde::{Deserialize, Serialize};

/// Back-office notifications seen by marketplace administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Admin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminKind {
    UserManagement,
    ProductManagement,
    System,
    OrderManagement,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminCategory {
    NewUser,
    UserSuspended,
    PendingModeration,
    ProductReported,
    ProductApproved,
    NewOrder,
    OrderIssue,
    SystemAlert,
    #[serde(other)]
    Other,
}

const KINDS: [AdminKind; 4] = [
    AdminKind::UserManagement,
    AdminKind::ProductManagement,
    AdminKind::System,
    AdminKind::OrderManagement,
];

const ACTIONS: [ActionKind; 4] = [
    ActionKind::ApproveUser,
    ActionKind::SuspendUser,
    ActionKind::ApproveProduct,
    ActionKind::RejectProduct,
];

impl NotificationDomain for Admin {
    type Kind = AdminKind;
    type Category = AdminCategory;

    const NAME: &'static str = "admin";

    fn kinds() -> &'static [AdminKind] {
        &KINDS
    }

    fn parse_kind(value: &str) -> AdminKind {
        match value {
            "user_management" => AdminKind::UserManagement,
            "product_management" => AdminKind::ProductManagement,
            "order_management" => AdminKind::OrderManagement,
            _ => AdminKind::System,
        }
    }

    fn parse_category(value: &str) -> AdminCategory {
        match value {
            "new_user" | "user_registration" => AdminCategory::NewUser,
            "user_suspended" => AdminCategory::UserSuspended,
            "pending_moderation" | "product_pending" => AdminCategory::PendingModeration,
            "product_reported" => AdminCategory::ProductReported,
            "product_approved" => AdminCategory::ProductApproved,
            "new_order" => AdminCategory::NewOrder,
            "order_issue" => AdminCategory::OrderIssue,
            "system_alert" => AdminCategory::SystemAlert,
            _ => AdminCategory::Other,
        }
    }

    fn kind_str(kind: &AdminKind) -> &'static str {
        match kind {
            AdminKind::UserManagement => "user_management",
            AdminKind::ProductManagement => "product_management",
            AdminKind::System => "system",
            AdminKind::OrderManagement => "order_management",
        }
    }

    fn default_endpoints() -> EndpointTemplates {
        EndpointTemplates {
            list: "/admin/notifications".to_string(),
            counts: Some("/admin/notifications/counts".to_string()),
            mark_read: "/admin/notifications/{id}/read".to_string(),
            mark_all_read: "/admin/notifications/read-all".to_string(),
            delete: "/admin/notifications/{id}".to_string(),
            delete_all_read: "/admin/notifications/read".to_string(),
            approve_user: Some("/admin/users/{id}/approve".to_string()),
            suspend_user: Some("/admin/users/{id}/suspend".to_string()),
            approve_product: Some("/admin/products/{id}/approve".to_string()),
            reject_product: Some("/admin/products/{id}/reject".to_string()),
        }
    }

    fn supported_actions() -> &'static [ActionKind] {
        &ACTIONS
    }

    fn is_eligible(category: &AdminCategory, action: ActionKind) -> bool {
        match action {
            ActionKind::ApproveUser => {
                matches!(category, AdminCategory::NewUser | AdminCategory::UserSuspended)
            }
            ActionKind::SuspendUser => matches!(category, AdminCategory::NewUser),
            ActionKind::ApproveProduct | ActionKind::RejectProduct => matches!(
                category,
                AdminCategory::PendingModeration | AdminCategory::ProductReported
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings_round_trip() {
        for kind in Admin::kinds() {
            assert_eq!(Admin::parse_kind(Admin::kind_str(kind)), *kind);
        }
    }

    #[test]
    fn test_eligibility() {
        assert!(Admin::is_eligible(
            &AdminCategory::PendingModeration,
            ActionKind::RejectProduct
        ));
        assert!(!Admin::is_eligible(
            &AdminCategory::NewOrder,
            ActionKind::ApproveProduct
        ));
        assert!(!Admin::is_eligible(
            &AdminCategory::UserSuspended,
            ActionKind::SuspendUser
        ));
    }

    #[test]
    fn test_unknown_category_deserializes_to_other() {
        let category: AdminCategory = serde_json::from_str("\"brand_new\"").unwrap();
        assert_eq!(category, AdminCategory::Other);
    }
}
