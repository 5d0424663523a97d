//! Stateless display lookups for notification widgets.

use crate::notification::{
    Admin, AdminCategory, AdminKind, NotificationDomain, Priority, Supplier, SupplierCategory,
    SupplierKind,
};
use chrono::{DateTime, Utc};

/// Icon, label and color lookups keyed by the domain's closed sets.
pub trait Presentation: NotificationDomain {
    /// Icon name for a notification. The category wins when it is specific.
    fn icon(kind: &Self::Kind, category: &Self::Category) -> &'static str;

    fn kind_label(kind: &Self::Kind) -> &'static str;

    fn category_label(category: &Self::Category) -> &'static str;
}

/// Hex color for a priority badge.
pub fn priority_color(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "#6b7280",
        Priority::Medium => "#3b82f6",
        Priority::High => "#f59e0b",
        Priority::Urgent => "#ef4444",
    }
}

pub fn priority_label(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "Low",
        Priority::Medium => "Medium",
        Priority::High => "High",
        Priority::Urgent => "Urgent",
    }
}

/// Short age of a notification relative to `now`.
pub fn relative_time(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(created_at);
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{} min ago", minutes)
    } else if elapsed.num_hours() < 24 {
        format!("{} h ago", elapsed.num_hours())
    } else if elapsed.num_days() < 7 {
        format!("{} d ago", elapsed.num_days())
    } else {
        created_at.format("%Y-%m-%d").to_string()
    }
}

impl Presentation for Admin {
    fn icon(kind: &AdminKind, category: &AdminCategory) -> &'static str {
        match category {
            AdminCategory::NewUser => "user-plus",
            AdminCategory::UserSuspended => "user-x",
            AdminCategory::PendingModeration => "clock",
            AdminCategory::ProductReported => "flag",
            AdminCategory::ProductApproved => "check-circle",
            AdminCategory::NewOrder => "shopping-cart",
            AdminCategory::OrderIssue => "alert-circle",
            AdminCategory::SystemAlert => "alert-triangle",
            AdminCategory::Other => match kind {
                AdminKind::UserManagement => "users",
                AdminKind::ProductManagement => "package",
                AdminKind::OrderManagement => "shopping-bag",
                AdminKind::System => "bell",
            },
        }
    }

    fn kind_label(kind: &AdminKind) -> &'static str {
        match kind {
            AdminKind::UserManagement => "Users",
            AdminKind::ProductManagement => "Products",
            AdminKind::System => "System",
            AdminKind::OrderManagement => "Orders",
        }
    }

    fn category_label(category: &AdminCategory) -> &'static str {
        match category {
            AdminCategory::NewUser => "New registration",
            AdminCategory::UserSuspended => "Account suspended",
            AdminCategory::PendingModeration => "Awaiting moderation",
            AdminCategory::ProductReported => "Product reported",
            AdminCategory::ProductApproved => "Product approved",
            AdminCategory::NewOrder => "New order",
            AdminCategory::OrderIssue => "Order issue",
            AdminCategory::SystemAlert => "System alert",
            AdminCategory::Other => "Notification",
        }
    }
}

impl Presentation for Supplier {
    fn icon(kind: &SupplierKind, category: &SupplierCategory) -> &'static str {
        match category {
            SupplierCategory::NewMessage => "message-square",
            SupplierCategory::ProductApproved => "check-circle",
            SupplierCategory::ProductRejected => "x-circle",
            SupplierCategory::PendingModeration => "clock",
            SupplierCategory::StockAlert => "archive",
            SupplierCategory::NewOrder => "shopping-cart",
            SupplierCategory::SystemUpdate => "info",
            SupplierCategory::Other => match kind {
                SupplierKind::Message => "mail",
                SupplierKind::Produit => "package",
                SupplierKind::Systeme => "bell",
            },
        }
    }

    fn kind_label(kind: &SupplierKind) -> &'static str {
        match kind {
            SupplierKind::Message => "Messages",
            SupplierKind::Produit => "Products",
            SupplierKind::Systeme => "System",
        }
    }

    fn category_label(category: &SupplierCategory) -> &'static str {
        match category {
            SupplierCategory::NewMessage => "New message",
            SupplierCategory::ProductApproved => "Product approved",
            SupplierCategory::ProductRejected => "Product rejected",
            SupplierCategory::PendingModeration => "Awaiting moderation",
            SupplierCategory::StockAlert => "Low stock",
            SupplierCategory::NewOrder => "New order",
            SupplierCategory::SystemUpdate => "Platform update",
            SupplierCategory::Other => "Notification",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_relative_time() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        assert_eq!(relative_time(now - Duration::seconds(20), now), "just now");
        assert_eq!(relative_time(now - Duration::minutes(5), now), "5 min ago");
        assert_eq!(relative_time(now - Duration::hours(3), now), "3 h ago");
        assert_eq!(relative_time(now - Duration::days(2), now), "2 d ago");
        assert_eq!(relative_time(now - Duration::days(30), now), "2026-09-19");
        // Clock skew puts records slightly in the future.
        assert_eq!(relative_time(now + Duration::minutes(2), now), "just now");
    }

    #[test]
    fn test_icons_prefer_category() {
        assert_eq!(
            Admin::icon(&AdminKind::System, &AdminCategory::NewUser),
            "user-plus"
        );
        assert_eq!(
            Admin::icon(&AdminKind::ProductManagement, &AdminCategory::Other),
            "package"
        );
        assert_eq!(
            Supplier::icon(&SupplierKind::Message, &SupplierCategory::Other),
            "mail"
        );
    }

    #[test]
    fn test_priority_colors_are_distinct() {
        let colors: std::collections::HashSet<_> =
            Priority::ALL.iter().map(|p| priority_color(*p)).collect();
        assert_eq!(colors.len(), Priority::ALL.len());
        assert_eq!(priority_label(Priority::Urgent), "Urgent");
    }
}
