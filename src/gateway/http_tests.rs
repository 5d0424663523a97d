#[cfg(test)]
mod tests {
    use crate::config::HttpConfig;
    use crate::error::SyncError;
    use crate::gateway::{HttpGateway, ReadFilter, RemoteGateway};
    use crate::notification::{
        Admin, AdminCategory, AdminKind, DomainAction, NotificationId, Priority, Supplier,
    };
    use axum::{
        extract::{Path, Query},
        http::{HeaderMap, StatusCode},
        routing::{delete, get, patch, post},
        Json, Router,
    };
    use chrono::Utc;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    async fn serve(app: Router) -> HttpConfig {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        HttpConfig {
            base_url: format!("http://{}/api", addr),
            timeout_ms: Some(1000),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_list_and_counts() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);

        let app = Router::new()
            .route(
                "/api/admin/notifications",
                get(
                    move |Query(query): Query<HashMap<String, String>>, headers: HeaderMap| {
                        let tx = tx.clone();
                        async move {
                            let auth = headers
                                .get("authorization")
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_string);
                            let _ = tx.send(auth).await;
                            let mut items = vec![json!({
                                "id": 7,
                                "type": "user_management",
                                "category": "new_user",
                                "priority": "high",
                                "title": "New registration",
                                "isRead": false,
                                "createdAt": "2026-10-19T08:00:00Z",
                                "userId": 42
                            })];
                            if query.get("isRead").map(String::as_str) != Some("false") {
                                items.push(json!({
                                    "id": "n-8",
                                    "type": "order_management",
                                    "category": "new_order",
                                    "priority": "low",
                                    "isRead": true,
                                    "createdAt": "2026-10-18T08:00:00Z"
                                }));
                            }
                            Json(json!({ "notifications": items }))
                        }
                    },
                ),
            )
            .route(
                "/api/admin/notifications/counts",
                get(|| async {
                    Json(json!({
                        "data": {
                            "total": 2,
                            "unread": 1,
                            "byType": { "user_management": 1, "order_management": 1 },
                            "byPriority": { "high": 1, "low": 1 }
                        }
                    }))
                }),
            );

        let mut config = serve(app).await;
        config.headers = Some(HashMap::from([(
            "Authorization".to_string(),
            "Bearer admin-token".to_string(),
        )]));
        let gateway = HttpGateway::<Admin>::new(&config).unwrap();

        let all = gateway.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, NotificationId::from(7u64));
        assert_eq!(all[0].kind, AdminKind::UserManagement);
        assert_eq!(all[0].category, AdminCategory::NewUser);
        assert_eq!(all[0].priority, Priority::High);
        assert_eq!(all[0].user_id.as_deref(), Some("42"));
        assert!(all[1].is_read);
        assert_eq!(
            rx.recv().await.unwrap().as_deref(),
            Some("Bearer admin-token")
        );

        let unread = gateway.list(ReadFilter::Unread).await.unwrap();
        assert_eq!(unread.len(), 1);

        let counts = gateway
            .get_counts()
            .await
            .unwrap()
            .expect("counts endpoint configured")
            .into_counts(&all, Utc::now());
        assert_eq!(counts.total, 2);
        assert_eq!(counts.unread, 1);
        assert_eq!(counts.count_for(AdminKind::System), 0);
        assert_eq!(counts.count_for(AdminKind::OrderManagement), 1);
        assert_eq!(counts.count_for_priority(Priority::Urgent), 0);
    }

    #[tokio::test]
    async fn test_missing_targets_are_idempotent() {
        let app = Router::new()
            .route(
                "/api/notifications/{id}/read",
                patch(|Path(id): Path<String>| async move {
                    if id == "gone" {
                        (StatusCode::NOT_FOUND, "not found")
                    } else {
                        (StatusCode::OK, "{}")
                    }
                }),
            )
            .route(
                "/api/notifications/{id}",
                delete(|| async { (StatusCode::NOT_FOUND, "not found") }),
            )
            .route(
                "/api/notifications/read-all",
                patch(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable") }),
            );

        let gateway = HttpGateway::<Supplier>::new(&serve(app).await).unwrap();

        gateway.mark_read(&"n-1".into()).await.unwrap();
        gateway.mark_read(&"gone".into()).await.unwrap();
        gateway.delete(&"gone".into()).await.unwrap();

        match gateway.mark_all_read().await {
            Err(SyncError::Transport {
                operation,
                status,
                message,
            }) => {
                assert_eq!(operation, "mark_all_read");
                assert_eq!(status, Some(500));
                assert!(message.contains("database unavailable"));
            }
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_action_posts_reason() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);

        let app = Router::new().route(
            "/api/admin/users/{id}/suspend",
            post(
                move |Path(id): Path<String>, Json(payload): Json<serde_json::Value>| {
                    let tx = tx.clone();
                    async move {
                        let _ = tx.send((id, payload)).await;
                        Json(json!({ "success": true }))
                    }
                },
            ),
        );

        let gateway = HttpGateway::<Admin>::new(&serve(app).await).unwrap();
        gateway
            .perform(&DomainAction::SuspendUser {
                user_id: "u 9".to_string(),
                reason: "spam listings".to_string(),
            })
            .await
            .unwrap();

        let (id, payload) = rx.recv().await.unwrap();
        assert_eq!(id, "u 9");
        assert_eq!(payload, json!({ "reason": "spam listings" }));

        let err = HttpGateway::<Supplier>::new(&HttpConfig::default())
            .unwrap()
            .perform(&DomainAction::ApproveUser {
                user_id: "u-1".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedAction { domain: "supplier", .. }));
    }

    #[tokio::test]
    async fn test_undecodable_body() {
        let app = Router::new().route(
            "/api/notifications",
            get(|| async { "<html>maintenance</html>" }),
        );

        let gateway = HttpGateway::<Supplier>::new(&serve(app).await).unwrap();
        let err = gateway.list_all().await.unwrap_err();
        assert!(matches!(err, SyncError::Decode { operation: "list", .. }));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_error_body_with_multibyte_text() {
        let body = format!("{}é and more text", "x".repeat(255));
        let app = Router::new().route(
            "/api/notifications/{id}/read",
            patch(move || {
                let body = body.clone();
                async move { (StatusCode::INTERNAL_SERVER_ERROR, body) }
            }),
        );

        let gateway = HttpGateway::<Supplier>::new(&serve(app).await).unwrap();
        match gateway.mark_read(&NotificationId::from(1u64)).await {
            Err(SyncError::Transport {
                status, message, ..
            }) => {
                assert_eq!(status, Some(500));
                assert_eq!(message.chars().count(), 256);
                assert!(message.ends_with('é'));
            }
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_record_does_not_fail_the_list() {
        let app = Router::new().route(
            "/api/notifications",
            get(|| async {
                Json(json!({
                    "data": [
                        { "id": 1, "type": "message", "createdAt": "2026-10-19T08:00:00Z" },
                        { "id": 2, "type": "message", "createdAt": null },
                        { "id": 3, "type": "produit", "createdAt": "2026-10-19T09:00:00Z" }
                    ]
                }))
            }),
        );

        let gateway = HttpGateway::<Supplier>::new(&serve(app).await).unwrap();
        let records = gateway.list_all().await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }
}
