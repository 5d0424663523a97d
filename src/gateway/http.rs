use super::{ReadFilter, RemoteGateway};
use crate::config::HttpConfig;
use crate::counter::ServerCounts;
use crate::error::SyncError;
use crate::notification::{
    ActionKind, DomainAction, NotificationDomain, NotificationId, NotificationRecord,
    RawNotification,
};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, Method, RequestBuilder, StatusCode,
};
use serde::{Deserialize, Serialize};
use std::{marker::PhantomData, time::Duration};
use tracing::{debug, warn};

const DEFAULT_TIMEOUT_MS: u64 = 5000;
const MAX_ERROR_BODY_CHARS: usize = 256;

/// Path templates for every backend call. `{id}` is replaced with the
/// url-encoded target id. Templates starting with `http://` or `https://`
/// are used as-is, anything else is appended to the base url.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointTemplates {
    pub list: String,
    pub counts: Option<String>,
    pub mark_read: String,
    pub mark_all_read: String,
    pub delete: String,
    pub delete_all_read: String,
    pub approve_user: Option<String>,
    pub suspend_user: Option<String>,
    pub approve_product: Option<String>,
    pub reject_product: Option<String>,
}

/// Per-deployment overrides layered on top of a domain's defaults. An empty
/// string for an optional endpoint disables it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EndpointOverrides {
    pub list: Option<String>,
    pub counts: Option<String>,
    pub mark_read: Option<String>,
    pub mark_all_read: Option<String>,
    pub delete: Option<String>,
    pub delete_all_read: Option<String>,
    pub approve_user: Option<String>,
    pub suspend_user: Option<String>,
    pub approve_product: Option<String>,
    pub reject_product: Option<String>,
}

impl EndpointTemplates {
    pub fn with_overrides(mut self, overrides: &EndpointOverrides) -> Self {
        fn set(slot: &mut String, value: &Option<String>) {
            if let Some(v) = value {
                *slot = v.clone();
            }
        }
        fn set_opt(slot: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value {
                *slot = if v.is_empty() { None } else { Some(v.clone()) };
            }
        }
        set(&mut self.list, &overrides.list);
        set_opt(&mut self.counts, &overrides.counts);
        set(&mut self.mark_read, &overrides.mark_read);
        set(&mut self.mark_all_read, &overrides.mark_all_read);
        set(&mut self.delete, &overrides.delete);
        set(&mut self.delete_all_read, &overrides.delete_all_read);
        set_opt(&mut self.approve_user, &overrides.approve_user);
        set_opt(&mut self.suspend_user, &overrides.suspend_user);
        set_opt(&mut self.approve_product, &overrides.approve_product);
        set_opt(&mut self.reject_product, &overrides.reject_product);
        self
    }

    fn action(&self, kind: ActionKind) -> Option<&str> {
        match kind {
            ActionKind::ApproveUser => self.approve_user.as_deref(),
            ActionKind::SuspendUser => self.suspend_user.as_deref(),
            ActionKind::ApproveProduct => self.approve_product.as_deref(),
            ActionKind::RejectProduct => self.reject_product.as_deref(),
        }
    }
}

// Items stay untyped here so one malformed record cannot fail the page.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListEnvelope {
    Bare(Vec<serde_json::Value>),
    Notifications { notifications: Vec<serde_json::Value> },
    Data { data: Vec<serde_json::Value> },
}

impl ListEnvelope {
    fn into_inner(self) -> Vec<serde_json::Value> {
        match self {
            ListEnvelope::Bare(v)
            | ListEnvelope::Notifications { notifications: v }
            | ListEnvelope::Data { data: v } => v,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CountsEnvelope {
    Counts { counts: ServerCounts },
    Data { data: ServerCounts },
    Bare(ServerCounts),
}

#[derive(Serialize)]
struct ActionPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

/// Decodes list items one by one, skipping the ones that do not parse.
fn decode_records<D: NotificationDomain>(
    items: Vec<serde_json::Value>,
) -> Vec<NotificationRecord<D>> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawNotification>(item) {
            Ok(raw) => Some(NotificationRecord::from_raw(raw)),
            Err(e) => {
                warn!(domain = D::NAME, error = %e, "skipping malformed notification");
                None
            }
        })
        .collect()
}

/// Cuts an error body down for logging without splitting a character.
fn error_snippet(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

/// REST gateway for one domain.
pub struct HttpGateway<D: NotificationDomain> {
    base_url: String,
    endpoints: EndpointTemplates,
    client: Client,
    _domain: PhantomData<D>,
}

impl<D: NotificationDomain> HttpGateway<D> {
    /// Builds the client. Configured headers are sent with every request and
    /// must be valid header names and values.
    pub fn new(config: &HttpConfig) -> Result<Self, SyncError> {
        let timeout = Duration::from_millis(config.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS));
        let mut headers = HeaderMap::new();
        for (key, value) in config.headers.iter().flatten() {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| SyncError::Config(format!("header {}: {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| SyncError::Config(format!("header {}: {}", key, e)))?;
            headers.insert(name, value);
        }
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            endpoints: D::default_endpoints().with_overrides(&config.endpoints),
            client,
            _domain: PhantomData,
        })
    }

    pub fn endpoints(&self) -> &EndpointTemplates {
        &self.endpoints
    }

    fn url(&self, template: &str, id: Option<&str>) -> String {
        let path = match id {
            Some(id) => template.replace("{id}", &urlencoding::encode(id)),
            None => template.to_string(),
        };
        if path.starts_with("http://") || path.starts_with("https://") {
            path
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Sends the request and returns the body. `Ok(None)` means a 404 that
    /// the caller declared acceptable.
    async fn send(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
        missing_ok: bool,
    ) -> Result<Option<String>, SyncError> {
        let response = builder
            .send()
            .await
            .map_err(|e| SyncError::transport(operation, e))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND && missing_ok {
            debug!(domain = D::NAME, operation, "target already gone, treating as success");
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::transport(operation, e))?;
        if !status.is_success() {
            warn!(domain = D::NAME, operation, status = status.as_u16(), "backend returned error status");
            return Err(SyncError::status(
                operation,
                status.as_u16(),
                error_snippet(&body),
            ));
        }
        Ok(Some(body))
    }
}

#[async_trait]
impl<D: NotificationDomain> RemoteGateway<D> for HttpGateway<D> {
    async fn list(&self, filter: ReadFilter) -> Result<Vec<NotificationRecord<D>>, SyncError> {
        let mut builder = self.request(Method::GET, self.url(&self.endpoints.list, None));
        match filter {
            ReadFilter::All => {}
            ReadFilter::Unread => builder = builder.query(&[("isRead", "false")]),
            ReadFilter::Read => builder = builder.query(&[("isRead", "true")]),
        }
        let body = self.send("list", builder, false).await?.unwrap_or_default();
        let envelope: ListEnvelope =
            serde_json::from_str(&body).map_err(|e| SyncError::decode("list", e))?;
        Ok(decode_records(envelope.into_inner()))
    }

    async fn get_counts(&self) -> Result<Option<ServerCounts>, SyncError> {
        let Some(template) = self.endpoints.counts.as_deref() else {
            return Ok(None);
        };
        let builder = self.request(Method::GET, self.url(template, None));
        let body = self.send("counts", builder, false).await?.unwrap_or_default();
        let envelope: CountsEnvelope =
            serde_json::from_str(&body).map_err(|e| SyncError::decode("counts", e))?;
        Ok(Some(match envelope {
            CountsEnvelope::Counts { counts } => counts,
            CountsEnvelope::Data { data } => data,
            CountsEnvelope::Bare(counts) => counts,
        }))
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<(), SyncError> {
        let url = self.url(&self.endpoints.mark_read, Some(id.as_str()));
        self.send("mark_read", self.request(Method::PATCH, url), true)
            .await
            .map(|_| ())
    }

    async fn mark_all_read(&self) -> Result<(), SyncError> {
        let url = self.url(&self.endpoints.mark_all_read, None);
        self.send("mark_all_read", self.request(Method::PATCH, url), false)
            .await
            .map(|_| ())
    }

    async fn delete(&self, id: &NotificationId) -> Result<(), SyncError> {
        let url = self.url(&self.endpoints.delete, Some(id.as_str()));
        self.send("delete", self.request(Method::DELETE, url), true)
            .await
            .map(|_| ())
    }

    async fn delete_all_read(&self) -> Result<(), SyncError> {
        let url = self.url(&self.endpoints.delete_all_read, None);
        self.send("delete_all_read", self.request(Method::DELETE, url), false)
            .await
            .map(|_| ())
    }

    async fn perform(&self, action: &DomainAction) -> Result<(), SyncError> {
        let kind = action.kind();
        let Some(template) = self.endpoints.action(kind) else {
            return Err(SyncError::UnsupportedAction {
                domain: D::NAME,
                action: kind.as_str(),
            });
        };
        let url = self.url(template, Some(action.target()));
        let payload = ActionPayload {
            reason: action.reason(),
        };
        let builder = self.request(Method::POST, url).json(&payload);
        self.send(kind.as_str(), builder, false).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{Admin, AdminKind, Supplier};

    fn config(base_url: &str) -> HttpConfig {
        HttpConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_url_building() {
        let gateway = HttpGateway::<Admin>::new(&config("http://api.example.com/api/")).unwrap();
        assert_eq!(
            gateway.url(&gateway.endpoints.mark_read, Some("a b/7")),
            "http://api.example.com/api/admin/notifications/a%20b%2F7/read"
        );
        assert_eq!(
            gateway.url("https://other.example.com/x", None),
            "https://other.example.com/x"
        );
    }

    #[test]
    fn test_overrides() {
        let mut cfg = config("http://localhost");
        cfg.endpoints.counts = Some(String::new());
        cfg.endpoints.list = Some("/v2/alerts".to_string());
        let gateway = HttpGateway::<Supplier>::new(&cfg).unwrap();
        assert!(gateway.endpoints().counts.is_none());
        assert_eq!(gateway.endpoints().list, "/v2/alerts");
        assert_eq!(gateway.endpoints().delete, "/notifications/{id}");
    }

    #[test]
    fn test_list_envelopes() {
        let item = r#"{"id": 1, "type": "system", "createdAt": "2026-10-19T08:00:00Z"}"#;
        for body in [
            format!("[{}]", item),
            format!(r#"{{"notifications": [{}]}}"#, item),
            format!(r#"{{"data": [{}], "page": 1}}"#, item),
        ] {
            let envelope: ListEnvelope = serde_json::from_str(&body).unwrap();
            let records = decode_records::<Admin>(envelope.into_inner());
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].kind, AdminKind::System);
        }
    }

    #[test]
    fn test_malformed_items_are_skipped() {
        let body = r#"{"data": [
            {"id": 1, "type": "system", "createdAt": "2026-10-19T08:00:00Z"},
            {"id": 2, "type": "system", "createdAt": null},
            {"id": 3, "type": "system", "createdAt": "yesterday"},
            {"type": "system", "createdAt": "2026-10-19T09:00:00Z"},
            {"id": "n-5", "createdAt": "2026-10-19T10:00:00Z"}
        ]}"#;
        let envelope: ListEnvelope = serde_json::from_str(body).unwrap();
        let ids: Vec<String> = decode_records::<Admin>(envelope.into_inner())
            .into_iter()
            .map(|r| r.id.to_string())
            .collect();
        assert_eq!(ids, vec!["1", "n-5"]);
    }

    #[test]
    fn test_error_snippet_keeps_characters_whole() {
        let body = format!("{}é and more text", "x".repeat(255));
        let snippet = error_snippet(&body);
        assert_eq!(snippet.chars().count(), 256);
        assert!(snippet.ends_with('é'));
        assert_eq!(error_snippet("Erreur: opération refusée"), "Erreur: opération refusée");
    }

    #[test]
    fn test_invalid_header_is_a_config_error() {
        let mut cfg = config("http://localhost");
        cfg.headers = Some(std::collections::HashMap::from([(
            "bad header".to_string(),
            "x".to_string(),
        )]));
        let err = HttpGateway::<Admin>::new(&cfg).err().unwrap();
        assert!(matches!(err, SyncError::Config(_)));
        assert!(err.to_string().contains("bad header"));
    }
}
