use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::rc::Rc;

use super::transport::{HttpRequest, HttpResponse, HttpTransport, Method};
use super::ApiResponse;
use crate::clock::{Clock, SystemClock};
use crate::error::ApiError;
use crate::storage::{keys, KeyValueStore, KeyValueStoreExt};
use crate::types::{DashboardData, WalletData};

const PREVIEW_LEN: usize = 100;

/// `/wallet/login` reply. `user` stays loose so missing fields can be
/// reported by name.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoginReply {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionReport {
    pub message: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAdvertisement {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_url: String,
    pub target_url: String,
    pub budget_xlm: f64,
    pub cost_per_click: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvertisementUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_xlm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_click: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSite {
    pub user_id: String,
    pub name: String,
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue_share: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue_share: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Client for the wallet backend
///
/// Reads the bearer token from the shared store on every request and writes
/// it back after a successful login. Never returns `Err`: every failure is
/// folded into [`ApiResponse`].
pub struct ApiClient<S, T> {
    base_url: String,
    store: S,
    transport: T,
    clock: Rc<dyn Clock>,
}

impl<S: KeyValueStore, T: HttpTransport> ApiClient<S, T> {
    pub fn new(base_url: impl Into<String>, store: S, transport: T) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
            transport,
            clock: Rc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one request and normalize the outcome
    pub async fn request<R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> ApiResponse<R> {
        let result = self.try_request(method, path, body).await;
        if let Err(e) = &result {
            log::warn!("{} {} failed: {}", method.as_str(), path, e);
        }
        result.into()
    }

    async fn try_request<R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<R, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("🌐 {} {}", method.as_str(), url);

        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        if let Some(token) = self.auth_token().await {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }

        let response = self
            .transport
            .send(HttpRequest {
                method,
                url,
                headers,
                body,
            })
            .await
            .map_err(|e| {
                log::debug!("Transport error: {}", e);
                ApiError::Network {
                    base_url: self.base_url.clone(),
                }
            })?;

        log::debug!("📡 Response status: {} {}", response.status, response.status_text);

        if !response.is_success() {
            return Err(self.status_error(&response));
        }

        let text = response.body.trim_start();
        if !text.starts_with('{') && !text.starts_with('[') {
            return Err(ApiError::NonJson {
                preview: text.chars().take(PREVIEW_LEN).collect(),
            });
        }

        let value: Value =
            serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))?;
        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Best message a non-2xx body offers
    fn status_error(&self, response: &HttpResponse) -> ApiError {
        let fallback = format!("HTTP {}: {}", response.status, response.status_text);
        let text = response.body.trim();

        if text.starts_with('{') {
            let Ok(body) = serde_json::from_str::<Value>(text) else {
                return ApiError::Status {
                    status: response.status,
                    message: fallback,
                    code: None,
                };
            };
            let message = ["error", "message"]
                .iter()
                .filter_map(|k| body.get(*k).and_then(Value::as_str))
                .find(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or(fallback);
            let code = body.get("code").and_then(Value::as_str).map(str::to_string);
            return ApiError::Status {
                status: response.status,
                message,
                code,
            };
        } else if text.contains("<html>") {
            return ApiError::HtmlBody {
                base_url: self.base_url.clone(),
            };
        }

        let message = if text.is_empty() {
            fallback
        } else {
            text.to_string()
        };
        ApiError::Status {
            status: response.status,
            message,
            code: None,
        }
    }

    async fn auth_token(&self) -> Option<String> {
        match self.store.get_json::<String>(keys::AUTH_TOKEN).await {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                log::error!("Failed to get auth token: {}", e);
                None
            }
        }
    }

    // Authentication

    pub async fn login(&self, email: &str, password: &str) -> ApiResponse<LoginReply> {
        let response: ApiResponse<LoginReply> = self
            .request(
                Method::Post,
                "/wallet/login",
                Some(json!({ "email": email, "password": password })),
            )
            .await;

        if let Some(token) = response.data.as_ref().and_then(|d| d.token.as_deref()) {
            if response.success {
                if let Err(e) = self.store.set_json(keys::AUTH_TOKEN, token).await {
                    log::error!("Failed to set auth token: {}", e);
                }
            }
        }

        response
    }

    pub async fn create_account(&self, email: &str, password: &str, name: &str) -> ApiResponse<Value> {
        self.request(
            Method::Post,
            "/wallet/",
            Some(json!({ "email": email, "password": password, "name": name })),
        )
        .await
    }

    // Wallet

    pub async fn get_wallet(&self, email: &str) -> ApiResponse<WalletData> {
        self.request(Method::Get, &format!("/wallet/{}", email), None)
            .await
    }

    pub async fn delete_wallet(&self, email: &str) -> ApiResponse<Value> {
        self.request(Method::Delete, &format!("/wallet/{}", email), None)
            .await
    }

    /// `amount` travels as a JSON number
    pub async fn create_transfer(
        &self,
        from_email: &str,
        to_public_key: &str,
        amount: f64,
    ) -> ApiResponse<Value> {
        self.request(
            Method::Post,
            "/transfer",
            Some(json!({
                "fromEmail": from_email,
                "toPublicKey": to_public_key,
                "amount": amount,
            })),
        )
        .await
    }

    pub async fn get_dashboard(&self, user_id: &str) -> ApiResponse<DashboardData> {
        self.request(Method::Get, &format!("/dashboard/{}", user_id), None)
            .await
    }

    // Advertisements

    pub async fn create_advertisement(&self, ad: &NewAdvertisement) -> ApiResponse<Value> {
        self.request(Method::Post, "/advertisements", Some(json!(ad)))
            .await
    }

    pub async fn list_advertisements(&self, user_id: &str) -> ApiResponse<Vec<Value>> {
        self.request(Method::Get, &format!("/advertisements/{}", user_id), None)
            .await
    }

    pub async fn update_advertisement(
        &self,
        campaign_id: &str,
        update: &AdvertisementUpdate,
    ) -> ApiResponse<Value> {
        self.request(
            Method::Put,
            &format!("/advertisements/{}", campaign_id),
            Some(json!(update)),
        )
        .await
    }

    pub async fn delete_advertisement(&self, campaign_id: &str) -> ApiResponse<Value> {
        self.request(
            Method::Delete,
            &format!("/advertisements/{}", campaign_id),
            None,
        )
        .await
    }

    // Sites

    pub async fn create_site(&self, site: &NewSite) -> ApiResponse<Value> {
        self.request(Method::Post, "/sites", Some(json!(site))).await
    }

    pub async fn list_sites(&self, user_id: &str) -> ApiResponse<Vec<Value>> {
        self.request(Method::Get, &format!("/sites/{}", user_id), None)
            .await
    }

    pub async fn update_site(&self, site_id: &str, update: &SiteUpdate) -> ApiResponse<Value> {
        self.request(Method::Put, &format!("/sites/{}", site_id), Some(json!(update)))
            .await
    }

    pub async fn site_sdk_code(&self, site_id: &str) -> ApiResponse<Value> {
        self.request(Method::Get, &format!("/sites/{}/sdk-code", site_id), None)
            .await
    }

    // Health

    pub async fn health_check(&self) -> ApiResponse<Value> {
        self.request(Method::Get, "/health-check", None).await
    }

    /// Timed health check
    pub async fn test_connection(&self) -> ApiResponse<ConnectionReport> {
        log::info!("🔍 Testing API connection...");
        let start = self.clock.now_millis();
        let result = self.health_check().await;
        let now = self.clock.now_millis();
        let duration = now.saturating_sub(start);

        if result.success {
            log::info!("✅ API connection successful in {}ms", duration);
            ApiResponse::ok(ConnectionReport {
                message: format!("API connected successfully in {}ms", duration),
                timestamp: now,
            })
        } else {
            let error = result
                .error
                .unwrap_or_else(|| "Health check failed".to_string());
            log::warn!("❌ API health check failed: {}", error);
            ApiResponse::failure(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::TransportError;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replays canned responses and records what was sent
    #[derive(Default)]
    struct Scripted {
        replies: RefCell<VecDeque<Result<HttpResponse, TransportError>>>,
        sent: RefCell<Vec<HttpRequest>>,
    }

    impl Scripted {
        fn reply(self, status: u16, body: &str) -> Self {
            self.replies.borrow_mut().push_back(Ok(HttpResponse {
                status,
                status_text: if status == 200 { "OK" } else { "Bad Request" }.to_string(),
                body: body.to_string(),
            }));
            self
        }

        fn unreachable(self) -> Self {
            self.replies
                .borrow_mut()
                .push_back(Err(TransportError("connection refused".to_string())));
            self
        }
    }

    #[async_trait(?Send)]
    impl HttpTransport for Rc<Scripted> {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.sent.borrow_mut().push(request);
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError("no scripted reply".to_string())))
        }
    }

    fn client(script: Scripted) -> (ApiClient<MemoryStore, Rc<Scripted>>, MemoryStore, Rc<Scripted>) {
        let store = MemoryStore::new();
        let transport = Rc::new(script);
        let client = ApiClient::new("http://localhost:3001/", store.clone(), transport.clone());
        (client, store, transport)
    }

    #[tokio::test]
    async fn test_network_failure_message() {
        let (client, _, _) = client(Scripted::default().unreachable());
        let resp: ApiResponse<Value> = client.health_check().await;
        assert!(!resp.success);
        assert_eq!(
            resp.error.as_deref(),
            Some("Network error: Could not connect to API at http://localhost:3001. Is the server running?")
        );
    }

    #[tokio::test]
    async fn test_html_error_page_message() {
        let (client, _, _) = client(Scripted::default().reply(404, "<html><body>nope</body></html>"));
        let resp = client.health_check().await;
        assert_eq!(
            resp.error.as_deref(),
            Some("Server returned HTML instead of JSON. Check if API is running on http://localhost:3001")
        );
    }

    #[tokio::test]
    async fn test_json_error_payload_message_and_code() {
        let (client, _, _) = client(
            Scripted::default().reply(400, r#"{"error":"Insufficient XLM","code":"INSUFFICIENT_FUNDS"}"#),
        );
        let resp = client.create_transfer("a@b.c", "GDEST000000", 1.0).await;
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("Insufficient XLM"));
        assert_eq!(resp.code.as_deref(), Some("INSUFFICIENT_FUNDS"));
    }

    #[tokio::test]
    async fn test_json_error_falls_back_to_message_then_status() {
        let (client, _, _) = client(
            Scripted::default()
                .reply(400, r#"{"message":"bad input"}"#)
                .reply(400, r#"{"detail":"x"}"#)
                .reply(400, ""),
        );
        assert_eq!(client.health_check().await.error.as_deref(), Some("bad input"));
        assert_eq!(
            client.health_check().await.error.as_deref(),
            Some("HTTP 400: Bad Request")
        );
        assert_eq!(
            client.health_check().await.error.as_deref(),
            Some("HTTP 400: Bad Request")
        );
    }

    #[tokio::test]
    async fn test_broken_json_error_body_uses_status_line() {
        let (client, _, _) = client(Scripted::default().reply(502, "{not json"));
        let resp = client.health_check().await;
        assert_eq!(resp.error.as_deref(), Some("HTTP 502: Bad Request"));
        assert_eq!(resp.code, None);
    }

    #[tokio::test]
    async fn test_non_json_success_body() {
        let long = "x".repeat(150);
        let (client, _, _) = client(Scripted::default().reply(200, &long));
        let resp = client.health_check().await;
        let expected = format!("Server returned non-JSON response: {}...", "x".repeat(100));
        assert_eq!(resp.error.as_deref(), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_login_persists_token_and_later_requests_carry_it() {
        let (client, store, transport) = client(
            Scripted::default()
                .reply(200, r#"{"message":"ok","token":"jwt-1","user":{"id":"1"}}"#)
                .reply(200, r#"{"status":"up"}"#),
        );

        let resp = client.login("a@b.c", "pw").await;
        assert!(resp.success);
        assert_eq!(
            store.get_json::<String>(keys::AUTH_TOKEN).await.unwrap().as_deref(),
            Some("jwt-1")
        );

        client.health_check().await;
        let sent = transport.sent.borrow();
        assert_eq!(sent[0].header("Authorization"), None);
        assert_eq!(sent[1].header("Authorization"), Some("Bearer jwt-1"));
        assert_eq!(sent[1].url, "http://localhost:3001/health-check");
        assert_eq!(sent[1].header("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_failed_login_does_not_store_token() {
        let (client, store, _) = client(
            Scripted::default().reply(401, r#"{"error":"Invalid credentials","token":"nope"}"#),
        );
        let resp = client.login("a@b.c", "bad").await;
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("Invalid credentials"));
        assert!(!store.contains(keys::AUTH_TOKEN));
    }

    #[tokio::test]
    async fn test_transfer_sends_numeric_amount() {
        let (client, _, transport) = client(Scripted::default().reply(200, r#"{"message":"done"}"#));
        client.create_transfer("a@b.c", "GDESTINATION", 12.5).await;
        let sent = transport.sent.borrow();
        assert_eq!(sent[0].method, Method::Post);
        assert_eq!(
            sent[0].body,
            Some(json!({"fromEmail":"a@b.c","toPublicKey":"GDESTINATION","amount":12.5}))
        );
    }

    #[tokio::test]
    async fn test_connection_report_uses_clock() {
        let (client, _, _) = client(Scripted::default().reply(200, r#"{"status":"ok"}"#));
        let client = client.with_clock(Rc::new(crate::clock::ManualClock::new(5_000)));
        let resp = client.test_connection().await;
        let report = resp.data.unwrap();
        assert_eq!(report.message, "API connected successfully in 0ms");
        assert_eq!(report.timestamp, 5_000);
    }

    #[tokio::test]
    async fn test_wallet_decoding() {
        let (client, _, _) = client(Scripted::default().reply(
            200,
            r#"{"publicKey":"GABC","balances":[{"type":"native","balance":"10"}],"account":{}}"#,
        ));
        let wallet = client.get_wallet("a@b.c").await.into_data().unwrap();
        assert_eq!(wallet.public_key, "GABC");
        assert_eq!(wallet.balances.len(), 1);
    }
}
