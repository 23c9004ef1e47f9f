// Content bridge
// Sits between the untrusted page (window.postMessage) and the trusted
// extension bus. Every wallet request observed on the page gets exactly one
// response carrying the request's id.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cell::RefCell;

use crate::api::HttpTransport;
use crate::auth::AuthStatus;
use crate::error::BridgeError;
use crate::protocol::{
    ConnectInfo, RelayResponse, Request, WalletAnnouncement, WalletCall, WalletRequest,
    WalletResponse,
};
use crate::relay::Relay;
use crate::storage::KeyValueStore;
use crate::types::User;

/// Extension-internal message bus towards the background relay
#[async_trait(?Send)]
pub trait RelayChannel {
    async fn send(&self, request: Request) -> Result<RelayResponse, BridgeError>;
}

/// In-process channel, for contexts that host the relay themselves
#[async_trait(?Send)]
impl<S, T> RelayChannel for Relay<S, T>
where
    S: KeyValueStore + Clone,
    T: HttpTransport,
{
    async fn send(&self, request: Request) -> Result<RelayResponse, BridgeError> {
        Ok(self.handle(request).await)
    }
}

/// Outbound side of `window.postMessage`
pub trait PagePort {
    fn post(&self, response: &WalletResponse);
}

/// Advisory connection cache. Never authoritative; rebuilt from `CHECK_AUTH`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub is_connected: bool,
    pub current_account: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub url: String,
    pub title: String,
    pub domain: String,
}

pub struct ContentBridge<C, P> {
    channel: C,
    port: P,
    version: String,
    extension_id: String,
    state: RefCell<ConnectionState>,
}

impl<C: RelayChannel, P: PagePort> ContentBridge<C, P> {
    pub fn new(channel: C, port: P, version: &str, extension_id: &str) -> Self {
        Self {
            channel,
            port,
            version: version.to_string(),
            extension_id: extension_id.to_string(),
            state: RefCell::new(ConnectionState::default()),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Detail of the `stellarWalletInstalled` event
    pub fn announcement(&self) -> WalletAnnouncement {
        WalletAnnouncement::new(&self.version, &self.extension_id)
    }

    /// Rebuild the advisory state on page load
    pub async fn refresh(&self) -> Option<User> {
        match self.authenticated_user().await {
            Ok(user) => user,
            Err(e) => {
                log::debug!("Extension not connected or not authenticated: {}", e);
                None
            }
        }
    }

    /// Entry point for every `message` event on the page.
    ///
    /// Returns the response that was posted back, or `None` when the message
    /// was not a wallet request.
    pub async fn on_page_message(&self, message: &Value) -> Option<WalletResponse> {
        let request = WalletRequest::from_page_message(message)?;
        log::info!("🌐 Wallet request from page: {}", request.method);

        let response = self.respond(&request).await;
        self.port.post(&response);
        Some(response)
    }

    async fn respond(&self, request: &WalletRequest) -> WalletResponse {
        let call = match WalletCall::from_request(request) {
            Ok(call) => call,
            Err(e) => return WalletResponse::failure(request, e.to_string()),
        };

        let result = match call {
            WalletCall::Connect => self.connect().await,
            WalletCall::GetPublicKey => self.public_key().await,
            WalletCall::GetBalance => {
                self.forward(Request::GetWalletBalance, "Failed to get balance")
                    .await
            }
            WalletCall::SendPayment(payment) => {
                self.forward(Request::SendPayment(payment), "Failed to send payment")
                    .await
            }
        };

        match result {
            Ok(data) => WalletResponse::ok(request, data),
            Err(error) => WalletResponse::failure(request, error),
        }
    }

    async fn connect(&self) -> Result<Option<Value>, String> {
        let user = self
            .authenticated_user()
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| BridgeError::NotAuthenticated.to_string())?;

        Ok(Some(json!(ConnectInfo {
            public_key: user.public_key,
            email: user.email,
            name: user.name,
        })))
    }

    async fn public_key(&self) -> Result<Option<Value>, String> {
        let cached = self.state.borrow().current_account.clone();
        let account = match cached {
            Some(account) => Some(account),
            None => self
                .authenticated_user()
                .await
                .map_err(|e| e.to_string())?
                .map(|u| u.public_key),
        };

        account
            .map(|a| Some(json!({ "publicKey": a })))
            .ok_or_else(|| "Wallet not connected. Call connect() first.".to_string())
    }

    /// Relay a request and mirror its outcome
    async fn forward(&self, request: Request, fallback: &str) -> Result<Option<Value>, String> {
        let response = self.channel.send(request).await.map_err(|e| e.to_string())?;
        if response.success {
            Ok(response.data)
        } else {
            Err(response.error_or(fallback))
        }
    }

    /// `CHECK_AUTH` round trip; updates the advisory state either way
    async fn authenticated_user(&self) -> Result<Option<User>, BridgeError> {
        let response = self.channel.send(Request::CheckAuth).await?;

        let user = if response.success {
            response
                .data
                .and_then(|d| serde_json::from_value::<AuthStatus>(d).ok())
                .filter(|check| check.is_authenticated)
                .and_then(|check| check.user)
        } else {
            None
        };

        *self.state.borrow_mut() = ConnectionState {
            is_connected: user.is_some(),
            current_account: user.as_ref().map(|u| u.public_key.clone()),
        };
        Ok(user)
    }

    /// Messages sent by the extension to this page context. `PING` answers
    /// with a top-level `message` rather than a `data` payload.
    pub fn on_extension_message(
        &self,
        message: &Value,
        page_info: impl FnOnce() -> PageInfo,
    ) -> Value {
        match message.get("type").and_then(Value::as_str) {
            Some("PING") => json!({ "success": true, "message": "Content script is active" }),
            Some("GET_PAGE_INFO") => json!(RelayResponse::ok(json!(page_info()))),
            _ => json!(RelayResponse::failure("Unknown message type")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PaymentRequest, WALLET_REQUEST};
    use std::collections::VecDeque;

    /// Answers each relay request from a script and records it
    #[derive(Default)]
    struct FakeRelay {
        replies: RefCell<VecDeque<Result<RelayResponse, BridgeError>>>,
        seen: RefCell<Vec<Request>>,
    }

    impl FakeRelay {
        fn with(replies: Vec<Result<RelayResponse, BridgeError>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    #[async_trait(?Send)]
    impl RelayChannel for FakeRelay {
        async fn send(&self, request: Request) -> Result<RelayResponse, BridgeError> {
            self.seen.borrow_mut().push(request);
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(BridgeError::Channel("no reply".to_string())))
        }
    }

    #[derive(Default)]
    struct Recorder(RefCell<Vec<WalletResponse>>);

    impl PagePort for Recorder {
        fn post(&self, response: &WalletResponse) {
            self.0.borrow_mut().push(response.clone());
        }
    }

    fn authenticated() -> RelayResponse {
        RelayResponse::ok(json!({
            "isAuthenticated": true,
            "user": {"id": "1", "email": "a@b.c", "name": "Ann", "publicKey": "GPUBLIC"},
        }))
    }

    fn bridge(replies: Vec<Result<RelayResponse, BridgeError>>) -> ContentBridge<FakeRelay, Recorder> {
        ContentBridge::new(FakeRelay::with(replies), Recorder::default(), "1.0.0", "ext-id")
    }

    fn page_request(method: &str, id: u64) -> Value {
        json!({"type": WALLET_REQUEST, "method": method, "id": id})
    }

    #[tokio::test]
    async fn test_ignores_unrelated_page_messages() {
        let bridge = bridge(vec![]);
        assert!(bridge.on_page_message(&json!({"type": "hello"})).await.is_none());
        assert!(bridge.on_page_message(&json!("text")).await.is_none());
        assert!(bridge.port.0.borrow().is_empty());
        assert!(bridge.channel.seen.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_connect_unauthenticated_yields_single_failure() {
        let bridge = bridge(vec![Ok(RelayResponse::ok(
            json!({"isAuthenticated": false, "user": null}),
        ))]);

        bridge.on_page_message(&page_request("connect", 3)).await;

        let posted = bridge.port.0.borrow();
        assert_eq!(posted.len(), 1);
        assert!(!posted[0].success);
        assert_eq!(
            posted[0].error.as_deref(),
            Some("User not authenticated. Please login to the extension.")
        );
        assert_eq!(posted[0].id, Some(3));
        assert_eq!(*bridge.channel.seen.borrow(), vec![Request::CheckAuth]);
    }

    #[tokio::test]
    async fn test_connect_authenticated_caches_account() {
        let bridge = bridge(vec![Ok(authenticated())]);
        let resp = bridge.on_page_message(&page_request("connect", 1)).await.unwrap();

        assert!(resp.success);
        assert_eq!(
            resp.data,
            Some(json!({"publicKey": "GPUBLIC", "email": "a@b.c", "name": "Ann"}))
        );
        assert_eq!(
            bridge.state(),
            ConnectionState {
                is_connected: true,
                current_account: Some("GPUBLIC".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_get_balance_forwards_relay_reply() {
        let bridge = bridge(vec![Ok(RelayResponse::ok(
            json!({"balance": {"native": "100", "assets": []}}),
        ))]);
        let resp = bridge.on_page_message(&page_request("getBalance", 8)).await.unwrap();

        assert!(resp.success);
        assert_eq!(resp.method, "getBalance");
        assert_eq!(resp.data.unwrap()["balance"]["native"], "100");
        assert_eq!(*bridge.channel.seen.borrow(), vec![Request::GetWalletBalance]);
    }

    #[tokio::test]
    async fn test_send_payment_passes_data_and_error() {
        let bridge = bridge(vec![Ok(RelayResponse::failure(
            "Insufficient balance for this payment.",
        ))]);
        let resp = bridge
            .on_page_message(&json!({
                "type": WALLET_REQUEST,
                "method": "sendPayment",
                "data": {"destination": "GDESTINATION", "amount": "5", "memo": "hi"},
                "id": 4,
            }))
            .await
            .unwrap();

        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("Insufficient balance for this payment."));
        let seen = bridge.channel.seen.borrow();
        match &seen[0] {
            Request::SendPayment(p) => {
                assert_eq!(p.destination.as_deref(), Some("GDESTINATION"));
                assert_eq!(p.amount, Some(json!("5")));
                assert_eq!(p.memo.as_deref(), Some("hi"));
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_method_and_channel_failure_still_answer() {
        let bridge = bridge(vec![Err(BridgeError::Channel("port closed".to_string()))]);

        let resp = bridge.on_page_message(&page_request("eval", 1)).await.unwrap();
        assert_eq!(resp.error.as_deref(), Some("Unknown method: eval"));

        let resp = bridge.on_page_message(&page_request("getBalance", 2)).await.unwrap();
        assert_eq!(resp.error.as_deref(), Some("Extension channel error: port closed"));

        assert_eq!(bridge.port.0.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_without_error_text_gets_fallback() {
        let bridge = bridge(vec![Ok(RelayResponse {
            success: false,
            data: None,
            error: None,
        })]);
        let resp = bridge.on_page_message(&page_request("getBalance", 2)).await.unwrap();
        assert_eq!(resp.error.as_deref(), Some("Failed to get balance"));
    }

    #[tokio::test]
    async fn test_public_key_uses_cache_after_connect() {
        let bridge = bridge(vec![Ok(authenticated())]);
        bridge.on_page_message(&page_request("connect", 1)).await;
        let resp = bridge.on_page_message(&page_request("getPublicKey", 2)).await.unwrap();
        assert_eq!(resp.data, Some(json!({"publicKey": "GPUBLIC"})));
        assert_eq!(bridge.channel.seen.borrow().len(), 1);
    }

    #[test]
    fn test_extension_messages() {
        let bridge = bridge(vec![]);
        let info = || PageInfo {
            url: "https://shop.example/cart".to_string(),
            title: "Cart".to_string(),
            domain: "shop.example".to_string(),
        };

        let resp = bridge.on_extension_message(&json!({"type": "PING"}), info);
        assert_eq!(resp, json!({"success": true, "message": "Content script is active"}));

        let resp = bridge.on_extension_message(&json!({"type": "GET_PAGE_INFO"}), info);
        assert_eq!(resp["success"], true);
        assert_eq!(resp["data"]["domain"], "shop.example");

        let resp = bridge.on_extension_message(&json!({"type": "NOPE"}), info);
        assert_eq!(resp["success"], false);
        assert_eq!(resp["error"], "Unknown message type");
    }

    #[tokio::test]
    async fn test_send_payment_keeps_fields_next_to_mistyped_memo() {
        let bridge = bridge(vec![Ok(RelayResponse::ok(json!({"transactionHash": "h1"})))]);
        let resp = bridge
            .on_page_message(&json!({
                "type": WALLET_REQUEST,
                "method": "sendPayment",
                "data": {"destination": "GDESTINATION123", "amount": "5", "memo": 12345},
                "id": 6,
            }))
            .await
            .unwrap();

        assert!(resp.success);
        assert_eq!(
            *bridge.channel.seen.borrow(),
            vec![Request::SendPayment(PaymentRequest {
                destination: Some("GDESTINATION123".to_string()),
                amount: Some(json!("5")),
                memo: None,
            })]
        );
    }
}
