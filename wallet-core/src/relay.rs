// Background relay
// The single dispatch point for popup and content-bridge messages. Each
// envelope gets exactly one reply; a failing handler only fails its request.

use futures::FutureExt;
use serde_json::{json, Value};
use std::panic::AssertUnwindSafe;
use std::rc::Rc;

use crate::api::{ApiClient, HttpTransport};
use crate::auth::AuthManager;
use crate::classify::{rewrite_transfer_error, TransferKind};
use crate::clock::{Clock, SystemClock};
use crate::config::{ValidationConfig, WalletConfig};
use crate::error::RelayError;
use crate::protocol::{
    LoginRequest, PaymentRequest, RelayResponse, Request, SettingsUpdate, WithdrawalRequest,
};
use crate::storage::{keys, KeyValueStore, KeyValueStoreExt};
use crate::types::{AdStats, Balance, Session, Settings, TransferReceipt, User};

/// Why the extension lifecycle fired `onInstalled`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallReason {
    Install,
    Update,
    BrowserUpdate,
    SharedModuleUpdate,
}

impl InstallReason {
    pub fn parse(reason: &str) -> Option<Self> {
        match reason {
            "install" => Some(Self::Install),
            "update" => Some(Self::Update),
            "chrome_update" | "browser_update" => Some(Self::BrowserUpdate),
            "shared_module_update" => Some(Self::SharedModuleUpdate),
            _ => None,
        }
    }
}

pub struct Relay<S, T> {
    store: S,
    auth: AuthManager<S>,
    api: ApiClient<S, T>,
    validation: ValidationConfig,
    clock: Rc<dyn Clock>,
}

impl<S, T> Relay<S, T>
where
    S: KeyValueStore + Clone,
    T: HttpTransport,
{
    pub fn new(config: &WalletConfig, store: S, transport: T) -> Self {
        Self::with_clock(config, store, transport, Rc::new(SystemClock))
    }

    pub fn with_clock(config: &WalletConfig, store: S, transport: T, clock: Rc<dyn Clock>) -> Self {
        Self {
            auth: AuthManager::new(store.clone()).with_clock(clock.clone()),
            api: ApiClient::new(config.api.base_url.clone(), store.clone(), transport)
                .with_clock(clock.clone()),
            store,
            validation: config.validation.clone(),
            clock,
        }
    }

    pub fn auth(&self) -> &AuthManager<S> {
        &self.auth
    }

    pub fn api(&self) -> &ApiClient<S, T> {
        &self.api
    }

    /// Handle one raw envelope. Never fails and never panics outward.
    pub async fn dispatch(&self, envelope: &Value) -> RelayResponse {
        let request = match Request::from_envelope(envelope) {
            Ok(request) => request,
            Err(e) => {
                log::error!("❌ Rejected message {}: {}", envelope, e);
                return RelayResponse::failure(e.to_string());
            }
        };
        self.handle(request).await
    }

    /// Handle one typed request
    pub async fn handle(&self, request: Request) -> RelayResponse {
        let kind = request.kind();
        log::info!("🎯 Processing message type: {}", kind);

        match AssertUnwindSafe(self.route(request)).catch_unwind().await {
            Ok(result) => {
                if let Err(e) = &result {
                    log::error!("Error in {} handler: {}", kind, e);
                }
                result.into()
            }
            Err(_) => {
                log::error!("💥 {} handler panicked", kind);
                RelayResponse::failure("Message handler error")
            }
        }
    }

    async fn route(&self, request: Request) -> Result<Value, RelayError> {
        match request {
            Request::CheckAuth => self.check_auth().await,
            Request::Login(req) => self.login(req).await,
            Request::Logout => self.logout().await,
            Request::GetUserData => self.get_user_data().await,
            Request::SubmitWithdrawal(req) => self.submit_withdrawal(req).await,
            Request::SendPayment(req) => self.send_payment(req).await,
            Request::GetWalletBalance => self.get_wallet_balance().await,
            Request::GetSettings => self.get_settings().await,
            Request::UpdateSettings(req) => self.update_settings(req).await,
            Request::HealthCheck => self.health_check().await,
        }
    }

    async fn check_auth(&self) -> Result<Value, RelayError> {
        let status = self.auth.check_status().await.map_err(|e| {
            log::error!("Error in check_auth: {}", e);
            RelayError::Backend("Failed to check authentication".to_string())
        })?;
        Ok(json!(status))
    }

    async fn login(&self, req: LoginRequest) -> Result<Value, RelayError> {
        if req.email.trim().is_empty() || req.password.is_empty() {
            return Err(RelayError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let connection = self.api.test_connection().await;
        if !connection.success {
            return Err(RelayError::Backend(format!(
                "API Connection Failed: {}",
                connection.error.unwrap_or_default()
            )));
        }

        let response = self.api.login(req.email.trim(), &req.password).await;
        if !response.success {
            return Err(RelayError::Backend(
                response.error.unwrap_or_else(|| "Login failed".to_string()),
            ));
        }

        let reply = response.data.unwrap_or_default();
        let (token, raw_user) = match (reply.token, reply.user) {
            (Some(token), Some(user)) if !token.is_empty() => (token, user),
            _ => {
                return Err(RelayError::Backend(
                    "Invalid response from server - missing token or user data".to_string(),
                ))
            }
        };

        let user = user_from_login(&raw_user, reply.message)?;
        self.auth.set_user(&user, &token).await?;
        log::info!("✅ Logged in as {}", user.email);

        Ok(json!({ "user": user }))
    }

    async fn logout(&self) -> Result<Value, RelayError> {
        self.auth.logout().await.map_err(|e| {
            log::error!("Error in logout: {}", e);
            RelayError::Backend("Failed to logout".to_string())
        })?;
        Ok(Value::Null)
    }

    /// Partial success: a failed dashboard fetch yields `adStats: null`
    async fn get_user_data(&self) -> Result<Value, RelayError> {
        let session = self.auth.session().await.map_err(|e| {
            log::error!("Error in get_user_data: {}", e);
            RelayError::Backend("Failed to get user data".to_string())
        })?;
        let Session { user, .. } = session.ok_or(RelayError::NoUser)?;

        let dashboard = self.api.get_dashboard(&user.id).await;
        let ad_stats = match dashboard.into_data() {
            Some(data) => Some(AdStats::from_summary(&data.summary)),
            None => {
                log::warn!("Dashboard unavailable, returning user without stats");
                None
            }
        };

        Ok(json!({ "user": user, "adStats": ad_stats }))
    }

    async fn submit_withdrawal(&self, req: WithdrawalRequest) -> Result<Value, RelayError> {
        log::info!("Processing withdrawal request via backend API");

        let present = req.user_id.as_deref().is_some_and(|s| !s.is_empty())
            && req.amount.as_ref().is_some_and(is_present)
            && req.method.is_some()
            && req.destination.as_deref().is_some_and(|s| !s.is_empty());
        if !present {
            return Err(RelayError::Validation(
                "Missing required withdrawal data".to_string(),
            ));
        }

        let destination = req.destination.unwrap_or_default();
        let amount = req.amount.unwrap_or_default();
        self.transfer(&destination, &amount, TransferKind::Withdrawal)
            .await
    }

    async fn send_payment(&self, req: PaymentRequest) -> Result<Value, RelayError> {
        log::info!("Processing payment request");

        let destination = req.destination.filter(|d| !d.is_empty());
        let (destination, amount) = match (destination, req.amount) {
            (Some(d), Some(a)) if is_present(&a) => (d, a),
            _ => {
                return Err(RelayError::Validation(
                    "Missing required payment data (destination and amount)".to_string(),
                ))
            }
        };

        self.transfer(&destination, &amount, TransferKind::Payment)
            .await
    }

    /// Shared tail of withdrawal and payment: session, destination and amount
    /// checks, then `POST /transfer`
    async fn transfer(
        &self,
        destination: &str,
        amount: &Value,
        kind: TransferKind,
    ) -> Result<Value, RelayError> {
        let user = self
            .auth
            .session()
            .await?
            .map(|s| s.user)
            .filter(|u| !u.email.is_empty())
            .ok_or_else(|| {
                RelayError::Validation("User not authenticated or email missing".to_string())
            })?;

        if destination.chars().count() < self.validation.min_destination_len {
            return Err(RelayError::Validation(
                "Invalid destination address format".to_string(),
            ));
        }

        let amount = parse_amount(amount).ok_or_else(|| {
            RelayError::Validation(
                match kind {
                    TransferKind::Withdrawal => "Invalid withdrawal amount",
                    TransferKind::Payment => "Invalid payment amount",
                }
                .to_string(),
            )
        })?;

        log::info!("Creating transfer via backend API...");
        let result = self
            .api
            .create_transfer(&user.email, destination, amount)
            .await;

        let (default_message, default_error) = match kind {
            TransferKind::Withdrawal => ("Withdrawal completed successfully", "Transaction failed"),
            TransferKind::Payment => ("Payment sent successfully", "Payment failed"),
        };

        if result.success {
            if let Some(data) = result.data {
                return Ok(json!(transfer_receipt(data, default_message)));
            }
        }

        let raw = result
            .error
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| default_error.to_string());
        Err(RelayError::Backend(rewrite_transfer_error(
            &raw,
            result.code.as_deref(),
            kind,
        )))
    }

    async fn get_wallet_balance(&self) -> Result<Value, RelayError> {
        let user = self
            .auth
            .session()
            .await
            .map_err(|e| {
                log::error!("Error in get_wallet_balance: {}", e);
                RelayError::Backend("Failed to get wallet balance".to_string())
            })?
            .map(|s| s.user)
            .ok_or(RelayError::NotAuthenticated)?;

        log::info!("Getting wallet balance for user: {}", user.email);
        let wallet = self
            .api
            .get_wallet(&user.email)
            .await
            .into_data()
            .ok_or_else(|| RelayError::Backend("Failed to fetch wallet balance".to_string()))?;

        Ok(json!({ "balance": Balance::from_api(&wallet.balances) }))
    }

    async fn get_settings(&self) -> Result<Value, RelayError> {
        let enabled = self
            .store
            .get_json::<bool>(keys::ENABLED)
            .await?
            .unwrap_or(true);
        let settings = self
            .store
            .get_json::<Settings>(keys::SETTINGS)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        Ok(json!({ "enabled": enabled, "settings": settings }))
    }

    async fn update_settings(&self, req: SettingsUpdate) -> Result<Value, RelayError> {
        self.store.set_json(keys::SETTINGS, &req.settings).await?;
        if let Some(enabled) = req.enabled {
            self.store.set_json(keys::ENABLED, &enabled).await?;
        }
        Ok(json!({ "message": "Settings updated successfully" }))
    }

    async fn health_check(&self) -> Result<Value, RelayError> {
        let report = self.api.test_connection().await;
        if let (true, Some(data)) = (report.success, report.data) {
            return Ok(json!(data));
        }
        Err(RelayError::Backend(
            report
                .error
                .unwrap_or_else(|| "Health check failed".to_string()),
        ))
    }

    /// `runtime.onInstalled`: seed defaults on first install only
    pub async fn on_install(&self, reason: InstallReason) -> Result<(), RelayError> {
        log::info!("Extension installed/updated: {:?}", reason);
        if reason != InstallReason::Install {
            return Ok(());
        }

        self.store.set_json(keys::ENABLED, &true).await?;
        self.store
            .set_json(keys::SETTINGS, &Settings::default())
            .await?;
        self.store.set_json(keys::FIRST_INSTALL, &true).await?;
        self.store
            .set_json(keys::INSTALL_DATE, &self.clock.now_millis())
            .await?;
        Ok(())
    }

    /// `runtime.onStartup`: report whether a session survived the restart
    pub async fn on_startup(&self) -> Option<User> {
        match self.auth.session().await {
            Ok(Some(session)) => {
                log::info!("User is authenticated: {}", session.user.email);
                Some(session.user)
            }
            Ok(None) => {
                log::info!("User not authenticated");
                None
            }
            Err(e) => {
                log::error!("Error checking authentication: {}", e);
                None
            }
        }
    }
}

/// Falsy-value check matching what the page and popup consider "not given":
/// null, empty string and zero
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Bool(b) => *b,
        _ => true,
    }
}

/// Finite, strictly positive amount from a string or number
pub fn parse_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    (amount.is_finite() && amount > 0.0).then_some(amount)
}

/// Build the login user from the backend reply, naming the first missing field
fn user_from_login(raw: &Value, message: Option<String>) -> Result<User, RelayError> {
    let field = |name: &str| -> Result<String, RelayError> {
        let value = match raw.get(name) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                log::error!("Missing required field: {}", name);
                return Err(RelayError::Backend(format!(
                    "Invalid response from server - missing {}",
                    name
                )));
            }
        };
        Ok(value)
    };

    Ok(User {
        id: field("id")?,
        email: field("email")?,
        name: field("name")?,
        public_key: field("publicKey")?,
        user_type: Some(
            raw.get("userType")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or("user")
                .to_string(),
        ),
        message,
    })
}

fn transfer_receipt(data: Value, default_message: &str) -> TransferReceipt {
    let text = |v: &Value| -> Option<String> {
        match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    };

    let transaction_hash = ["/transactionResult/hash", "/hash", "/transactionId"]
        .iter()
        .filter_map(|p| data.pointer(p))
        .find_map(text)
        .unwrap_or_else(|| "pending".to_string());

    let message = data
        .get("message")
        .and_then(text)
        .unwrap_or_else(|| default_message.to_string());
    let status = data
        .get("status")
        .and_then(text)
        .unwrap_or_else(|| "confirmed".to_string());
    let transaction_result = match data.get("transactionResult") {
        Some(result) if !result.is_null() => result.clone(),
        _ => data.clone(),
    };

    TransferReceipt {
        transaction_hash,
        message,
        status,
        transaction_result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{HttpRequest, HttpResponse, TransportError};
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::cell::Cell;

    /// Blows up on the first request, answers `{"status":"ok"}` afterwards
    #[derive(Default)]
    struct PanicsOnce {
        tripped: Cell<bool>,
    }

    #[async_trait(?Send)]
    impl HttpTransport for PanicsOnce {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            if !self.tripped.replace(true) {
                panic!("transport exploded");
            }
            Ok(HttpResponse {
                status: 200,
                status_text: "OK".to_string(),
                body: r#"{"status":"ok"}"#.to_string(),
            })
        }
    }

    fn relay() -> (Relay<MemoryStore, PanicsOnce>, MemoryStore) {
        let store = MemoryStore::new();
        let relay = Relay::with_clock(
            &WalletConfig::default(),
            store.clone(),
            PanicsOnce::default(),
            Rc::new(ManualClock::new(9_000)),
        );
        (relay, store)
    }

    #[tokio::test]
    async fn test_panicking_handler_does_not_block_next_message() {
        let (relay, _) = relay();

        let resp = relay.dispatch(&json!({"type": "HEALTH_CHECK"})).await;
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("Message handler error"));

        let resp = relay.dispatch(&json!({"type": "HEALTH_CHECK"})).await;
        assert!(resp.success, "{:?}", resp.error);
        assert_eq!(
            resp.data,
            Some(json!({"message": "API connected successfully in 0ms", "timestamp": 9_000}))
        );

        let resp = relay.dispatch(&json!({"type": "CHECK_AUTH"})).await;
        assert!(resp.success);
    }

    #[tokio::test]
    async fn test_update_settings_persists_settings_and_enabled() {
        let (relay, store) = relay();

        let resp = relay
            .dispatch(&json!({
                "type": "UPDATE_SETTINGS",
                "data": {"settings": {"theme": "dark", "notifications": false}},
            }))
            .await;
        assert!(resp.success, "{:?}", resp.error);
        assert!(!store.contains(keys::ENABLED));

        let resp = relay.dispatch(&json!({"type": "GET_SETTINGS"})).await;
        assert_eq!(
            resp.data,
            Some(json!({"enabled": true, "settings": {"theme": "dark", "notifications": false}}))
        );

        relay
            .dispatch(&json!({
                "type": "UPDATE_SETTINGS",
                "data": {"settings": {"theme": "light", "notifications": true}, "enabled": false},
            }))
            .await;
        assert_eq!(store.get_json::<bool>(keys::ENABLED).await.unwrap(), Some(false));
        assert_eq!(
            store.get_json::<Settings>(keys::SETTINGS).await.unwrap(),
            Some(Settings::default())
        );
    }

    #[tokio::test]
    async fn test_update_settings_requires_settings() {
        let (relay, store) = relay();
        let resp = relay
            .dispatch(&json!({"type": "UPDATE_SETTINGS", "data": {"enabled": false}}))
            .await;
        assert!(!resp.success);
        assert!(resp
            .error
            .unwrap_or_default()
            .starts_with("Invalid payload for UPDATE_SETTINGS"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(&json!("12.5")), Some(12.5));
        assert_eq!(parse_amount(&json!(3)), Some(3.0));
        assert_eq!(parse_amount(&json!("0")), None);
        assert_eq!(parse_amount(&json!("-5")), None);
        assert_eq!(parse_amount(&json!("abc")), None);
        assert_eq!(parse_amount(&json!("NaN")), None);
        assert_eq!(parse_amount(&json!("inf")), None);
        assert_eq!(parse_amount(&json!(true)), None);
    }

    #[test]
    fn test_presence_rules() {
        assert!(!is_present(&Value::Null));
        assert!(!is_present(&json!("")));
        assert!(!is_present(&json!(0)));
        assert!(is_present(&json!("0")));
        assert!(is_present(&json!(1.5)));
    }

    #[test]
    fn test_receipt_hash_precedence() {
        let receipt = transfer_receipt(
            json!({"transactionResult": {"hash": "abc"}, "hash": "def"}),
            "done",
        );
        assert_eq!(receipt.transaction_hash, "abc");
        assert_eq!(receipt.message, "done");
        assert_eq!(receipt.status, "confirmed");
        assert_eq!(receipt.transaction_result, json!({"hash": "abc"}));

        let receipt = transfer_receipt(json!({"transactionId": 77, "message": "ok"}), "done");
        assert_eq!(receipt.transaction_hash, "77");
        assert_eq!(receipt.message, "ok");
        assert_eq!(receipt.transaction_result, json!({"transactionId": 77, "message": "ok"}));

        let receipt = transfer_receipt(json!({}), "done");
        assert_eq!(receipt.transaction_hash, "pending");
    }

    #[test]
    fn test_user_from_login_names_missing_field() {
        let err = user_from_login(&json!({"id": 5, "email": "a@b.c", "name": "A"}), None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid response from server - missing publicKey"
        );

        let user = user_from_login(
            &json!({"id": 5, "email": "a@b.c", "name": "A", "publicKey": "G1"}),
            Some("welcome".to_string()),
        )
        .unwrap();
        assert_eq!(user.id, "5");
        assert_eq!(user.user_type.as_deref(), Some("user"));
        assert_eq!(user.message.as_deref(), Some("welcome"));
    }

    #[test]
    fn test_install_reason_parse() {
        assert_eq!(InstallReason::parse("install"), Some(InstallReason::Install));
        assert_eq!(InstallReason::parse("chrome_update"), Some(InstallReason::BrowserUpdate));
        assert_eq!(InstallReason::parse("other"), None);
    }
}
