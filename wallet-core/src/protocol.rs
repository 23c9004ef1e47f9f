// Message protocols
//
// Two envelope families cross context boundaries:
// - internal `{type, data?}` requests from the popup and the content bridge
//   to the background relay, answered by `{success, data?, error?}`
// - page-level `STELLAR_WALLET_REQUEST` / `STELLAR_WALLET_RESPONSE` posted
//   through `window.postMessage`, correlated by `id`

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{BridgeError, RelayError};
use crate::types::{Settings, WithdrawMethod};

pub const WALLET_REQUEST: &str = "STELLAR_WALLET_REQUEST";
pub const WALLET_RESPONSE: &str = "STELLAR_WALLET_RESPONSE";
pub const INSTALLED_EVENT: &str = "stellarWalletInstalled";

// ============================================================================
// Internal relay protocol
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// String or number; validated by the relay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<WithdrawMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl PaymentRequest {
    /// Field-by-field read of untrusted page data. A wrongly typed field is
    /// dropped on its own instead of discarding the whole payload.
    pub fn from_loose(data: &Value) -> Self {
        let text = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            destination: text("destination"),
            amount: data.get("amount").filter(|v| !v.is_null()).cloned(),
            memo: text("memo"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub settings: Settings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// One variant per relay message type
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    CheckAuth,
    Login(LoginRequest),
    Logout,
    GetUserData,
    SubmitWithdrawal(WithdrawalRequest),
    SendPayment(PaymentRequest),
    GetWalletBalance,
    GetSettings,
    UpdateSettings(SettingsUpdate),
    HealthCheck,
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::CheckAuth => "CHECK_AUTH",
            Request::Login(_) => "LOGIN",
            Request::Logout => "LOGOUT",
            Request::GetUserData => "GET_USER_DATA",
            Request::SubmitWithdrawal(_) => "SUBMIT_WITHDRAWAL",
            Request::SendPayment(_) => "SEND_PAYMENT",
            Request::GetWalletBalance => "GET_WALLET_BALANCE",
            Request::GetSettings => "GET_SETTINGS",
            Request::UpdateSettings(_) => "UPDATE_SETTINGS",
            Request::HealthCheck => "HEALTH_CHECK",
        }
    }

    /// Parse an untyped `{type, data?}` envelope
    pub fn from_envelope(envelope: &Value) -> Result<Self, RelayError> {
        let kind = envelope
            .get("type")
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
            .ok_or(RelayError::MissingType)?;
        let data = envelope.get("data").cloned().unwrap_or(Value::Null);

        Ok(match kind {
            "CHECK_AUTH" => Request::CheckAuth,
            "LOGIN" => Request::Login(payload(kind, data)?),
            "LOGOUT" => Request::Logout,
            "GET_USER_DATA" => Request::GetUserData,
            "SUBMIT_WITHDRAWAL" => Request::SubmitWithdrawal(payload_or_default(kind, data)?),
            "SEND_PAYMENT" => Request::SendPayment(PaymentRequest::from_loose(&data)),
            "GET_WALLET_BALANCE" => Request::GetWalletBalance,
            "GET_SETTINGS" => Request::GetSettings,
            "UPDATE_SETTINGS" => Request::UpdateSettings(payload(kind, data)?),
            "HEALTH_CHECK" => Request::HealthCheck,
            other => return Err(RelayError::UnknownType(other.to_string())),
        })
    }

    pub fn to_envelope(&self) -> Value {
        let data = match self {
            Request::Login(req) => Some(json!(req)),
            Request::SubmitWithdrawal(req) => Some(json!(req)),
            Request::SendPayment(req) => Some(json!(req)),
            Request::UpdateSettings(req) => Some(json!(req)),
            _ => None,
        };

        match data {
            Some(data) => json!({ "type": self.kind(), "data": data }),
            None => json!({ "type": self.kind() }),
        }
    }
}

fn payload<T: serde::de::DeserializeOwned>(kind: &str, data: Value) -> Result<T, RelayError> {
    serde_json::from_value(data).map_err(|e| RelayError::BadPayload {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

/// Missing `data` means "all fields absent" so validation can name them
fn payload_or_default<T: serde::de::DeserializeOwned + Default>(
    kind: &str,
    data: Value,
) -> Result<T, RelayError> {
    if data.is_null() {
        Ok(T::default())
    } else {
        payload(kind, data)
    }
}

/// `{success, data?, error?}` reply of the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RelayResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn done() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Error text, with a generic fallback when a peer sent none
    pub fn error_or(&self, fallback: &str) -> String {
        self.error
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}

impl From<Result<Value, RelayError>> for RelayResponse {
    fn from(result: Result<Value, RelayError>) -> Self {
        match result {
            Ok(Value::Null) => Self::done(),
            Ok(data) => Self::ok(data),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

// ============================================================================
// Page-level wallet protocol
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WalletMethod {
    Connect,
    GetBalance,
    SendPayment,
    GetPublicKey,
}

impl WalletMethod {
    pub const ALL: [WalletMethod; 4] = [
        Self::Connect,
        Self::GetBalance,
        Self::SendPayment,
        Self::GetPublicKey,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::GetBalance => "getBalance",
            Self::SendPayment => "sendPayment",
            Self::GetPublicKey => "getPublicKey",
        }
    }

    pub fn parse(method: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == method)
    }
}

/// `{type:'STELLAR_WALLET_REQUEST', method, data?, id?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl WalletRequest {
    pub fn new(method: WalletMethod, data: Option<Value>, id: u64) -> Self {
        Self {
            kind: WALLET_REQUEST.to_string(),
            method: method.as_str().to_string(),
            data,
            id: Some(id),
        }
    }

    /// Extract a wallet request from an arbitrary page message.
    ///
    /// Anything that is not an object tagged `STELLAR_WALLET_REQUEST` yields
    /// `None`. The payload is only ever decoded as data.
    pub fn from_page_message(message: &Value) -> Option<Self> {
        if message.get("type").and_then(Value::as_str) != Some(WALLET_REQUEST) {
            return None;
        }

        Some(Self {
            kind: WALLET_REQUEST.to_string(),
            method: message
                .get("method")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            data: message.get("data").filter(|d| !d.is_null()).cloned(),
            id: message.get("id").and_then(Value::as_u64),
        })
    }
}

/// `{type:'STELLAR_WALLET_RESPONSE', method, success, data?, error?, id?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub method: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl WalletResponse {
    pub fn ok(request: &WalletRequest, data: Option<Value>) -> Self {
        Self {
            kind: WALLET_RESPONSE.to_string(),
            method: request.method.clone(),
            success: true,
            data,
            error: None,
            id: request.id,
        }
    }

    pub fn failure(request: &WalletRequest, error: impl Into<String>) -> Self {
        Self {
            kind: WALLET_RESPONSE.to_string(),
            method: request.method.clone(),
            success: false,
            data: None,
            error: Some(error.into()),
            id: request.id,
        }
    }

    pub fn from_page_message(message: &Value) -> Option<Self> {
        if message.get("type").and_then(Value::as_str) != Some(WALLET_RESPONSE) {
            return None;
        }
        serde_json::from_value(message.clone()).ok()
    }
}

/// Typed view of a wallet request, one variant per method
#[derive(Debug, Clone, PartialEq)]
pub enum WalletCall {
    Connect,
    GetBalance,
    SendPayment(PaymentRequest),
    GetPublicKey,
}

impl WalletCall {
    pub fn from_request(request: &WalletRequest) -> Result<Self, BridgeError> {
        let method = WalletMethod::parse(&request.method)
            .ok_or_else(|| BridgeError::UnknownMethod(request.method.clone()))?;

        Ok(match method {
            WalletMethod::Connect => WalletCall::Connect,
            WalletMethod::GetBalance => WalletCall::GetBalance,
            WalletMethod::GetPublicKey => WalletCall::GetPublicKey,
            // malformed payment data still reaches the relay, which names
            // the missing fields
            WalletMethod::SendPayment => WalletCall::SendPayment(
                request
                    .data
                    .as_ref()
                    .map(PaymentRequest::from_loose)
                    .unwrap_or_default(),
            ),
        })
    }
}

/// `CustomEvent` detail announcing the wallet to the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAnnouncement {
    pub available: bool,
    pub version: String,
    pub methods: Vec<String>,
    pub extension_id: String,
}

impl WalletAnnouncement {
    pub fn new(version: &str, extension_id: &str) -> Self {
        Self {
            available: true,
            version: version.to_string(),
            methods: WalletMethod::ALL
                .iter()
                .map(|m| m.as_str().to_string())
                .collect(),
            extension_id: extension_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectInfo {
    pub public_key: String,
    pub email: String,
    pub name: String,
}
